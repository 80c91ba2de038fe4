use crate::domain::ports::{ReconciliationCase, ReconciliationLog, ReconciliationReason};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

/// Emits every case as an error event on the `reconciliation` target.
#[derive(Default, Debug)]
pub struct TracingReconciliationLog {}

impl ReconciliationLog for TracingReconciliationLog {
    fn report(&self, case: ReconciliationCase) {
        let reason = match case.reason {
            ReconciliationReason::IndeterminateOutcome => "indeterminate_outcome",
            ReconciliationReason::Unrecorded => "unrecorded",
        };
        error!(
            target: "reconciliation",
            reason,
            operation = %case.operation,
            authorization = ?case.authorization.as_ref().map(|id| id.as_str()),
            merchant = %case.merchant,
            amount = ?case.amount.map(|a| a.value()),
            detail = %case.detail,
            "manual reconciliation required"
        );
    }
}

/// Keeps reported cases in memory. Clones share the same list.
#[derive(Default, Debug, Clone)]
pub struct InMemoryReconciliationLog {
    cases: Arc<Mutex<Vec<ReconciliationCase>>>,
}

impl InMemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cases(&self) -> Vec<ReconciliationCase> {
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReconciliationLog for InMemoryReconciliationLog {
    fn report(&self, case: ReconciliationCase) {
        self.cases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(case);
    }
}
