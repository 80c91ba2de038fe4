use super::config::ServiceConfig;
use super::locks::AuthorizationLocks;
use crate::domain::authorization::{
    Authorization, AuthorizationId, AuthorizationState, AuthorizationSummary, CurrencyCode,
    MerchantId,
};
use crate::domain::card::CreditCard;
use crate::domain::guard::{self, Operation, OperationKind, TransitionRequest};
use crate::domain::money::Amount;
use crate::domain::ports::{
    AuthorizationStoreRef, LedgerEntry, PaymentProcessorRef, ProcessorOutcome,
    ReconciliationCase, ReconciliationLogRef, ReconciliationReason,
};
use crate::domain::transaction::Transaction;
use crate::error::{GatewayError, ProcessorError, Result, StoreError};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Orchestrates authorize, capture, refund and void against the store and the processor.
///
/// Every mutating operation follows the same order: validate, call the processor, then
/// write to the store. The processor call and the write run on a spawned task, so once the
/// processor has been asked the write is attempted even if the caller goes away.
///
/// The service is cheap to clone; clones share the store, the processor and the lock table.
#[derive(Clone)]
pub struct AuthorizationService {
    store: AuthorizationStoreRef,
    processor: PaymentProcessorRef,
    reconciliation: ReconciliationLogRef,
    locks: Arc<AuthorizationLocks>,
    config: ServiceConfig,
}

impl AuthorizationService {
    /// Creates a new `AuthorizationService`.
    ///
    /// # Arguments
    ///
    /// * `store` - Source of truth for authorizations and their ledgers.
    /// * `processor` - The external payment processor.
    /// * `reconciliation` - Where cases needing manual follow-up are reported.
    /// * `config` - Collaborator timeouts.
    pub fn new(
        store: AuthorizationStoreRef,
        processor: PaymentProcessorRef,
        reconciliation: ReconciliationLogRef,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            processor,
            reconciliation,
            locks: Arc::new(AuthorizationLocks::new()),
            config,
        }
    }

    /// Reserves `amount` on `card` for `merchant`.
    ///
    /// The card and currency are checked before the processor is contacted. The
    /// authorization only exists locally once the processor approved it and the store
    /// accepted it.
    pub async fn authorize(
        &self,
        merchant: &MerchantId,
        currency: &CurrencyCode,
        amount: Amount,
        card: CreditCard,
    ) -> Result<AuthorizationId> {
        card.validate(Utc::now().date_naive())?;

        if !self
            .storage("currency_exists", self.store.currency_exists(currency))
            .await?
        {
            return Err(GatewayError::Validation(format!(
                "currency {currency} is not supported"
            )));
        }

        let this = self.clone();
        let merchant = merchant.clone();
        let currency = currency.clone();
        detached(async move {
            this.authorize_at_processor(merchant, currency, amount, card)
                .await
        })
        .await
    }

    pub async fn capture(
        &self,
        merchant: &MerchantId,
        id: &AuthorizationId,
        amount: Amount,
    ) -> Result<Transaction> {
        self.apply(merchant, id, Operation::Capture(amount))
            .await?
            .ok_or_else(|| GatewayError::Internal("capture recorded no transaction".into()))
    }

    pub async fn refund(
        &self,
        merchant: &MerchantId,
        id: &AuthorizationId,
        amount: Amount,
    ) -> Result<Transaction> {
        self.apply(merchant, id, Operation::Refund(amount))
            .await?
            .ok_or_else(|| GatewayError::Internal("refund recorded no transaction".into()))
    }

    pub async fn void(&self, merchant: &MerchantId, id: &AuthorizationId) -> Result<()> {
        self.apply(merchant, id, Operation::Void).await?;
        Ok(())
    }

    /// Full authorization with card reference and ledger history. No tenancy check.
    pub async fn get_details(&self, id: &AuthorizationId) -> Result<Authorization> {
        Ok(self
            .storage("get_authorization", self.store.get_authorization(id))
            .await?)
    }

    /// Management listing of every authorization, regardless of merchant.
    pub async fn list_all(&self) -> Result<Vec<AuthorizationSummary>> {
        let authorizations = self
            .storage("list_authorizations", self.store.list_authorizations())
            .await?;
        Ok(authorizations.iter().map(Authorization::summary).collect())
    }

    /// Merchant-scoped listing: only authorizations owned by `merchant`.
    pub async fn list_for_merchant(
        &self,
        merchant: &MerchantId,
    ) -> Result<Vec<AuthorizationSummary>> {
        let authorizations = self
            .storage("list_authorizations", self.store.list_authorizations())
            .await?;
        Ok(authorizations
            .iter()
            .filter(|auth| &auth.merchant == merchant)
            .map(Authorization::summary)
            .collect())
    }

    pub async fn health_check(&self) -> Result<()> {
        Ok(self.storage("health_check", self.store.health_check()).await?)
    }

    /// Load, guard and hand over to [`Self::settle`] while holding the authorization's lock.
    async fn apply(
        &self,
        merchant: &MerchantId,
        id: &AuthorizationId,
        operation: Operation,
    ) -> Result<Option<Transaction>> {
        let lock = self.locks.acquire(id).await;

        let authorization = self
            .storage("get_authorization", self.store.get_authorization(id))
            .await?;
        let request = TransitionRequest::for_authorization(&authorization, merchant, operation);

        let next_state = guard::evaluate(&request).into_result().map_err(|e| {
            if let GatewayError::Ledger(inconsistency) = &e {
                error!(authorization = %id, error = %inconsistency, "stored ledger is inconsistent");
                return e;
            }
            warn!(
                authorization = %id,
                merchant = %merchant,
                operation = %operation.kind(),
                amount = ?operation.amount(),
                reason = %e,
                "operation rejected"
            );
            e
        })?;

        let this = self.clone();
        let merchant = merchant.clone();
        let id = id.clone();
        detached(async move {
            let _lock = lock;
            this.settle(merchant, id, operation, next_state).await
        })
        .await
    }

    async fn authorize_at_processor(
        &self,
        merchant: MerchantId,
        currency: CurrencyCode,
        amount: Amount,
        card: CreditCard,
    ) -> Result<AuthorizationId> {
        let outcome = self
            .call_processor(
                OperationKind::Authorize,
                None,
                &merchant,
                Some(amount),
                self.processor.authorize(&currency, amount, &card),
            )
            .await?;

        let id = match outcome {
            ProcessorOutcome::Approved(id) => id,
            ProcessorOutcome::Declined => {
                info!(merchant = %merchant, amount = %amount, "authorization declined");
                return Err(GatewayError::ProcessorDeclined(OperationKind::Authorize));
            }
        };

        let authorization =
            Authorization::new(id.clone(), currency, amount, merchant.clone(), card.reference());
        if let Err(source) = self
            .storage("create_authorization", self.store.create_authorization(authorization))
            .await
        {
            return Err(self.unrecorded(OperationKind::Authorize, &merchant, id, Some(amount), source));
        }

        info!(authorization = %id, merchant = %merchant, amount = %amount, "authorization created");
        Ok(id)
    }

    async fn settle(
        &self,
        merchant: MerchantId,
        id: AuthorizationId,
        operation: Operation,
        next_state: AuthorizationState,
    ) -> Result<Option<Transaction>> {
        let kind = operation.kind();
        let call = async {
            match operation {
                Operation::Capture(amount) => self.processor.capture(&id, amount).await,
                Operation::Refund(amount) => self.processor.refund(&id, amount).await,
                Operation::Void => self.processor.void(&id).await,
            }
        };

        match self
            .call_processor(kind, Some(&id), &merchant, operation.amount(), call)
            .await?
        {
            ProcessorOutcome::Approved(()) => {}
            ProcessorOutcome::Declined => {
                info!(authorization = %id, operation = %kind, "declined by processor");
                return Err(GatewayError::ProcessorDeclined(kind));
            }
        }

        let transaction = match operation {
            Operation::Capture(amount) => Some(Transaction::capture(id.clone(), amount)),
            Operation::Refund(amount) => Some(Transaction::refund(id.clone(), amount)),
            Operation::Void => None,
        };
        let entry = LedgerEntry {
            transaction: transaction.clone(),
            state: next_state,
        };

        if let Err(source) = self.storage("record", self.store.record(&id, entry)).await {
            return Err(self.unrecorded(kind, &merchant, id, operation.amount(), source));
        }

        info!(
            authorization = %id,
            merchant = %merchant,
            operation = %kind,
            amount = ?operation.amount(),
            state = %next_state,
            "operation applied"
        );
        Ok(transaction)
    }

    /// Bounds a processor call by the configured timeout and sorts out what its result means.
    async fn call_processor<T>(
        &self,
        operation: OperationKind,
        authorization: Option<&AuthorizationId>,
        merchant: &MerchantId,
        amount: Option<Amount>,
        call: impl Future<Output = std::result::Result<ProcessorOutcome<T>, ProcessorError>>,
    ) -> Result<ProcessorOutcome<T>> {
        debug!(operation = %operation, authorization = ?authorization, "calling processor");

        let reason = match tokio::time::timeout(self.config.processor_timeout, call).await {
            Ok(Ok(outcome)) => return Ok(outcome),
            Ok(Err(ProcessorError::Network(detail))) => {
                error!(
                    operation = %operation,
                    authorization = ?authorization,
                    detail = %detail,
                    "processor unreachable"
                );
                return Err(GatewayError::ProcessorUnavailable(detail));
            }
            Ok(Err(ProcessorError::Indeterminate(detail))) => detail,
            Err(_) => format!(
                "no answer within {} ms",
                self.config.processor_timeout.as_millis()
            ),
        };

        error!(
            operation = %operation,
            authorization = ?authorization,
            merchant = %merchant,
            reason = %reason,
            "processor outcome unknown, escalating for reconciliation"
        );
        self.reconciliation.report(ReconciliationCase {
            reason: ReconciliationReason::IndeterminateOutcome,
            operation,
            authorization: authorization.cloned(),
            merchant: merchant.clone(),
            amount,
            detail: reason.clone(),
        });
        Err(GatewayError::ProcessorIndeterminate {
            operation,
            authorization: authorization.cloned(),
            reason,
        })
    }

    /// Money moved at the processor but the ledger does not show it.
    fn unrecorded(
        &self,
        operation: OperationKind,
        merchant: &MerchantId,
        id: AuthorizationId,
        amount: Option<Amount>,
        source: StoreError,
    ) -> GatewayError {
        error!(
            authorization = %id,
            merchant = %merchant,
            operation = %operation,
            error = %source,
            "processor approved but ledger write failed, escalating for reconciliation"
        );
        self.reconciliation.report(ReconciliationCase {
            reason: ReconciliationReason::Unrecorded,
            operation,
            authorization: Some(id.clone()),
            merchant: merchant.clone(),
            amount,
            detail: source.to_string(),
        });
        GatewayError::Unrecorded {
            operation,
            authorization: id,
            source,
        }
    }

    /// Bounds a store call by the configured timeout. Failures other than a missing
    /// authorization are logged here.
    async fn storage<T>(
        &self,
        call_name: &'static str,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        let result = tokio::time::timeout(self.config.storage_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout));
        if let Err(e) = &result
            && !matches!(e, StoreError::NotFound(_))
        {
            error!(call = call_name, error = %e, "store call failed");
        }
        result
    }
}

/// Runs `work` on its own task so dropping the caller does not cancel it.
async fn detached<T, F>(work: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| GatewayError::Internal(format!("operation task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::infrastructure::in_memory::InMemoryAuthorizationStore;
    use crate::infrastructure::processor::{ScriptedResponse, SimulatedProcessor};
    use crate::infrastructure::reconciliation::InMemoryReconciliationLog;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Harness {
        service: AuthorizationService,
        store: InMemoryAuthorizationStore,
        processor: SimulatedProcessor,
        reconciliation: InMemoryReconciliationLog,
    }

    fn harness() -> Harness {
        let store = InMemoryAuthorizationStore::with_currencies(
            ["EUR", "USD"].map(|code| CurrencyCode::parse(code).unwrap()),
        );
        let processor = SimulatedProcessor::new();
        let reconciliation = InMemoryReconciliationLog::new();
        let service = AuthorizationService::new(
            Arc::new(store.clone()),
            Arc::new(processor.clone()),
            Arc::new(reconciliation.clone()),
            ServiceConfig::default().with_processor_timeout(Duration::from_millis(200)),
        );
        Harness {
            service,
            store,
            processor,
            reconciliation,
        }
    }

    fn merchant() -> MerchantId {
        MerchantId::new("merchant-a")
    }

    fn eur() -> CurrencyCode {
        CurrencyCode::parse("EUR").unwrap()
    }

    fn card() -> CreditCard {
        CreditCard::new("Jane Doe", 4000000000000119, 12, 2099, 123)
    }

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    async fn authorized(h: &Harness, value: Decimal) -> AuthorizationId {
        h.service
            .authorize(&merchant(), &eur(), amount(value), card())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_authorize_stores_authorised_record() {
        let h = harness();
        let id = authorized(&h, dec!(100.00)).await;

        let auth = h.service.get_details(&id).await.unwrap();
        assert_eq!(auth.state, AuthorizationState::Authorised);
        assert_eq!(auth.merchant, merchant());
        assert_eq!(auth.amount, amount(dec!(100.00)));
        assert_eq!(auth.card.masked_number, "************0119");
        assert!(auth.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_currency_never_reaches_processor() {
        let h = harness();
        let gbp = CurrencyCode::parse("GBP").unwrap();

        let err = h
            .service
            .authorize(&merchant(), &gbp, amount(dec!(10)), card())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        assert_eq!(h.processor.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_card_never_reaches_processor() {
        let h = harness();
        let expired = CreditCard::new("Jane Doe", 4000000000000119, 1, 2020, 123);
        let not_luhn = CreditCard::new("Jane Doe", 4000000000000009, 12, 2099, 123);

        for card in [expired, not_luhn] {
            let err = h
                .service
                .authorize(&merchant(), &eur(), amount(dec!(10)), card)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailure);
        }
        assert_eq!(h.processor.calls(), 0);
    }

    #[tokio::test]
    async fn test_authorize_decline_creates_nothing() {
        let h = harness();
        h.processor.decline_card(4000000000000119);

        let err = h
            .service
            .authorize(&merchant(), &eur(), amount(dec!(10)), card())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::ProcessorDeclined(OperationKind::Authorize)
        ));
        assert!(h.service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_captures_compose() {
        let h = harness();
        let id = authorized(&h, dec!(100.00)).await;

        h.service.capture(&merchant(), &id, amount(dec!(40.00))).await.unwrap();

        let err = h
            .service
            .capture(&merchant(), &id, amount(dec!(70.00)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmountExceedsHeadroom);

        h.service.capture(&merchant(), &id, amount(dec!(60.00))).await.unwrap();

        let err = h
            .service
            .capture(&merchant(), &id, amount(dec!(0.01)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::AmountExceedsHeadroom { headroom, .. } if headroom.value().is_zero()
        ));

        let auth = h.service.get_details(&id).await.unwrap();
        assert_eq!(auth.state, AuthorizationState::Captured);
        assert_eq!(auth.transactions.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_operation_does_not_call_processor() {
        let h = harness();
        let id = authorized(&h, dec!(20.00)).await;
        let before = h.processor.calls();

        let err = h
            .service
            .refund(&merchant(), &id, amount(dec!(1)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(h.processor.calls(), before);
    }

    #[tokio::test]
    async fn test_capture_decline_leaves_ledger_untouched() {
        let h = harness();
        let id = authorized(&h, dec!(50.00)).await;
        let before = h.service.get_details(&id).await.unwrap();

        h.processor.respond_next(ScriptedResponse::Decline);
        let err = h
            .service
            .capture(&merchant(), &id, amount(dec!(10.00)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProcessorDeclined);
        assert_eq!(h.service.get_details(&id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_processor_timeout_is_indeterminate() {
        let h = harness();
        let id = authorized(&h, dec!(50.00)).await;
        h.processor.set_latency(Duration::from_secs(2));

        let err = h
            .service
            .capture(&merchant(), &id, amount(dec!(10.00)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProcessorIndeterminate);
        assert!(err.requires_reconciliation());
        let cases = h.reconciliation.cases();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].reason, ReconciliationReason::IndeterminateOutcome);
        assert_eq!(cases[0].authorization.as_ref(), Some(&id));

        let auth = h.service.get_details(&id).await.unwrap();
        assert_eq!(auth.state, AuthorizationState::Authorised);
        assert!(auth.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_network_error_is_internal_without_reconciliation() {
        let h = harness();
        let id = authorized(&h, dec!(50.00)).await;
        h.processor.respond_next(ScriptedResponse::Fail(
            ProcessorError::Network("connection refused".into()),
        ));

        let err = h.service.void(&merchant(), &id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "internal error");
        assert!(h.reconciliation.cases().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_after_approval_is_unrecorded() {
        let h = harness();
        let id = authorized(&h, dec!(50.00)).await;
        h.store.fail_writes(true);

        let err = h
            .service
            .capture(&merchant(), &id, amount(dec!(10.00)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecorded);
        let cases = h.reconciliation.cases();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].reason, ReconciliationReason::Unrecorded);
        assert_eq!(cases[0].amount, Some(amount(dec!(10.00))));
    }

    #[tokio::test]
    async fn test_void_records_no_transaction() {
        let h = harness();
        let id = authorized(&h, dec!(20.00)).await;

        h.service.void(&merchant(), &id).await.unwrap();

        let auth = h.service.get_details(&id).await.unwrap();
        assert_eq!(auth.state, AuthorizationState::Voided);
        assert!(auth.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_listings_are_separated() {
        let h = harness();
        authorized(&h, dec!(10)).await;
        let other = MerchantId::new("merchant-b");
        h.service
            .authorize(&other, &eur(), amount(dec!(5)), card())
            .await
            .unwrap();

        assert_eq!(h.service.list_all().await.unwrap().len(), 2);
        let own = h.service.list_for_merchant(&other).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].merchant, other);
    }

    #[tokio::test]
    async fn test_missing_authorization_is_not_found() {
        let h = harness();
        let missing = AuthorizationId::new("nope");

        let err = h
            .service
            .capture(&merchant(), &missing, amount(dec!(1)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            h.service.get_details(&missing).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_health_check_reports_store_failure() {
        let h = harness();
        assert!(h.service.health_check().await.is_ok());

        h.store.fail_writes(true);
        assert_eq!(
            h.service.health_check().await.unwrap_err().kind(),
            ErrorKind::Internal
        );
    }
}
