//! Contracts for the collaborators the authorization engine depends on.
//!
//! Implementations live in [`crate::infrastructure`]. The service only ever talks to these
//! traits through the `Arc` aliases below, so adapters can be swapped at startup.

use super::authorization::{
    Authorization, AuthorizationId, AuthorizationState, CurrencyCode, MerchantId,
};
use super::card::CreditCard;
use super::guard::OperationKind;
use super::money::Amount;
use super::transaction::{Transaction, TransactionKind};
use crate::error::{ProcessorError, StoreError};
use async_trait::async_trait;
use std::sync::Arc;

/// A state change for one authorization, applied atomically by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub transaction: Option<Transaction>,
    pub state: AuthorizationState,
}

#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    async fn currency_exists(&self, code: &CurrencyCode) -> Result<bool, StoreError>;
    async fn create_authorization(&self, authorization: Authorization) -> Result<(), StoreError>;
    async fn get_authorization(&self, id: &AuthorizationId) -> Result<Authorization, StoreError>;
    async fn list_authorizations(&self) -> Result<Vec<Authorization>, StoreError>;

    /// Appends the entry's transaction (if any) and sets its state as one unit.
    ///
    /// Either both changes become visible or neither does.
    async fn record(&self, id: &AuthorizationId, entry: LedgerEntry) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// Appends a transaction and moves the state label to the one its kind implies.
    async fn append_transaction(
        &self,
        id: &AuthorizationId,
        transaction: Transaction,
    ) -> Result<(), StoreError> {
        let state = match transaction.kind {
            TransactionKind::Capture => AuthorizationState::Captured,
            TransactionKind::Refund => AuthorizationState::Refunded,
        };
        self.record(
            id,
            LedgerEntry {
                transaction: Some(transaction),
                state,
            },
        )
        .await
    }

    async fn set_state(
        &self,
        id: &AuthorizationId,
        state: AuthorizationState,
    ) -> Result<(), StoreError> {
        self.record(
            id,
            LedgerEntry {
                transaction: None,
                state,
            },
        )
        .await
    }
}

/// What the processor said about a request it definitely received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorOutcome<T> {
    Approved(T),
    Declined,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn authorize(
        &self,
        currency: &CurrencyCode,
        amount: Amount,
        card: &CreditCard,
    ) -> Result<ProcessorOutcome<AuthorizationId>, ProcessorError>;

    async fn capture(
        &self,
        id: &AuthorizationId,
        amount: Amount,
    ) -> Result<ProcessorOutcome<()>, ProcessorError>;

    async fn refund(
        &self,
        id: &AuthorizationId,
        amount: Amount,
    ) -> Result<ProcessorOutcome<()>, ProcessorError>;

    async fn void(&self, id: &AuthorizationId) -> Result<ProcessorOutcome<()>, ProcessorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationReason {
    /// The processor call timed out or returned an ambiguous answer.
    IndeterminateOutcome,
    /// The processor approved but the local write failed.
    Unrecorded,
}

/// An operation whose effect at the processor is unknown or missing from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationCase {
    pub reason: ReconciliationReason,
    pub operation: OperationKind,
    pub authorization: Option<AuthorizationId>,
    pub merchant: MerchantId,
    pub amount: Option<Amount>,
    pub detail: String,
}

/// Sink for cases that need a human to reconcile against the processor.
pub trait ReconciliationLog: Send + Sync {
    fn report(&self, case: ReconciliationCase);
}

pub type AuthorizationStoreRef = Arc<dyn AuthorizationStore>;
pub type PaymentProcessorRef = Arc<dyn PaymentProcessor>;
pub type ReconciliationLogRef = Arc<dyn ReconciliationLog>;
