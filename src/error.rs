use crate::domain::authorization::{AuthorizationId, AuthorizationState};
use crate::domain::guard::OperationKind;
use crate::domain::money::{Amount, Balance};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failures reported by an [`AuthorizationStore`](crate::domain::ports::AuthorizationStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("authorization {0} already exists")]
    AlreadyExists(AuthorizationId),
    #[error("authorization {0} not found")]
    NotFound(AuthorizationId),
    #[error("rejected by store: {0}")]
    Validation(String),
    #[error("storage call timed out")]
    Timeout,
    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn storage(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Storage(message.into())
    }
}

/// Failures reported by a [`PaymentProcessor`](crate::domain::ports::PaymentProcessor).
///
/// A decline is not a failure; it comes back as
/// [`ProcessorOutcome::Declined`](crate::domain::ports::ProcessorOutcome::Declined).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// The request never reached the processor, so nothing moved.
    #[error("processor unreachable: {0}")]
    Network(String),
    /// The request may or may not have been applied by the processor.
    #[error("processor outcome unknown: {0}")]
    Indeterminate(String),
}

/// The stored ledger contradicts its own invariants.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("net captured is negative (captured {captured}, refunded {refunded})")]
    NegativeNetCaptured { captured: Balance, refunded: Balance },
    #[error("captured {captured} exceeds authorized {authorized}")]
    CapturedExceedsAuthorized { captured: Balance, authorized: Balance },
}

/// Caller-facing error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationFailure,
    NotFound,
    Forbidden,
    InvalidState,
    AmountExceedsHeadroom,
    ProcessorDeclined,
    ProcessorIndeterminate,
    /// The processor approved but the local ledger could not record it.
    Unrecorded,
    Internal,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authorization {0} not found")]
    NotFound(AuthorizationId),

    #[error("forbidden")]
    Forbidden,

    #[error("cannot {operation} payment - payment has been '{state}'")]
    InvalidState {
        operation: OperationKind,
        state: AuthorizationState,
    },

    #[error("cannot {operation} {requested}: only {headroom} remaining")]
    AmountExceedsHeadroom {
        operation: OperationKind,
        requested: Amount,
        headroom: Balance,
    },

    #[error("{0} declined by payment processor")]
    ProcessorDeclined(OperationKind),

    #[error("{operation} outcome unknown at payment processor: {reason}")]
    ProcessorIndeterminate {
        operation: OperationKind,
        authorization: Option<AuthorizationId>,
        reason: String,
    },

    #[error("{operation} approved by processor but not recorded: {source}")]
    Unrecorded {
        operation: OperationKind,
        authorization: AuthorizationId,
        #[source]
        source: StoreError,
    },

    #[error("payment processor unavailable: {0}")]
    ProcessorUnavailable(String),

    #[error("ledger inconsistency: {0}")]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::AmountExceedsHeadroom { .. } => ErrorKind::AmountExceedsHeadroom,
            Self::ProcessorDeclined(_) => ErrorKind::ProcessorDeclined,
            Self::ProcessorIndeterminate { .. } => ErrorKind::ProcessorIndeterminate,
            Self::Unrecorded { .. } => ErrorKind::Unrecorded,
            Self::ProcessorUnavailable(_)
            | Self::Ledger(_)
            | Self::Storage(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Text safe to hand back to the merchant. Faults on our side never leak detail.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal | ErrorKind::Unrecorded => "internal error".to_string(),
            ErrorKind::ProcessorIndeterminate => {
                "payment processor outcome unknown; pending reconciliation".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// True when the external state of the authorization is unknown or ahead of our ledger.
    pub fn requires_reconciliation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ProcessorIndeterminate | ErrorKind::Unrecorded
        )
    }

    /// True for conditions the caller can fix by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ValidationFailure
                | ErrorKind::NotFound
                | ErrorKind::Forbidden
                | ErrorKind::InvalidState
                | ErrorKind::AmountExceedsHeadroom
        )
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Validation(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}
