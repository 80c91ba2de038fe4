//! Transition guard: decides whether an operation may proceed against an authorization.
//!
//! The guard is pure. It never touches storage or the processor; it only looks at the
//! current state label, the derived ledger totals and the two merchant identities.
//! A ledger that fails to derive is only reported once it is actually needed, so a corrupt
//! history never hides a tenancy or lifecycle denial and never blocks a void.
//!
//! Rules are evaluated in a fixed order:
//!
//! 1. Tenancy. A merchant that does not own the authorization is denied before anything
//!    about its state or balance is looked at.
//! 2. Lifecycle. The operation must be legal from the current state (see
//!    [`OperationKind::legal_states`]).
//! 3. Headroom. Capture is bounded by `authorized - captured`, refund by
//!    `captured - refunded`. Comparing against headroom rather than the authorized amount is
//!    what lets repeated partial captures and refunds compose.

use super::authorization::{Authorization, AuthorizationState, MerchantId};
use super::ledger::LedgerTotals;
use super::money::{Amount, Balance};
use crate::error::{GatewayError, LedgerError};
use std::fmt;

/// A requested lifecycle operation with its amount, if it has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Capture(Amount),
    Refund(Amount),
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Authorize,
    Capture,
    Refund,
    Void,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Capture(_) => OperationKind::Capture,
            Self::Refund(_) => OperationKind::Refund,
            Self::Void => OperationKind::Void,
        }
    }

    pub fn amount(&self) -> Option<Amount> {
        match self {
            Self::Capture(amount) | Self::Refund(amount) => Some(*amount),
            Self::Void => None,
        }
    }
}

impl OperationKind {
    /// States from which this operation may be applied.
    pub fn legal_states(&self) -> &'static [AuthorizationState] {
        use AuthorizationState::*;
        match self {
            Self::Authorize => &[],
            Self::Capture => &[Authorised, Captured],
            Self::Refund => &[Captured, Refunded],
            Self::Void => &[Authorised],
        }
    }

    /// State label after the operation succeeds.
    pub fn resulting_state(&self) -> AuthorizationState {
        match self {
            Self::Authorize => AuthorizationState::Authorised,
            Self::Capture => AuthorizationState::Captured,
            Self::Refund => AuthorizationState::Refunded,
            Self::Void => AuthorizationState::Voided,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::Capture => "capture",
            Self::Refund => "refund",
            Self::Void => "void",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the guard needs to decide.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest<'a> {
    pub state: AuthorizationState,
    pub totals: Result<LedgerTotals, LedgerError>,
    pub operation: Operation,
    pub requesting_merchant: &'a MerchantId,
    pub owning_merchant: &'a MerchantId,
}

impl<'a> TransitionRequest<'a> {
    /// Derives the ledger totals from `authorization` and pairs them with the request.
    pub fn for_authorization(
        authorization: &'a Authorization,
        requesting_merchant: &'a MerchantId,
        operation: Operation,
    ) -> Self {
        Self {
            state: authorization.state,
            totals: LedgerTotals::derive(authorization),
            operation,
            requesting_merchant,
            owning_merchant: &authorization.merchant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow {
        next_state: AuthorizationState,
    },
    DenyForbiddenTenant,
    DenyWrongState {
        operation: OperationKind,
        state: AuthorizationState,
    },
    DenyAmountExceedsHeadroom {
        operation: OperationKind,
        requested: Amount,
        headroom: Balance,
    },
    /// The stored history contradicts the ledger invariants.
    DenyInconsistentLedger(LedgerError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Maps a denial onto the caller-facing error, or yields the next state.
    pub fn into_result(self) -> Result<AuthorizationState, GatewayError> {
        match self {
            Self::Allow { next_state } => Ok(next_state),
            Self::DenyForbiddenTenant => Err(GatewayError::Forbidden),
            Self::DenyWrongState { operation, state } => {
                Err(GatewayError::InvalidState { operation, state })
            }
            Self::DenyAmountExceedsHeadroom {
                operation,
                requested,
                headroom,
            } => Err(GatewayError::AmountExceedsHeadroom {
                operation,
                requested,
                headroom,
            }),
            Self::DenyInconsistentLedger(e) => Err(GatewayError::Ledger(e)),
        }
    }
}

pub fn evaluate(request: &TransitionRequest<'_>) -> Decision {
    if request.requesting_merchant != request.owning_merchant {
        return Decision::DenyForbiddenTenant;
    }

    let operation = request.operation.kind();
    if !operation.legal_states().contains(&request.state) {
        return Decision::DenyWrongState {
            operation,
            state: request.state,
        };
    }

    let requested = match request.operation {
        Operation::Capture(requested) | Operation::Refund(requested) => requested,
        Operation::Void => {
            return Decision::Allow {
                next_state: operation.resulting_state(),
            };
        }
    };

    let totals = match request.totals {
        Ok(totals) => totals,
        Err(e) => return Decision::DenyInconsistentLedger(e),
    };
    let headroom = match operation {
        OperationKind::Capture => totals.capture_headroom(),
        _ => totals.refund_headroom(),
    };

    if !headroom.covers(requested) {
        return Decision::DenyAmountExceedsHeadroom {
            operation,
            requested,
            headroom,
        };
    }

    Decision::Allow {
        next_state: operation.resulting_state(),
    }
}
