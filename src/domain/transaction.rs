use super::authorization::AuthorizationId;
use super::money::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TransactionKind {
    Capture,
    Refund,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => f.write_str("Capture"),
            Self::Refund => f.write_str("Refund"),
        }
    }
}

/// A ledger-affecting event against an authorization. Append-only.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub authorization: AuthorizationId,
}

impl Transaction {
    pub fn capture(authorization: AuthorizationId, amount: Amount) -> Self {
        Self {
            kind: TransactionKind::Capture,
            amount,
            authorization,
        }
    }

    pub fn refund(authorization: AuthorizationId, amount: Amount) -> Self {
        Self {
            kind: TransactionKind::Refund,
            amount,
            authorization,
        }
    }
}
