//! Ledger arithmetic over an authorization's transaction history.
//!
//! Totals are never stored. They are recomputed from the transaction sequence every time a
//! decision depends on them, so the history is the only source of truth.

use super::authorization::Authorization;
use super::money::{Amount, Balance};
use super::transaction::{Transaction, TransactionKind};
use crate::error::LedgerError;

fn sum_of(transactions: &[Transaction], kind: TransactionKind) -> Balance {
    transactions
        .iter()
        .filter(|tx| tx.kind == kind)
        .fold(Balance::ZERO, |total, tx| total + Balance::from(tx.amount))
}

/// Sum of all capture amounts. Zero for an empty history.
pub fn captured_total(transactions: &[Transaction]) -> Balance {
    sum_of(transactions, TransactionKind::Capture)
}

/// Sum of all refund amounts. Zero for an empty history.
pub fn refunded_total(transactions: &[Transaction]) -> Balance {
    sum_of(transactions, TransactionKind::Refund)
}

/// Captured minus refunded.
///
/// A negative result means the stored history already violates the ledger invariants and is
/// reported as [`LedgerError::NegativeNetCaptured`], never clamped.
pub fn net_captured(transactions: &[Transaction]) -> Result<Balance, LedgerError> {
    let captured = captured_total(transactions);
    let refunded = refunded_total(transactions);
    let net = captured - refunded;
    if net.is_negative() {
        return Err(LedgerError::NegativeNetCaptured { captured, refunded });
    }
    Ok(net)
}

/// Both derived totals of one authorization, checked against its authorized amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerTotals {
    pub authorized: Amount,
    pub captured: Balance,
    pub net_captured: Balance,
}

impl LedgerTotals {
    pub fn derive(authorization: &Authorization) -> Result<Self, LedgerError> {
        let captured = captured_total(&authorization.transactions);
        let authorized = authorization.amount;
        if captured > Balance::from(authorized) {
            return Err(LedgerError::CapturedExceedsAuthorized {
                captured,
                authorized: Balance::from(authorized),
            });
        }
        Ok(Self {
            authorized,
            captured,
            net_captured: net_captured(&authorization.transactions)?,
        })
    }

    /// Amount that can still be captured.
    pub fn capture_headroom(&self) -> Balance {
        Balance::from(self.authorized) - self.captured
    }

    /// Amount that can still be refunded.
    pub fn refund_headroom(&self) -> Balance {
        self.net_captured
    }
}
