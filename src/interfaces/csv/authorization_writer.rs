use crate::domain::authorization::Authorization;
use crate::domain::ledger::LedgerTotals;
use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One line of the management listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRow {
    pub reference: String,
    pub authorization: String,
    pub merchant: String,
    pub state: String,
    pub currency: String,
    pub amount: Decimal,
    pub captured: Decimal,
    pub net_captured: Decimal,
}

impl ListingRow {
    /// Builds the row from the stored record, re-deriving the ledger totals.
    pub fn new(
        authorization: &Authorization,
        reference: Option<&str>,
    ) -> Result<Self, LedgerError> {
        let totals = LedgerTotals::derive(authorization)?;
        Ok(Self {
            reference: reference.unwrap_or_default().to_string(),
            authorization: authorization.id.to_string(),
            merchant: authorization.merchant.to_string(),
            state: authorization.state.to_string(),
            currency: authorization.currency.to_string(),
            amount: authorization.amount.value().normalize(),
            captured: totals.captured.value().normalize(),
            net_captured: totals.net_captured.value().normalize(),
        })
    }
}

/// Writes the authorization listing as CSV.
pub struct AuthorizationWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AuthorizationWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes a header followed by every row, then flushes.
    pub fn write_rows(
        &mut self,
        rows: impl IntoIterator<Item = ListingRow>,
    ) -> Result<(), csv::Error> {
        let mut empty = true;
        for row in rows {
            self.writer.serialize(row)?;
            empty = false;
        }
        if empty {
            self.writer.write_record([
                "reference",
                "authorization",
                "merchant",
                "state",
                "currency",
                "amount",
                "captured",
                "net_captured",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
