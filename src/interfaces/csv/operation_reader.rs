use crate::domain::authorization::{CurrencyCode, MerchantId};
use crate::domain::card::CreditCard;
use crate::domain::money::Amount;
use crate::error::GatewayError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Authorize,
    Capture,
    Refund,
    Void,
}

/// One raw CSV row. Which optional columns are required depends on `kind`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationRecord {
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub merchant: String,
    pub reference: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub card_number: Option<u64>,
    #[serde(default)]
    pub card_name: Option<String>,
    #[serde(default)]
    pub expiry_month: Option<u32>,
    #[serde(default)]
    pub expiry_year: Option<i32>,
    #[serde(default)]
    pub cvv: Option<u16>,
}

/// A validated merchant request, ready for the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Authorize {
        merchant: MerchantId,
        reference: String,
        currency: CurrencyCode,
        amount: Amount,
        card: CreditCard,
    },
    Capture {
        merchant: MerchantId,
        reference: String,
        amount: Amount,
    },
    Refund {
        merchant: MerchantId,
        reference: String,
        amount: Amount,
    },
    Void {
        merchant: MerchantId,
        reference: String,
    },
}

impl Command {
    pub fn reference(&self) -> &str {
        match self {
            Self::Authorize { reference, .. }
            | Self::Capture { reference, .. }
            | Self::Refund { reference, .. }
            | Self::Void { reference, .. } => reference,
        }
    }
}

fn required<T>(value: Option<T>, column: &str) -> Result<T, GatewayError> {
    value.ok_or_else(|| GatewayError::Validation(format!("missing {column}")))
}

impl TryFrom<OperationRecord> for Command {
    type Error = GatewayError;

    fn try_from(record: OperationRecord) -> Result<Self, Self::Error> {
        if record.merchant.is_empty() {
            return Err(GatewayError::Validation("missing merchant".into()));
        }
        if record.reference.is_empty() {
            return Err(GatewayError::Validation("missing reference".into()));
        }
        let merchant = MerchantId::new(record.merchant);
        let reference = record.reference;

        let command = match record.kind {
            OperationType::Authorize => Self::Authorize {
                merchant,
                reference,
                currency: CurrencyCode::parse(&required(record.currency, "currency")?)?,
                amount: Amount::new(required(record.amount, "amount")?)?,
                card: CreditCard::new(
                    required(record.card_name, "card_name")?,
                    required(record.card_number, "card_number")?,
                    required(record.expiry_month, "expiry_month")?,
                    required(record.expiry_year, "expiry_year")?,
                    required(record.cvv, "cvv")?,
                ),
            },
            OperationType::Capture => Self::Capture {
                merchant,
                reference,
                amount: Amount::new(required(record.amount, "amount")?)?,
            },
            OperationType::Refund => Self::Refund {
                merchant,
                reference,
                amount: Amount::new(required(record.amount, "amount")?)?,
            },
            OperationType::Void => Self::Void {
                merchant,
                reference,
            },
        };
        Ok(command)
    }
}

/// Reads merchant operations from a CSV source.
///
/// Whitespace is trimmed and rows may omit trailing columns they do not use.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows; a malformed row yields an error without ending the stream.
    pub fn records(self) -> impl Iterator<Item = Result<OperationRecord, csv::Error>> {
        self.reader.into_deserialize()
    }
}
