use super::card::CardReference;
use super::money::Amount;
use super::transaction::Transaction;
use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the payment processor when an authorization succeeds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationId(String);

impl AuthorizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Merchant identity as resolved by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantId(String);

impl MerchantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three-letter currency code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn parse(code: &str) -> Result<Self, GatewayError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(GatewayError::Validation(format!(
                "currency code '{code}' is not a three-letter code"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle label of an authorization.
///
/// `Voided` is terminal. `Captured` and `Refunded` stay open for further operations while
/// the ledger has headroom; see [`crate::domain::guard`] for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationState {
    Authorised,
    Captured,
    Refunded,
    Voided,
}

impl AuthorizationState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authorised => "Authorised",
            Self::Captured => "Captured",
            Self::Refunded => "Refunded",
            Self::Voided => "Voided",
        }
    }
}

impl fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One merchant's claim to capture up to `amount` from one card.
///
/// `amount` is fixed at creation. Only `state` and `transactions` evolve, and only through
/// the store's `record` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    pub state: AuthorizationState,
    pub currency: CurrencyCode,
    pub amount: Amount,
    pub merchant: MerchantId,
    pub card: CardReference,
    /// Ledger history in insertion order.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Authorization {
    /// Builds a freshly approved authorization in the `Authorised` state.
    pub fn new(
        id: AuthorizationId,
        currency: CurrencyCode,
        amount: Amount,
        merchant: MerchantId,
        card: CardReference,
    ) -> Self {
        Self {
            id,
            state: AuthorizationState::Authorised,
            currency,
            amount,
            merchant,
            card,
            transactions: Vec::new(),
        }
    }

    pub fn summary(&self) -> AuthorizationSummary {
        AuthorizationSummary {
            id: self.id.clone(),
            state: self.state,
            currency: self.currency.clone(),
            amount: self.amount,
            merchant: self.merchant.clone(),
        }
    }
}

/// Listing row: an authorization without card details or ledger history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationSummary {
    pub id: AuthorizationId,
    pub state: AuthorizationState,
    pub currency: CurrencyCode,
    pub amount: Amount,
    pub merchant: MerchantId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::CreditCard;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_code_normalizes_case() {
        assert_eq!(CurrencyCode::parse("eur").unwrap().as_str(), "EUR");
        assert_eq!(CurrencyCode::parse(" Gbp ").unwrap().as_str(), "GBP");
    }

    #[test]
    fn test_currency_code_rejects_malformed() {
        for code in ["", "EU", "EURO", "E1R", "€€€"] {
            assert!(
                matches!(CurrencyCode::parse(code), Err(GatewayError::Validation(_))),
                "{code} should be rejected"
            );
        }
    }

    #[test]
    fn test_new_authorization_starts_authorised_and_empty() {
        let card = CreditCard::new("Jane Doe", 4000000000000119, 12, 2099, 123);
        let auth = Authorization::new(
            AuthorizationId::new("auth-1"),
            CurrencyCode::parse("EUR").unwrap(),
            Amount::new(dec!(10.50)).unwrap(),
            MerchantId::new("merchant-a"),
            card.reference(),
        );

        assert_eq!(auth.state, AuthorizationState::Authorised);
        assert!(auth.transactions.is_empty());

        let summary = auth.summary();
        assert_eq!(summary.id, auth.id);
        assert_eq!(summary.amount, auth.amount);
    }

    #[test]
    fn test_authorization_json_round_trip_keeps_state_label() {
        let card = CreditCard::new("Jane Doe", 4000000000000119, 12, 2099, 123);
        let mut auth = Authorization::new(
            AuthorizationId::new("auth-1"),
            CurrencyCode::parse("USD").unwrap(),
            Amount::new(dec!(99.99)).unwrap(),
            MerchantId::new("merchant-a"),
            card.reference(),
        );
        auth.state = AuthorizationState::Refunded;

        let json = serde_json::to_string(&auth).unwrap();
        assert!(json.contains("\"Refunded\""));
        assert!(!json.contains("4000000000000119"));

        let restored: Authorization = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, auth);
    }
}
