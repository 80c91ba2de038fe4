#![allow(dead_code)]

use payment_gateway::application::config::ServiceConfig;
use payment_gateway::application::service::AuthorizationService;
use payment_gateway::domain::authorization::{AuthorizationId, CurrencyCode, MerchantId};
use payment_gateway::domain::card::CreditCard;
use payment_gateway::domain::money::Amount;
use payment_gateway::infrastructure::in_memory::InMemoryAuthorizationStore;
use payment_gateway::infrastructure::processor::SimulatedProcessor;
use payment_gateway::infrastructure::reconciliation::InMemoryReconciliationLog;
use rust_decimal::Decimal;
use std::io::{Error, Write};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

pub const HEADER: &str =
    "type, merchant, reference, amount, currency, card_number, card_name, expiry_month, expiry_year, cvv";

/// A Luhn-valid test card that never expires within the test suite's lifetime.
pub const VISA: u64 = 4000000000000119;
pub const MASTERCARD: u64 = 5555555555554444;

/// The service plus handles on every adapter behind it.
pub struct Gateway {
    pub service: AuthorizationService,
    pub store: InMemoryAuthorizationStore,
    pub processor: SimulatedProcessor,
    pub reconciliation: InMemoryReconciliationLog,
}

pub fn gateway() -> Gateway {
    gateway_with(ServiceConfig::default())
}

pub fn gateway_with(config: ServiceConfig) -> Gateway {
    let store = InMemoryAuthorizationStore::with_currencies(
        ["EUR", "GBP", "USD"].map(|code| CurrencyCode::parse(code).unwrap()),
    );
    let processor = SimulatedProcessor::new();
    let reconciliation = InMemoryReconciliationLog::new();
    let service = AuthorizationService::new(
        Arc::new(store.clone()),
        Arc::new(processor.clone()),
        Arc::new(reconciliation.clone()),
        config,
    );
    Gateway {
        service,
        store,
        processor,
        reconciliation,
    }
}

pub fn short_processor_timeout() -> ServiceConfig {
    ServiceConfig::default().with_processor_timeout(Duration::from_millis(100))
}

pub fn short_storage_timeout() -> ServiceConfig {
    ServiceConfig::default().with_storage_timeout(Duration::from_millis(100))
}

pub fn merchant(name: &str) -> MerchantId {
    MerchantId::new(name)
}

pub fn eur() -> CurrencyCode {
    CurrencyCode::parse("EUR").unwrap()
}

pub fn card(number: u64) -> CreditCard {
    CreditCard::new("Jane Doe", number, 12, 2099, 123)
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

impl Gateway {
    /// Authorizes `value` EUR on the default test card for `owner`.
    pub async fn authorize(&self, owner: &str, value: Decimal) -> AuthorizationId {
        self.service
            .authorize(&merchant(owner), &eur(), amount(value), card(VISA))
            .await
            .unwrap()
    }
}

/// Writes an operations file with the standard header followed by `rows`.
pub fn operations_csv(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{HEADER}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    file.flush()?;
    Ok(file)
}
