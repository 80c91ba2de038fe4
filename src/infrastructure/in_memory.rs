use crate::domain::authorization::{Authorization, AuthorizationId, CurrencyCode};
use crate::domain::ports::{AuthorizationStore, LedgerEntry};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for authorizations and supported currencies.
///
/// Uses `Arc<RwLock<HashMap<AuthorizationId, Authorization>>>` so clones share state.
/// `record` applies the transaction and the state label under a single write lock.
#[derive(Default, Clone)]
pub struct InMemoryAuthorizationStore {
    authorizations: Arc<RwLock<HashMap<AuthorizationId, Authorization>>>,
    currencies: Arc<RwLock<HashSet<CurrencyCode>>>,
    failing: Arc<AtomicBool>,
    read_latency_ms: Arc<AtomicU64>,
    write_latency_ms: Arc<AtomicU64>,
}

impl InMemoryAuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already supports `currencies`.
    pub fn with_currencies(currencies: impl IntoIterator<Item = CurrencyCode>) -> Self {
        Self {
            currencies: Arc::new(RwLock::new(currencies.into_iter().collect())),
            ..Self::default()
        }
    }

    pub async fn register_currency(&self, code: CurrencyCode) {
        self.currencies.write().await.insert(code);
    }

    /// While set, every write and health check fails with a storage error. Reads still work.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay applied before every read (currency lookups, gets and listings).
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delay applied before every write. A write abandoned during the delay changes nothing.
    pub fn set_write_latency(&self, latency: Duration) {
        self.write_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn delay(latency_ms: &AtomicU64) {
        let ms = latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::storage("in-memory store is refusing writes"));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    async fn currency_exists(&self, code: &CurrencyCode) -> Result<bool, StoreError> {
        Self::delay(&self.read_latency_ms).await;
        Ok(self.currencies.read().await.contains(code))
    }

    async fn create_authorization(&self, authorization: Authorization) -> Result<(), StoreError> {
        Self::delay(&self.write_latency_ms).await;
        self.check_writable()?;
        let mut authorizations = self.authorizations.write().await;
        if authorizations.contains_key(&authorization.id) {
            return Err(StoreError::AlreadyExists(authorization.id));
        }
        authorizations.insert(authorization.id.clone(), authorization);
        Ok(())
    }

    async fn get_authorization(&self, id: &AuthorizationId) -> Result<Authorization, StoreError> {
        Self::delay(&self.read_latency_ms).await;
        self.authorizations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list_authorizations(&self) -> Result<Vec<Authorization>, StoreError> {
        Self::delay(&self.read_latency_ms).await;
        let authorizations = self.authorizations.read().await;
        let mut all: Vec<Authorization> = authorizations.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn record(&self, id: &AuthorizationId, entry: LedgerEntry) -> Result<(), StoreError> {
        Self::delay(&self.write_latency_ms).await;
        self.check_writable()?;
        let mut authorizations = self.authorizations.write().await;
        let authorization = authorizations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if let Some(transaction) = entry.transaction {
            if &transaction.authorization != id {
                return Err(StoreError::Validation(format!(
                    "transaction belongs to {}, not {id}",
                    transaction.authorization
                )));
            }
            authorization.transactions.push(transaction);
        }
        authorization.state = entry.state;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check_writable()
    }
}
