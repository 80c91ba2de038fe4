use crate::domain::authorization::{Authorization, AuthorizationId, CurrencyCode};
use crate::domain::ports::{AuthorizationStore, LedgerEntry};
use crate::error::StoreError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family holding one serialized `Authorization` per id, ledger included.
pub const CF_AUTHORIZATIONS: &str = "authorizations";
/// Column Family holding supported currency codes as keys.
pub const CF_CURRENCIES: &str = "currencies";

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// A persistent store implementation using RocksDB.
///
/// Each authorization is stored as a single value, so the ledger and the state label are
/// always written together. Read-modify-write cycles in `record` and `create_authorization`
/// are serialized by a process-wide mutex.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    writes: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("authorizations" and "currencies") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_authorizations = ColumnFamilyDescriptor::new(CF_AUTHORIZATIONS, Options::default());
        let cf_currencies = ColumnFamilyDescriptor::new(CF_CURRENCIES, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_authorizations, cf_currencies])?;

        Ok(Self {
            db: Arc::new(db),
            writes: Arc::new(Mutex::new(())),
        })
    }

    pub fn register_currency(&self, code: &CurrencyCode) -> Result<(), StoreError> {
        let cf = self.cf(CF_CURRENCIES)?;
        self.db.put_cf(&cf, code.as_str().as_bytes(), b"")?;
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::storage(format!("{name} column family not found")))
    }

    fn load(&self, id: &AuthorizationId) -> Result<Option<Authorization>, StoreError> {
        let cf = self.cf(CF_AUTHORIZATIONS)?;
        match self.db.get_pinned_cf(&cf, id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, authorization: &Authorization) -> Result<(), StoreError> {
        let cf = self.cf(CF_AUTHORIZATIONS)?;
        let value = serde_json::to_vec(authorization)?;
        self.db
            .put_cf(&cf, authorization.id.as_str().as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl AuthorizationStore for RocksDBStore {
    async fn currency_exists(&self, code: &CurrencyCode) -> Result<bool, StoreError> {
        let cf = self.cf(CF_CURRENCIES)?;
        Ok(self.db.get_pinned_cf(&cf, code.as_str().as_bytes())?.is_some())
    }

    async fn create_authorization(&self, authorization: Authorization) -> Result<(), StoreError> {
        let _writes = self.writes.lock().await;
        if self.load(&authorization.id)?.is_some() {
            return Err(StoreError::AlreadyExists(authorization.id));
        }
        self.save(&authorization)
    }

    async fn get_authorization(&self, id: &AuthorizationId) -> Result<Authorization, StoreError> {
        self.load(id)?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list_authorizations(&self) -> Result<Vec<Authorization>, StoreError> {
        let cf = self.cf(CF_AUTHORIZATIONS)?;
        let mut authorizations = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_key, value) = item?;
            authorizations.push(serde_json::from_slice(&value)?);
        }
        Ok(authorizations)
    }

    async fn record(&self, id: &AuthorizationId, entry: LedgerEntry) -> Result<(), StoreError> {
        let _writes = self.writes.lock().await;
        let mut authorization = self
            .load(id)?
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
        self.save(&authorization)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.cf(CF_AUTHORIZATIONS)?;
        self.cf(CF_CURRENCIES)?;
        Ok(())
    }
}
