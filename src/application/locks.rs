use crate::domain::authorization::AuthorizationId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per authorization id.
///
/// Holding the guard returned by [`AuthorizationLocks::acquire`] gives exclusive access to
/// the read-guard-write sequence for that authorization. The guard is owned, so it can be
/// moved into a spawned task and outlive the caller's future.
#[derive(Default)]
pub struct AuthorizationLocks {
    locks: Mutex<HashMap<AuthorizationId, Arc<Mutex<()>>>>,
}

impl AuthorizationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: &AuthorizationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // An entry only the map references is neither held nor awaited.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of ids with a live entry. Entries are pruned lazily on the next `acquire`.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
