//! Adapters for the ports in [`crate::domain::ports`].

pub mod in_memory;
pub mod processor;
pub mod reconciliation;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
