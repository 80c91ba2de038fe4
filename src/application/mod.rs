//! Application layer containing the authorization lifecycle orchestration.
//!
//! This module defines the `AuthorizationService`, the entry point for every merchant and
//! management operation. It serializes work per authorization with keyed `tokio` mutexes
//! and runs each processor-call-then-write step on its own task.

pub mod config;
pub mod locks;
pub mod service;
