//! Domain layer: authorization records, ledger arithmetic, the transition guard and the
//! collaborator contracts. Nothing in here performs I/O.

pub mod authorization;
pub mod card;
pub mod guard;
pub mod ledger;
pub mod money;
pub mod ports;
pub mod transaction;
