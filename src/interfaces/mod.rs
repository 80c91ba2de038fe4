//! Batch surfaces for driving the service from files.

pub mod csv;
