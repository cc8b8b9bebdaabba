//! Starts the bond workflow automations against a running ledger sandbox.

pub mod service;
pub mod triggers;
