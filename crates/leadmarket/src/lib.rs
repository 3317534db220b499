//! Lead claim arbitration and dynamic pricing for the provider
//! marketplace.
//!
//! Clients post job leads; providers spend wallet credits to claim them.
//! This crate owns the whole decision path: pricing a lead when it comes
//! in, arbitrating concurrent claim attempts against the claim cap,
//! moving credits through the append-only wallet ledger, and fanning the
//! resulting state changes out to feed subscribers.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
