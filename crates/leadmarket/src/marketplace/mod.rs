//! The marketplace engine: lead intake and pricing, claim arbitration,
//! the wallet ledger, and the real-time lead feed.
//!
//! Each submodule owns its domain types, its storage seam (a repository
//! trait plus the in-memory implementation used by single-process
//! deployments and tests), the service that drives it, and an axum router
//! exposing it. Surrounding platform concerns (accounts, payments
//! reconciliation, the multiplier training pipeline) stay behind traits.

pub mod claims;
pub mod feed;
pub mod leads;
pub mod pricing;
pub mod store;
pub mod wallet;
