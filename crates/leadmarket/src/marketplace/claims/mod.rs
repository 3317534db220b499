//! Claim arbitration: the paid, capacity-capped binding of providers to
//! leads. The arbiter is the only writer of claims and the only caller
//! of the wallet debit path.

pub mod arbiter;
pub mod domain;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use arbiter::{ClaimArbiter, ClaimPolicy, ClaimServiceError, RefundError};
pub use domain::{Claim, ClaimDecision, ClaimId, PaymentMethod, RejectReason};
pub use repository::{ClaimRepository, InMemoryClaimStore};
pub use router::claim_router;
