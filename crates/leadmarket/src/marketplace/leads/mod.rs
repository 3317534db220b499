//! Client job leads: the sellable unit of the marketplace.
//!
//! A lead is created from a client request, priced once at creation, and
//! then sold to up to `max_claims` providers through the claim arbiter.

pub mod domain;
pub mod intake;
pub mod repository;
pub mod router;

pub use domain::{
    Category, Lead, LeadId, LeadStatus, LeadSubmission, LeadSummary, LeadView, Location,
    ProviderId, UrgencyTier,
};
pub use intake::{IntakeError, LeadIntake, RemovalOutcome, DEFAULT_MAX_CLAIMS};
pub use repository::{InMemoryLeadStore, LeadRepository, SlotRefusal, SlotReservation};
pub use router::lead_router;
