use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use super::domain::{Lead, LeadId, LeadSubmission};
use super::repository::LeadRepository;
use crate::marketplace::feed::{FeedPublisher, LeadBroadcaster};
use crate::marketplace::pricing::{PriceCalculator, PricingFactorSource};
use crate::marketplace::store::StoreError;

/// Claim cap applied when a submission does not name one.
pub const DEFAULT_MAX_CLAIMS: u32 = 3;

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

/// Errors surfaced by lead intake and lifecycle operations.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("max_claims must be at least 1")]
    ZeroCapacity,
    #[error("expiry {expires_at} is not in the future")]
    ExpiryNotInFuture { expires_at: DateTime<Utc> },
    #[error("lead {lead} already exists")]
    DuplicateLead { lead: LeadId },
    #[error("lead {lead} not found")]
    LeadNotFound { lead: LeadId },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a removal request was honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// No claims existed; the lead is gone.
    Deleted,
    /// Providers already paid for claims on it, so the lead was closed
    /// to further claiming instead of deleted.
    SoftClosed,
}

impl RemovalOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            RemovalOutcome::Deleted => "deleted",
            RemovalOutcome::SoftClosed => "closed",
        }
    }
}

/// Client job intake: prices incoming leads once, registers them, and
/// drives their lifecycle until they are claimed out, closed, or removed.
pub struct LeadIntake<R, S, F> {
    leads: Arc<R>,
    pricing: PriceCalculator<S>,
    broadcaster: LeadBroadcaster<F>,
}

impl<R, S, F> LeadIntake<R, S, F>
where
    R: LeadRepository,
    S: PricingFactorSource,
    F: FeedPublisher,
{
    pub fn new(
        leads: Arc<R>,
        pricing: PriceCalculator<S>,
        broadcaster: LeadBroadcaster<F>,
    ) -> Self {
        Self {
            leads,
            pricing,
            broadcaster,
        }
    }

    /// Validate, price, and register a submitted lead.
    ///
    /// The quoted credit cost is written into the lead and never revised;
    /// providers claiming later pay this price even if the multiplier
    /// table has moved on.
    pub fn create(&self, submission: LeadSubmission) -> Result<Lead, IntakeError> {
        let now = Utc::now();
        let max_claims = submission.max_claims.unwrap_or(DEFAULT_MAX_CLAIMS);
        if max_claims == 0 {
            return Err(IntakeError::ZeroCapacity);
        }
        if submission.expires_at <= now {
            return Err(IntakeError::ExpiryNotInFuture {
                expires_at: submission.expires_at,
            });
        }

        let quote = self.pricing.quote(
            &submission.category,
            &submission.location,
            submission.urgency,
            now,
        );
        let lead = Lead {
            id: submission.id.unwrap_or_else(next_lead_id),
            category: submission.category,
            location: submission.location,
            urgency: submission.urgency,
            credit_cost: quote.credit_cost,
            max_claims,
            current_claims: 0,
            created_at: now,
            expires_at: submission.expires_at,
            claimed_at: None,
            closed_at: None,
        };

        let lead_id = lead.id.clone();
        let lead = match self.leads.insert(lead) {
            Ok(lead) => lead,
            Err(StoreError::Conflict) => {
                return Err(IntakeError::DuplicateLead { lead: lead_id })
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            lead = %lead.id,
            category = %lead.category,
            cost = %lead.credit_cost,
            multiplier = %quote.multiplier,
            source = quote.source.label(),
            "lead registered"
        );
        self.broadcaster.lead_created(&lead, now);
        Ok(lead)
    }

    pub fn get(&self, id: &LeadId) -> Result<Lead, IntakeError> {
        self.leads
            .fetch(id)?
            .ok_or_else(|| IntakeError::LeadNotFound { lead: id.clone() })
    }

    /// Leads currently open for claiming, newest first.
    pub fn available(&self) -> Result<Vec<Lead>, IntakeError> {
        Ok(self.leads.available(Utc::now())?)
    }

    /// Withdraw a lead from claiming. Idempotent.
    pub fn close(&self, id: &LeadId) -> Result<Lead, IntakeError> {
        let now = Utc::now();
        match self.leads.close(id, now) {
            Ok(lead) => {
                info!(lead = %id, "lead closed");
                self.broadcaster.lead_updated(&lead, now);
                Ok(lead)
            }
            Err(StoreError::NotFound) => Err(IntakeError::LeadNotFound { lead: id.clone() }),
            Err(other) => Err(other.into()),
        }
    }

    /// Remove a lead. Leads with paid claims are never deleted out from
    /// under their claimants; those are closed to further claiming
    /// instead, keeping the paid records intact.
    pub fn remove(&self, id: &LeadId) -> Result<RemovalOutcome, IntakeError> {
        match self.leads.remove(id) {
            Ok(()) => {
                info!(lead = %id, "lead deleted");
                self.broadcaster.lead_deleted(id.clone());
                Ok(RemovalOutcome::Deleted)
            }
            Err(StoreError::Conflict) => {
                let lead = self.close(id)?;
                info!(lead = %id, claims = lead.current_claims, "lead closed instead of deleted");
                Ok(RemovalOutcome::SoftClosed)
            }
            Err(StoreError::NotFound) => Err(IntakeError::LeadNotFound { lead: id.clone() }),
            Err(other) => Err(other.into()),
        }
    }
}
