use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::marketplace::leads::{Lead, LeadId, LeadStatus, LeadSummary};

/// Topic carrying every lead event.
pub const GLOBAL_FEED_TOPIC: &str = "leads.feed";

/// Topic carrying events for a single lead.
pub fn lead_topic(id: &LeadId) -> String {
    format!("leads.{}", id.0)
}

/// Push event delivered to feed subscribers, JSON-encoded with a `type`
/// tag.
///
/// Events describe state, not deltas: a subscriber that misses a frame is
/// fully caught up by the next one for the same lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeadEvent {
    /// A claim slot was taken or returned, or the lead stopped admitting
    /// claims.
    ClaimStateChanged {
        lead_id: LeadId,
        current_claims: u32,
        remaining_slots: u32,
        is_available: bool,
        status: LeadStatus,
    },
    LeadCreated { lead: LeadSummary },
    LeadUpdated { lead: LeadSummary },
    LeadDeleted { lead_id: LeadId },
}

impl LeadEvent {
    pub fn claim_state(lead: &Lead, now: DateTime<Utc>) -> Self {
        LeadEvent::ClaimStateChanged {
            lead_id: lead.id.clone(),
            current_claims: lead.current_claims,
            remaining_slots: lead.remaining_slots(),
            is_available: lead.is_available(now),
            status: lead.status(now),
        }
    }

    pub fn created(lead: &Lead, now: DateTime<Utc>) -> Self {
        LeadEvent::LeadCreated {
            lead: lead.summary(now),
        }
    }

    pub fn updated(lead: &Lead, now: DateTime<Utc>) -> Self {
        LeadEvent::LeadUpdated {
            lead: lead.summary(now),
        }
    }

    pub fn deleted(id: LeadId) -> Self {
        LeadEvent::LeadDeleted { lead_id: id }
    }

    /// The lead this event concerns; selects the per-lead topic.
    pub fn lead_id(&self) -> &LeadId {
        match self {
            LeadEvent::ClaimStateChanged { lead_id, .. }
            | LeadEvent::LeadDeleted { lead_id } => lead_id,
            LeadEvent::LeadCreated { lead } | LeadEvent::LeadUpdated { lead } => &lead.id,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            LeadEvent::ClaimStateChanged { .. } => "claim_state_changed",
            LeadEvent::LeadCreated { .. } => "lead_created",
            LeadEvent::LeadUpdated { .. } => "lead_updated",
            LeadEvent::LeadDeleted { .. } => "lead_deleted",
        }
    }
}
