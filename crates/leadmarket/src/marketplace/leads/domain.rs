use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Identifier wrapper for provider accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId(pub String);

/// Job category as advertised to providers, e.g. `plumbing`.
///
/// The vocabulary is open; categories unknown to the pricing table fall
/// back to the default base price.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category(pub String);

/// Coarse service area the job sits in, e.g. a postcode district.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location(pub String);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How quickly the client needs the job done. Feeds the pricing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Flexible,
    Standard,
    Urgent,
    Emergency,
}

impl UrgencyTier {
    pub const fn label(self) -> &'static str {
        match self {
            UrgencyTier::Flexible => "flexible",
            UrgencyTier::Standard => "standard",
            UrgencyTier::Urgent => "urgent",
            UrgencyTier::Emergency => "emergency",
        }
    }
}

/// Claiming state of a lead as surfaced to availability queries and the
/// real-time feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// At least one claim slot is free and the lead has not lapsed.
    Open,
    /// Every claim slot is sold. Terminal.
    Claimed,
    /// Withdrawn by the client or by an operator before selling out.
    Closed,
    /// Reached its expiry before selling out.
    Expired,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::Open => "open",
            LeadStatus::Claimed => "claimed",
            LeadStatus::Closed => "closed",
            LeadStatus::Expired => "expired",
        }
    }
}

/// One client job request open for provider claims.
///
/// `credit_cost` is fixed at creation time by the price calculator and
/// never changes afterwards, whatever the multiplier table does later.
/// The claim counters are only ever moved through
/// [`LeadRepository::reserve_slot`](super::repository::LeadRepository::reserve_slot)
/// and its rollback twin, which is what keeps the `max_claims` cap exact
/// under concurrent claiming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub category: Category,
    pub location: Location,
    pub urgency: UrgencyTier,
    pub credit_cost: Decimal,
    pub max_claims: u32,
    pub current_claims: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set when the final slot sells, i.e. when the lead becomes `Claimed`.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Set when the lead is withdrawn without selling out.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Lead {
    pub fn is_full(&self) -> bool {
        self.current_claims >= self.max_claims
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// True while the lead can still admit a claim at `now`.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        !self.is_full() && !self.is_closed() && !self.is_expired(now)
    }

    pub fn remaining_slots(&self) -> u32 {
        self.max_claims.saturating_sub(self.current_claims)
    }

    /// Current lifecycle state. A sold-out lead stays `Claimed` even once
    /// its expiry passes; an explicit close outranks a quiet expiry.
    pub fn status(&self, now: DateTime<Utc>) -> LeadStatus {
        if self.is_full() {
            LeadStatus::Claimed
        } else if self.is_closed() {
            LeadStatus::Closed
        } else if self.is_expired(now) {
            LeadStatus::Expired
        } else {
            LeadStatus::Open
        }
    }

    /// Compact representation used by list endpoints and feed events.
    pub fn summary(&self, now: DateTime<Utc>) -> LeadSummary {
        LeadSummary {
            id: self.id.clone(),
            category: self.category.clone(),
            location: self.location.clone(),
            urgency: self.urgency,
            credit_cost: self.credit_cost,
            remaining_slots: self.remaining_slots(),
            expires_at: self.expires_at,
            status: self.status(now),
        }
    }

    /// Full representation returned by the lead detail endpoint.
    pub fn view(&self, now: DateTime<Utc>) -> LeadView {
        LeadView {
            id: self.id.clone(),
            category: self.category.clone(),
            location: self.location.clone(),
            urgency: self.urgency,
            credit_cost: self.credit_cost,
            max_claims: self.max_claims,
            current_claims: self.current_claims,
            remaining_slots: self.remaining_slots(),
            is_available: self.is_available(now),
            status: self.status(now),
            created_at: self.created_at,
            expires_at: self.expires_at,
            claimed_at: self.claimed_at,
            closed_at: self.closed_at,
        }
    }
}

/// Incoming lead, as submitted by the client intake flow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeadSubmission {
    /// Caller-supplied identifier; generated when absent.
    pub id: Option<LeadId>,
    pub category: Category,
    pub location: Location,
    pub urgency: UrgencyTier,
    pub expires_at: DateTime<Utc>,
    /// Claim cap; defaults to [`DEFAULT_MAX_CLAIMS`](super::intake::DEFAULT_MAX_CLAIMS).
    pub max_claims: Option<u32>,
}

/// Compact lead representation for lists and feed payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub id: LeadId,
    pub category: Category,
    pub location: Location,
    pub urgency: UrgencyTier,
    pub credit_cost: Decimal,
    pub remaining_slots: u32,
    pub expires_at: DateTime<Utc>,
    pub status: LeadStatus,
}

/// Full lead representation for the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadView {
    pub id: LeadId,
    pub category: Category,
    pub location: Location,
    pub urgency: UrgencyTier,
    pub credit_cost: Decimal,
    pub max_claims: u32,
    pub current_claims: u32,
    pub remaining_slots: u32,
    pub is_available: bool,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}
