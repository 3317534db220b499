use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::marketplace::leads::{LeadId, ProviderId};

/// Identifier wrapper for admitted claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimId(pub String);

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the provider settled the claim price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Credits,
}

impl PaymentMethod {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentMethod::Credits => "credits",
        }
    }
}

/// A paid, admitted binding of one provider to one lead.
///
/// Claims are immutable once written; undoing one is a ledger refund,
/// never an edit. `price_paid` records the cost actually charged, which
/// is the lead's frozen creation-time price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    pub price_paid: Decimal,
    pub claimed_at: DateTime<Utc>,
    pub payment_method: PaymentMethod,
}

/// User-facing reason a claim attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LeadFull,
    LeadExpired,
    DuplicateClaim,
    InsufficientCredits,
    ClaimFailed,
}

impl RejectReason {
    pub const fn label(self) -> &'static str {
        match self {
            RejectReason::LeadFull => "lead_full",
            RejectReason::LeadExpired => "lead_expired",
            RejectReason::DuplicateClaim => "duplicate_claim",
            RejectReason::InsufficientCredits => "insufficient_credits",
            RejectReason::ClaimFailed => "claim_failed",
        }
    }

    /// Message shown to the provider alongside the rejection.
    pub const fn message(self) -> &'static str {
        match self {
            RejectReason::LeadFull => "this lead has already reached its claim limit",
            RejectReason::LeadExpired => "this lead is no longer open for claims",
            RejectReason::DuplicateClaim => "you have already claimed this lead",
            RejectReason::InsufficientCredits => {
                "your wallet balance does not cover the lead price"
            }
            RejectReason::ClaimFailed => "the claim could not be completed, please try again",
        }
    }
}

/// Outcome of one arbitrated claim attempt.
///
/// Rejections are ordinary outcomes here, not errors; the only error the
/// arbiter raises is for a lead that does not exist at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimDecision {
    Admitted { claim: Claim, remaining_slots: u32 },
    Rejected { reason: RejectReason, remaining_slots: u32 },
}

impl ClaimDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, ClaimDecision::Admitted { .. })
    }

    pub fn remaining_slots(&self) -> u32 {
        match self {
            ClaimDecision::Admitted { remaining_slots, .. }
            | ClaimDecision::Rejected { remaining_slots, .. } => *remaining_slots,
        }
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        match self {
            ClaimDecision::Admitted {
                claim,
                remaining_slots,
            } => format!(
                "admitted claim {} on lead {} ({} slots left)",
                claim.id, claim.lead_id, remaining_slots
            ),
            ClaimDecision::Rejected {
                reason,
                remaining_slots,
            } => format!(
                "rejected: {} ({} slots left)",
                reason.label(),
                remaining_slots
            ),
        }
    }
}
