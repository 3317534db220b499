use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::domain::{Claim, ClaimDecision, ClaimId, PaymentMethod, RejectReason};
use super::repository::ClaimRepository;
use crate::marketplace::feed::{FeedPublisher, LeadBroadcaster};
use crate::marketplace::leads::repository::{SlotRefusal, SlotReservation};
use crate::marketplace::leads::{Lead, LeadId, LeadRepository, ProviderId};
use crate::marketplace::store::StoreError;
use crate::marketplace::wallet::{LedgerError, WalletLedger, WalletRepository, WalletTransaction};

static CLAIM_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_claim_id() -> ClaimId {
    let id = CLAIM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ClaimId(format!("claim-{id:06}"))
}

/// Tuning for the arbiter's retry budget against transient store trouble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    pub max_attempts: u32,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// The one arbiter failure that is the caller's mistake rather than a
/// claim outcome: asking about a lead that does not exist.
#[derive(Debug, Error)]
pub enum ClaimServiceError {
    #[error("lead {lead} not found")]
    LeadNotFound { lead: LeadId },
}

/// Errors surfaced by the administrative refund path.
#[derive(Debug, Error)]
pub enum RefundError {
    #[error("claim {claim} not found")]
    ClaimNotFound { claim: ClaimId },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Arbitrates concurrent claim attempts on leads.
///
/// Admission is a three-step pipeline: reserve a slot atomically in the
/// lead store, debit the wallet, persist the claim record. A failure in a
/// later step rolls back the earlier ones with compensating writes, so an
/// attempt either fully admits or leaves no trace beyond a reversal pair
/// in the ledger. The slot reservation alone enforces the claim cap;
/// everything before it is a fast path that saves wasted wallet work.
pub struct ClaimArbiter<L, C, W, F> {
    leads: Arc<L>,
    claims: Arc<C>,
    ledger: WalletLedger<W>,
    broadcaster: LeadBroadcaster<F>,
    policy: ClaimPolicy,
}

impl<L, C, W, F> ClaimArbiter<L, C, W, F>
where
    L: LeadRepository,
    C: ClaimRepository,
    W: WalletRepository,
    F: FeedPublisher,
{
    pub fn new(
        leads: Arc<L>,
        claims: Arc<C>,
        ledger: WalletLedger<W>,
        broadcaster: LeadBroadcaster<F>,
        policy: ClaimPolicy,
    ) -> Self {
        Self {
            leads,
            claims,
            ledger,
            broadcaster,
            policy,
        }
    }

    /// Decide one claim attempt by `provider` on `lead`.
    ///
    /// Safe to call from any number of threads at once; the cap can never
    /// be oversold because the slot reservation is atomic in the store.
    /// Retrying an attempt that already admitted returns the original
    /// claim again instead of charging twice.
    pub fn attempt_claim(
        &self,
        lead_id: &LeadId,
        provider_id: &ProviderId,
    ) -> Result<ClaimDecision, ClaimServiceError> {
        let now = Utc::now();

        let lead = match self.fetch_lead(lead_id) {
            Ok(Some(lead)) => lead,
            Ok(None) => {
                return Err(ClaimServiceError::LeadNotFound {
                    lead: lead_id.clone(),
                })
            }
            Err(err) => {
                warn!(lead = %lead_id, provider = %provider_id, error = %err, "lead fetch failed");
                return Ok(ClaimDecision::Rejected {
                    reason: RejectReason::ClaimFailed,
                    remaining_slots: 0,
                });
            }
        };

        // Committed duplicate first: a retry of an admitted claim replays
        // the original decision even when the lead has since sold out.
        match self.claims.find_for(lead_id, provider_id) {
            Ok(Some(existing)) => {
                debug!(
                    lead = %lead_id,
                    provider = %provider_id,
                    claim = %existing.id,
                    "replaying already admitted claim"
                );
                return Ok(ClaimDecision::Admitted {
                    claim: existing,
                    remaining_slots: lead.remaining_slots(),
                });
            }
            Ok(None) => {}
            Err(err) => {
                warn!(lead = %lead_id, provider = %provider_id, error = %err, "claim lookup failed");
                return Ok(self.reject(&lead, RejectReason::ClaimFailed, now));
            }
        }

        // Cheap pre-checks on the fetched snapshot. Only advisory: the
        // reservation below re-checks under the store's atomicity.
        if lead.is_full() {
            return Ok(self.reject(&lead, RejectReason::LeadFull, now));
        }
        if lead.is_closed() || lead.is_expired(now) {
            return Ok(self.reject(&lead, RejectReason::LeadExpired, now));
        }

        let reservation = match self.reserve_with_retry(lead_id, provider_id, now) {
            Ok(reservation) => reservation,
            Err(StoreError::NotFound) => {
                return Err(ClaimServiceError::LeadNotFound {
                    lead: lead_id.clone(),
                })
            }
            Err(err) => {
                warn!(lead = %lead_id, provider = %provider_id, error = %err, "slot reservation failed");
                return Ok(self.reject(&lead, RejectReason::ClaimFailed, now));
            }
        };

        let reserved = match reservation {
            SlotReservation::Reserved { lead } => lead,
            SlotReservation::Refused { refusal, lead } => {
                let reason = match refusal {
                    SlotRefusal::Full => RejectReason::LeadFull,
                    SlotRefusal::Closed | SlotRefusal::Expired => RejectReason::LeadExpired,
                    SlotRefusal::AlreadyClaimed => {
                        // Either the claim committed (replay it) or another
                        // thread is mid-flight with this provider's claim.
                        return match self.claims.find_for(lead_id, provider_id) {
                            Ok(Some(existing)) => Ok(ClaimDecision::Admitted {
                                claim: existing,
                                remaining_slots: lead.remaining_slots(),
                            }),
                            _ => Ok(self.reject(&lead, RejectReason::DuplicateClaim, now)),
                        };
                    }
                };
                return Ok(self.reject(&lead, reason, now));
            }
        };

        // Slot is held from here on: every failure path below must release
        // it before reporting the rejection.
        let claim_id = next_claim_id();
        let price = reserved.credit_cost;
        if let Err(err) = self.ledger.debit(provider_id, price, &claim_id) {
            let reason = match err {
                LedgerError::InsufficientFunds { balance, required } => {
                    info!(
                        lead = %lead_id,
                        provider = %provider_id,
                        balance = %balance,
                        required = %required,
                        "claim rejected, balance does not cover the price"
                    );
                    RejectReason::InsufficientCredits
                }
                LedgerError::WalletNotFound { .. } => {
                    info!(lead = %lead_id, provider = %provider_id, "claim rejected, provider has no wallet");
                    RejectReason::InsufficientCredits
                }
                other => {
                    warn!(lead = %lead_id, provider = %provider_id, error = %other, "wallet debit failed");
                    RejectReason::ClaimFailed
                }
            };
            let lead = self.release_reserved_slot(lead_id, provider_id, &reserved);
            return Ok(self.reject(&lead, reason, now));
        }

        let claim = Claim {
            id: claim_id.clone(),
            lead_id: lead_id.clone(),
            provider_id: provider_id.clone(),
            price_paid: price,
            claimed_at: now,
            payment_method: PaymentMethod::Credits,
        };
        match self.claims.insert(claim) {
            Ok(claim) => {
                info!(
                    lead = %lead_id,
                    provider = %provider_id,
                    claim = %claim.id,
                    price = %price,
                    remaining = reserved.remaining_slots(),
                    "claim admitted"
                );
                self.broadcaster.claim_state_changed(&reserved, now);
                Ok(ClaimDecision::Admitted {
                    claim,
                    remaining_slots: reserved.remaining_slots(),
                })
            }
            Err(err) => {
                warn!(
                    lead = %lead_id,
                    provider = %provider_id,
                    claim = %claim_id,
                    error = %err,
                    "claim persistence failed, reversing debit and releasing slot"
                );
                if let Err(reverse_err) = self.ledger.reverse_debit(provider_id, price, &claim_id)
                {
                    error!(
                        provider = %provider_id,
                        claim = %claim_id,
                        error = %reverse_err,
                        "debit reversal failed, wallet needs reconciliation"
                    );
                }
                let lead = self.release_reserved_slot(lead_id, provider_id, &reserved);
                Ok(self.reject(&lead, RejectReason::ClaimFailed, now))
            }
        }
    }

    /// Administrative refund of an admitted claim, at most once per claim.
    /// The claim record itself stays: the provider keeps the contact, only
    /// the money comes back.
    pub fn refund_claim(&self, claim_id: &ClaimId) -> Result<WalletTransaction, RefundError> {
        let claim = self
            .claims
            .fetch(claim_id)?
            .ok_or_else(|| RefundError::ClaimNotFound {
                claim: claim_id.clone(),
            })?;
        let entry = self.ledger.refund(&claim)?;
        Ok(entry)
    }

    /// The claim a provider holds on a lead, if any.
    pub fn claim_for(
        &self,
        lead_id: &LeadId,
        provider_id: &ProviderId,
    ) -> Result<Option<Claim>, StoreError> {
        self.claims.find_for(lead_id, provider_id)
    }

    fn fetch_lead(&self, lead_id: &LeadId) -> Result<Option<Lead>, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.leads.fetch(lead_id) {
                Ok(lead) => return Ok(lead),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    std::thread::yield_now();
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn reserve_with_retry(
        &self,
        lead_id: &LeadId,
        provider_id: &ProviderId,
        now: DateTime<Utc>,
    ) -> Result<SlotReservation, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.leads.reserve_slot(lead_id, provider_id, now) {
                Ok(reservation) => return Ok(reservation),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    debug!(lead = %lead_id, attempt, error = %err, "reservation contested, retrying");
                    std::thread::yield_now();
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Undo a reservation after a later step failed. Falls back to the
    /// pre-release snapshot for reporting when the release itself fails,
    /// which leaks a slot but never double-admits.
    fn release_reserved_slot(
        &self,
        lead_id: &LeadId,
        provider_id: &ProviderId,
        reserved: &Lead,
    ) -> Lead {
        match self.leads.release_slot(lead_id, provider_id) {
            Ok(lead) => lead,
            Err(err) => {
                error!(
                    lead = %lead_id,
                    provider = %provider_id,
                    error = %err,
                    "failed to release reserved slot"
                );
                reserved.clone()
            }
        }
    }

    /// Build a rejection and let subscribers see the resulting state.
    fn reject(&self, lead: &Lead, reason: RejectReason, now: DateTime<Utc>) -> ClaimDecision {
        debug!(lead = %lead.id, reason = reason.label(), "claim rejected");
        self.broadcaster.claim_state_changed(lead, now);
        ClaimDecision::Rejected {
            reason,
            remaining_slots: lead.remaining_slots(),
        }
    }
}
