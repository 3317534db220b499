use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::domain::{Lead, LeadId, ProviderId};
use crate::marketplace::store::StoreError;

/// Why a slot reservation was refused inside the atomic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRefusal {
    /// Every slot is taken.
    Full,
    /// The lead was withdrawn.
    Closed,
    /// The lead lapsed before selling out.
    Expired,
    /// This provider already holds a slot on the lead.
    AlreadyClaimed,
}

/// Outcome of an atomic slot reservation.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotReservation {
    /// A slot was taken; `lead` is the post-increment snapshot.
    Reserved { lead: Lead },
    /// Nothing changed; `lead` is the current snapshot, kept for event
    /// payloads and `remaining_slots` reporting.
    Refused { refusal: SlotRefusal, lead: Lead },
}

/// Storage seam for leads.
///
/// `reserve_slot` and `release_slot` are the only paths that move claim
/// counters. Implementations must make the eligibility checks and the
/// increment one atomic step against concurrent reservations; that
/// atomicity, not any check the arbiter does beforehand, is what holds
/// the `max_claims` cap.
pub trait LeadRepository: Send + Sync {
    /// Register a new lead. Fails with `Conflict` when the id is taken.
    fn insert(&self, lead: Lead) -> Result<Lead, StoreError>;

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, StoreError>;

    /// Atomically take one claim slot for `provider`, provided the lead is
    /// still open at `now` and the provider holds no slot on it yet.
    /// Landing on the final slot stamps `claimed_at`.
    fn reserve_slot(
        &self,
        id: &LeadId,
        provider: &ProviderId,
        now: DateTime<Utc>,
    ) -> Result<SlotReservation, StoreError>;

    /// Roll back a reservation previously taken by `provider`. Fails with
    /// `NotFound` when the provider holds no slot, which signals a bug in
    /// the caller's pairing of reserve and release.
    fn release_slot(&self, id: &LeadId, provider: &ProviderId) -> Result<Lead, StoreError>;

    /// Mark the lead withdrawn as of `now`. Idempotent: an already closed
    /// lead keeps its original `closed_at`.
    fn close(&self, id: &LeadId, now: DateTime<Utc>) -> Result<Lead, StoreError>;

    /// Delete the lead outright. Refuses with `Conflict` while any claim
    /// slot is held; such leads are closed instead.
    fn remove(&self, id: &LeadId) -> Result<(), StoreError>;

    /// Leads still claimable at `now`, newest first.
    fn available(&self, now: DateTime<Utc>) -> Result<Vec<Lead>, StoreError>;
}

#[derive(Debug)]
struct LeadRecord {
    lead: Lead,
    claimants: BTreeSet<ProviderId>,
}

/// In-memory lead store for single-process deployments and tests. One
/// mutex over the whole map makes every reservation serialized, which is
/// exactly the atomicity the trait demands.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeadStore {
    records: Arc<Mutex<HashMap<LeadId, LeadRecord>>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lead store lock poisoned".to_string())
    }
}

impl LeadRepository for InMemoryLeadStore {
    fn insert(&self, lead: Lead) -> Result<Lead, StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        if records.contains_key(&lead.id) {
            return Err(StoreError::Conflict);
        }
        records.insert(
            lead.id.clone(),
            LeadRecord {
                lead: lead.clone(),
                claimants: BTreeSet::new(),
            },
        );
        Ok(lead)
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, StoreError> {
        let records = self.records.lock().map_err(|_| Self::poisoned())?;
        Ok(records.get(id).map(|record| record.lead.clone()))
    }

    fn reserve_slot(
        &self,
        id: &LeadId,
        provider: &ProviderId,
        now: DateTime<Utc>,
    ) -> Result<SlotReservation, StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        let record = records.get_mut(id).ok_or(StoreError::NotFound)?;

        let refusal = if record.claimants.contains(provider) {
            Some(SlotRefusal::AlreadyClaimed)
        } else if record.lead.is_full() {
            Some(SlotRefusal::Full)
        } else if record.lead.is_closed() {
            Some(SlotRefusal::Closed)
        } else if record.lead.is_expired(now) {
            Some(SlotRefusal::Expired)
        } else {
            None
        };
        if let Some(refusal) = refusal {
            return Ok(SlotReservation::Refused {
                refusal,
                lead: record.lead.clone(),
            });
        }

        record.lead.current_claims += 1;
        if record.lead.is_full() {
            record.lead.claimed_at = Some(now);
        }
        record.claimants.insert(provider.clone());
        Ok(SlotReservation::Reserved {
            lead: record.lead.clone(),
        })
    }

    fn release_slot(&self, id: &LeadId, provider: &ProviderId) -> Result<Lead, StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        let record = records.get_mut(id).ok_or(StoreError::NotFound)?;
        if !record.claimants.remove(provider) {
            return Err(StoreError::NotFound);
        }
        record.lead.current_claims = record.lead.current_claims.saturating_sub(1);
        if !record.lead.is_full() {
            record.lead.claimed_at = None;
        }
        Ok(record.lead.clone())
    }

    fn close(&self, id: &LeadId, now: DateTime<Utc>) -> Result<Lead, StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        let record = records.get_mut(id).ok_or(StoreError::NotFound)?;
        if record.lead.closed_at.is_none() {
            record.lead.closed_at = Some(now);
        }
        Ok(record.lead.clone())
    }

    fn remove(&self, id: &LeadId) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        let record = records.get(id).ok_or(StoreError::NotFound)?;
        if record.lead.current_claims > 0 {
            return Err(StoreError::Conflict);
        }
        records.remove(id);
        Ok(())
    }

    fn available(&self, now: DateTime<Utc>) -> Result<Vec<Lead>, StoreError> {
        let records = self.records.lock().map_err(|_| Self::poisoned())?;
        let mut leads: Vec<Lead> = records
            .values()
            .filter(|record| record.lead.is_available(now))
            .map(|record| record.lead.clone())
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }
}
