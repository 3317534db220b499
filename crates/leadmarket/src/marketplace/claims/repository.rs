use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{Claim, ClaimId};
use crate::marketplace::leads::{LeadId, ProviderId};
use crate::marketplace::store::StoreError;

/// Storage seam for admitted claims.
pub trait ClaimRepository: Send + Sync {
    /// Persist an admitted claim. Fails with `Conflict` when the id or
    /// the (lead, provider) pairing already exists; there is never more
    /// than one claim per provider per lead.
    fn insert(&self, claim: Claim) -> Result<Claim, StoreError>;

    fn fetch(&self, id: &ClaimId) -> Result<Option<Claim>, StoreError>;

    /// The claim `provider` holds on `lead`, if any.
    fn find_for(
        &self,
        lead: &LeadId,
        provider: &ProviderId,
    ) -> Result<Option<Claim>, StoreError>;

    /// Every claim sold on a lead, oldest first.
    fn for_lead(&self, lead: &LeadId) -> Result<Vec<Claim>, StoreError>;
}

/// In-memory claim store for single-process deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClaimStore {
    claims: Arc<Mutex<HashMap<ClaimId, Claim>>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("claim store lock poisoned".to_string())
    }
}

impl ClaimRepository for InMemoryClaimStore {
    fn insert(&self, claim: Claim) -> Result<Claim, StoreError> {
        let mut claims = self.claims.lock().map_err(|_| Self::poisoned())?;
        let duplicate = claims.contains_key(&claim.id)
            || claims
                .values()
                .any(|c| c.lead_id == claim.lead_id && c.provider_id == claim.provider_id);
        if duplicate {
            return Err(StoreError::Conflict);
        }
        claims.insert(claim.id.clone(), claim.clone());
        Ok(claim)
    }

    fn fetch(&self, id: &ClaimId) -> Result<Option<Claim>, StoreError> {
        let claims = self.claims.lock().map_err(|_| Self::poisoned())?;
        Ok(claims.get(id).cloned())
    }

    fn find_for(
        &self,
        lead: &LeadId,
        provider: &ProviderId,
    ) -> Result<Option<Claim>, StoreError> {
        let claims = self.claims.lock().map_err(|_| Self::poisoned())?;
        Ok(claims
            .values()
            .find(|c| c.lead_id == *lead && c.provider_id == *provider)
            .cloned())
    }

    fn for_lead(&self, lead: &LeadId) -> Result<Vec<Claim>, StoreError> {
        let claims = self.claims.lock().map_err(|_| Self::poisoned())?;
        let mut matching: Vec<Claim> = claims
            .values()
            .filter(|c| c.lead_id == *lead)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.claimed_at.cmp(&b.claimed_at));
        Ok(matching)
    }
}
