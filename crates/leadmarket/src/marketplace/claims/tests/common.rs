use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::marketplace::claims::arbiter::{ClaimArbiter, ClaimPolicy};
use crate::marketplace::claims::repository::InMemoryClaimStore;
use crate::marketplace::feed::{FeedPublisher, LeadBroadcaster, LeadEvent, PublishError};
use crate::marketplace::leads::{
    Category, InMemoryLeadStore, Lead, LeadId, LeadRepository, Location, ProviderId, UrgencyTier,
};
use crate::marketplace::wallet::{InMemoryWalletStore, WalletLedger};

/// Feed double that keeps every published frame for inspection.
#[derive(Default)]
pub struct RecordingFeed {
    frames: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingFeed {
    pub fn events(&self) -> Vec<(String, LeadEvent)> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, payload)| {
                let event: LeadEvent = serde_json::from_slice(payload).unwrap();
                (topic.clone(), event)
            })
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl FeedPublisher for RecordingFeed {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.frames
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

pub type TestArbiter =
    ClaimArbiter<InMemoryLeadStore, InMemoryClaimStore, InMemoryWalletStore, RecordingFeed>;

pub struct Fixture {
    pub leads: Arc<InMemoryLeadStore>,
    pub claims: Arc<InMemoryClaimStore>,
    pub feed: Arc<RecordingFeed>,
    pub ledger: WalletLedger<InMemoryWalletStore>,
    pub arbiter: Arc<TestArbiter>,
}

pub fn fixture() -> Fixture {
    let leads = Arc::new(InMemoryLeadStore::new());
    let claims = Arc::new(InMemoryClaimStore::new());
    let wallets = Arc::new(InMemoryWalletStore::new());
    let feed = Arc::new(RecordingFeed::default());
    let ledger = WalletLedger::new(Arc::clone(&wallets));
    let arbiter = Arc::new(ClaimArbiter::new(
        Arc::clone(&leads),
        Arc::clone(&claims),
        ledger.clone(),
        LeadBroadcaster::new(Arc::clone(&feed)),
        ClaimPolicy::default(),
    ));
    Fixture {
        leads,
        claims,
        feed,
        ledger,
        arbiter,
    }
}

impl Fixture {
    /// Insert a lead directly, sidestepping intake, so tests control the
    /// price and expiry exactly.
    pub fn seed_lead(&self, id: &str, max_claims: u32, credit_cost: Decimal) -> Lead {
        let now = Utc::now();
        let lead = Lead {
            id: LeadId(id.to_string()),
            category: Category("plumbing".to_string()),
            location: Location("SE15".to_string()),
            urgency: UrgencyTier::Urgent,
            credit_cost,
            max_claims,
            current_claims: 0,
            created_at: now,
            expires_at: now + Duration::hours(2),
            claimed_at: None,
            closed_at: None,
        };
        self.leads.insert(lead).unwrap()
    }

    pub fn seed_expired_lead(&self, id: &str, credit_cost: Decimal) -> Lead {
        let now = Utc::now();
        let lead = Lead {
            id: LeadId(id.to_string()),
            category: Category("plumbing".to_string()),
            location: Location("SE15".to_string()),
            urgency: UrgencyTier::Standard,
            credit_cost,
            max_claims: 3,
            current_claims: 0,
            created_at: now - Duration::hours(3),
            expires_at: now - Duration::minutes(1),
            claimed_at: None,
            closed_at: None,
        };
        self.leads.insert(lead).unwrap()
    }

    /// Open a wallet holding `balance` credits.
    pub fn fund(&self, provider: &str, balance: Decimal) -> ProviderId {
        let provider = ProviderId(provider.to_string());
        self.ledger.open_wallet(&provider, balance).unwrap();
        provider
    }
}
