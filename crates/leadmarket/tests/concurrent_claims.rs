//! Concurrency tests for claim arbitration.
//!
//! These tests race real threads through the arbiter against shared
//! in-memory stores. The claim cap, the one-claim-per-provider rule, and
//! wallet balances have to hold under any interleaving, not just the
//! sequential happy path the workflow tests walk.

mod common {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use leadmarket::marketplace::claims::{ClaimArbiter, ClaimPolicy, InMemoryClaimStore};
    use leadmarket::marketplace::feed::{FeedHub, LeadBroadcaster};
    use leadmarket::marketplace::leads::{
        Category, InMemoryLeadStore, Lead, LeadId, LeadRepository, Location, ProviderId,
        UrgencyTier,
    };
    use leadmarket::marketplace::wallet::{InMemoryWalletStore, WalletLedger};

    pub(super) type Arbiter =
        ClaimArbiter<InMemoryLeadStore, InMemoryClaimStore, InMemoryWalletStore, FeedHub>;

    pub(super) struct Engine {
        pub leads: Arc<InMemoryLeadStore>,
        pub claims: Arc<InMemoryClaimStore>,
        pub ledger: WalletLedger<InMemoryWalletStore>,
        pub arbiter: Arc<Arbiter>,
    }

    pub(super) fn engine() -> Engine {
        let leads = Arc::new(InMemoryLeadStore::new());
        let claims = Arc::new(InMemoryClaimStore::new());
        let ledger = WalletLedger::new(Arc::new(InMemoryWalletStore::new()));
        let arbiter = Arc::new(ClaimArbiter::new(
            Arc::clone(&leads),
            Arc::clone(&claims),
            ledger.clone(),
            LeadBroadcaster::new(Arc::new(FeedHub::default())),
            ClaimPolicy::default(),
        ));
        Engine {
            leads,
            claims,
            ledger,
            arbiter,
        }
    }

    impl Engine {
        /// Seed a lead directly so the test controls price and capacity.
        pub(super) fn seed_lead(&self, id: &str, max_claims: u32, credit_cost: Decimal) -> Lead {
            let now = Utc::now();
            self.leads
                .insert(Lead {
                    id: LeadId(id.to_string()),
                    category: Category("electrical".to_string()),
                    location: Location("E8".to_string()),
                    urgency: UrgencyTier::Standard,
                    credit_cost,
                    max_claims,
                    current_claims: 0,
                    created_at: now,
                    expires_at: now + Duration::hours(4),
                    claimed_at: None,
                    closed_at: None,
                })
                .expect("lead seeds")
        }

        pub(super) fn fund(&self, provider: &str, balance: Decimal) -> ProviderId {
            let provider = ProviderId(provider.to_string());
            self.ledger
                .open_wallet(&provider, balance)
                .expect("wallet opens");
            provider
        }
    }

    pub(super) fn credits(units: i64) -> Decimal {
        Decimal::new(units * 100, 2)
    }
}

mod cap {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use leadmarket::marketplace::claims::{ClaimDecision, ClaimRepository, RejectReason};
    use leadmarket::marketplace::leads::LeadRepository;

    use super::common::*;

    #[test]
    fn a_herd_of_providers_cannot_oversell_the_cap() {
        let engine = engine();
        let lead = engine.seed_lead("lead-hot", 3, credits(30));
        let providers: Vec<_> = (0..8)
            .map(|n| engine.fund(&format!("prov-{n:03}"), credits(100)))
            .collect();

        let barrier = Arc::new(Barrier::new(providers.len()));
        let handles: Vec<_> = providers
            .iter()
            .map(|provider| {
                let arbiter = Arc::clone(&engine.arbiter);
                let barrier = Arc::clone(&barrier);
                let lead_id = lead.id.clone();
                let provider = provider.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let decision = arbiter
                        .attempt_claim(&lead_id, &provider)
                        .expect("lead exists");
                    (provider, decision)
                })
            })
            .collect();
        let decisions: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("claim thread"))
            .collect();

        let admitted = decisions
            .iter()
            .filter(|(_, decision)| decision.is_admitted())
            .count();
        assert_eq!(admitted, 3);

        let stored = engine
            .leads
            .fetch(&lead.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.current_claims, 3);
        assert!(stored.is_full());
        assert!(stored.claimed_at.is_some());

        // Winners paid exactly once; losers were never touched.
        for (provider, decision) in &decisions {
            let wallet = engine.ledger.wallet(provider).expect("wallet");
            let history = engine.ledger.history(provider).expect("history");
            match decision {
                ClaimDecision::Admitted { claim, .. } => {
                    assert_eq!(claim.price_paid, credits(30));
                    assert_eq!(wallet.balance, credits(70));
                    assert_eq!(history.len(), 2);
                }
                ClaimDecision::Rejected { reason, .. } => {
                    assert_eq!(*reason, RejectReason::LeadFull);
                    assert_eq!(wallet.balance, credits(100));
                    assert_eq!(history.len(), 1);
                }
            }
        }

        let claims = engine.claims.for_lead(&lead.id).expect("claims");
        assert_eq!(claims.len(), 3);
    }

    #[test]
    fn one_provider_firing_twice_is_charged_once() {
        let engine = engine();
        let lead = engine.seed_lead("lead-dup", 3, credits(30));
        let provider = engine.fund("prov-dup", credits(100));

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let arbiter = Arc::clone(&engine.arbiter);
                let barrier = Arc::clone(&barrier);
                let lead_id = lead.id.clone();
                let provider = provider.clone();
                thread::spawn(move || {
                    barrier.wait();
                    arbiter
                        .attempt_claim(&lead_id, &provider)
                        .expect("lead exists")
                })
            })
            .collect();
        let decisions: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("claim thread"))
            .collect();

        // Every admission replays the one committed claim; every
        // rejection names the duplicate, never a second charge.
        let mut admitted_ids: Vec<_> = decisions
            .iter()
            .filter_map(|decision| match decision {
                ClaimDecision::Admitted { claim, .. } => Some(claim.id.clone()),
                ClaimDecision::Rejected { reason, .. } => {
                    assert_eq!(*reason, RejectReason::DuplicateClaim);
                    None
                }
            })
            .collect();
        admitted_ids.sort();
        admitted_ids.dedup();
        assert_eq!(admitted_ids.len(), 1);

        let wallet = engine.ledger.wallet(&provider).expect("wallet");
        assert_eq!(wallet.balance, credits(70));
        assert_eq!(engine.ledger.history(&provider).expect("history").len(), 2);

        let stored = engine
            .leads
            .fetch(&lead.id)
            .expect("fetch")
            .expect("present");
        assert_eq!(stored.current_claims, 1);
        assert_eq!(stored.remaining_slots(), 2);
    }
}

mod wallets {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use rust_decimal::Decimal;

    use leadmarket::marketplace::claims::{ClaimDecision, RefundError, RejectReason};
    use leadmarket::marketplace::leads::LeadRepository;
    use leadmarket::marketplace::wallet::LedgerError;

    use super::common::*;

    #[test]
    fn racing_debits_never_overdraw_a_shared_wallet() {
        let engine = engine();
        let first = engine.seed_lead("lead-a", 3, credits(30));
        let second = engine.seed_lead("lead-b", 3, credits(30));
        let provider = engine.fund("prov-tight", credits(50));

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [first.id.clone(), second.id.clone()]
            .into_iter()
            .map(|lead_id| {
                let arbiter = Arc::clone(&engine.arbiter);
                let barrier = Arc::clone(&barrier);
                let provider = provider.clone();
                thread::spawn(move || {
                    barrier.wait();
                    arbiter
                        .attempt_claim(&lead_id, &provider)
                        .expect("lead exists")
                })
            })
            .collect();
        let decisions: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("claim thread"))
            .collect();

        // 50 credits buy one 30-credit lead, never two.
        let admitted = decisions
            .iter()
            .filter(|decision| decision.is_admitted())
            .count();
        assert_eq!(admitted, 1);
        for decision in &decisions {
            if let ClaimDecision::Rejected { reason, .. } = decision {
                assert_eq!(*reason, RejectReason::InsufficientCredits);
            }
        }

        let wallet = engine.ledger.wallet(&provider).expect("wallet");
        assert_eq!(wallet.balance, credits(20));
        let sum: Decimal = engine
            .ledger
            .history(&provider)
            .expect("history")
            .iter()
            .map(|txn| txn.amount)
            .sum();
        assert_eq!(sum, wallet.balance);

        // The rejected attempt released its slot.
        let held: u32 = [&first.id, &second.id]
            .into_iter()
            .map(|id| {
                engine
                    .leads
                    .fetch(id)
                    .expect("fetch")
                    .expect("present")
                    .current_claims
            })
            .sum();
        assert_eq!(held, 1);
    }

    #[test]
    fn racing_refunds_pay_out_once() {
        let engine = engine();
        let lead = engine.seed_lead("lead-refund", 1, credits(40));
        let provider = engine.fund("prov-refund", credits(100));
        let claim = match engine
            .arbiter
            .attempt_claim(&lead.id, &provider)
            .expect("lead exists")
        {
            ClaimDecision::Admitted { claim, .. } => claim,
            other => panic!("expected admission, got {other:?}"),
        };

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let arbiter = Arc::clone(&engine.arbiter);
                let barrier = Arc::clone(&barrier);
                let claim_id = claim.id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    arbiter.refund_claim(&claim_id)
                })
            })
            .collect();
        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("refund thread"))
            .collect();

        let paid = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(paid, 1);
        for outcome in outcomes {
            if let Err(err) = outcome {
                assert!(matches!(
                    err,
                    RefundError::Ledger(LedgerError::AlreadyRefunded { .. })
                ));
            }
        }
        assert_eq!(
            engine.ledger.wallet(&provider).expect("wallet").balance,
            credits(100)
        );
    }
}
