use chrono::{Datelike, Duration, Utc};
use clap::Args;
use leadmarket::error::AppError;
use leadmarket::marketplace::claims::{
    Claim, ClaimArbiter, ClaimDecision, ClaimPolicy, InMemoryClaimStore,
};
use leadmarket::marketplace::feed::{
    FeedHub, LeadBroadcaster, LeadEvent, GLOBAL_FEED_TOPIC,
};
use leadmarket::marketplace::leads::{
    Category, InMemoryLeadStore, LeadIntake, LeadSubmission, Location, ProviderId, UrgencyTier,
};
use leadmarket::marketplace::pricing::{
    FactorKey, InMemoryFactorTable, PriceCalculator, PricingConfig, PricingFactor, TimeOfDay,
};
use leadmarket::marketplace::wallet::{InMemoryWalletStore, WalletLedger};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Lead category to price and sell (defaults to plumbing).
    #[arg(long)]
    pub(crate) category: Option<String>,
    /// Postcode district the job sits in (defaults to SE15).
    #[arg(long)]
    pub(crate) location: Option<String>,
    /// Urgency tier: flexible, standard, urgent, or emergency.
    #[arg(long, value_parser = crate::infra::parse_urgency)]
    pub(crate) urgency: Option<UrgencyTier>,
    /// Claim cap for the demo lead.
    #[arg(long)]
    pub(crate) max_claims: Option<u32>,
    /// Install a demand multiplier snapshot before pricing the lead.
    #[arg(long, value_parser = crate::infra::parse_multiplier)]
    pub(crate) multiplier: Option<Decimal>,
    /// Skip the refund portion of the demo.
    #[arg(long)]
    pub(crate) skip_settlement: bool,
}

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Lead category to quote
    #[arg(long)]
    pub(crate) category: String,
    /// Postcode district for the exact-match lookup
    #[arg(long, default_value = "central")]
    pub(crate) location: String,
    /// Urgency tier: flexible, standard, urgent, or emergency
    #[arg(long, value_parser = crate::infra::parse_urgency, default_value = "standard")]
    pub(crate) urgency: UrgencyTier,
    /// Quote with a multiplier row at this value installed first
    #[arg(long, value_parser = crate::infra::parse_multiplier)]
    pub(crate) multiplier: Option<Decimal>,
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        category,
        location,
        urgency,
        multiplier,
    } = args;

    let category = Category(category);
    let location = Location(location);
    let now = Utc::now();

    let config = PricingConfig::default();
    let factors = Arc::new(InMemoryFactorTable::new());
    if let Some(multiplier) = multiplier {
        install_demo_snapshot(&factors, &category, &location, urgency, multiplier);
    }

    let calculator = PriceCalculator::new(Arc::clone(&factors), config.clone());
    let quote = calculator.quote(&category, &location, urgency, now);

    println!("Lead price quote");
    println!("- {} in {} | urgency {}", category, location, urgency.label());
    println!("- base price: {} credits", config.base_price(&category));
    println!(
        "- multiplier: {} (source: {})",
        quote.multiplier,
        quote.source.label()
    );
    println!("- listed credit cost: {} credits", quote.credit_cost);

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        category,
        location,
        urgency,
        max_claims,
        multiplier,
        skip_settlement,
    } = args;

    let category = Category(category.unwrap_or_else(|| "plumbing".to_string()));
    let location = Location(location.unwrap_or_else(|| "SE15".to_string()));
    let urgency = urgency.unwrap_or(UrgencyTier::Urgent);
    let max_claims = max_claims.unwrap_or(2);

    println!("Lead marketplace demo");

    let leads = Arc::new(InMemoryLeadStore::new());
    let claims = Arc::new(InMemoryClaimStore::new());
    let factors = Arc::new(InMemoryFactorTable::new());
    let hub = Arc::new(FeedHub::default());
    let mut feed = hub.subscribe(GLOBAL_FEED_TOPIC);
    let ledger = WalletLedger::new(Arc::new(InMemoryWalletStore::new()));

    let intake = LeadIntake::new(
        Arc::clone(&leads),
        PriceCalculator::new(Arc::clone(&factors), PricingConfig::default()),
        LeadBroadcaster::new(Arc::clone(&hub)),
    );
    let arbiter = ClaimArbiter::new(
        leads,
        claims,
        ledger.clone(),
        LeadBroadcaster::new(Arc::clone(&hub)),
        ClaimPolicy::default(),
    );

    if let Some(multiplier) = multiplier {
        install_demo_snapshot(&factors, &category, &location, urgency, multiplier);
        println!(
            "- installed demand snapshot v{} with multiplier {}",
            factors.snapshot_version(),
            multiplier
        );
    }

    println!("\nProvider wallets");
    let alpha = ProviderId("prov-alpha".to_string());
    let beta = ProviderId("prov-beta".to_string());
    let gamma = ProviderId("prov-gamma".to_string());
    let delta = ProviderId("prov-delta".to_string());
    let funding = [
        (&alpha, credits(200)),
        (&beta, credits(120)),
        (&gamma, credits(15)),
        (&delta, credits(80)),
    ];
    for (provider, opening_balance) in funding {
        match ledger.open_wallet(provider, opening_balance) {
            Ok(wallet) => println!(
                "- {} opened with {} credits",
                wallet.provider_id, wallet.balance
            ),
            Err(err) => {
                println!("- wallet setup failed for {provider}: {err}");
                return Ok(());
            }
        }
    }

    println!("\nLead intake");
    let submission = LeadSubmission {
        id: None,
        category,
        location,
        urgency,
        expires_at: Utc::now() + Duration::hours(24),
        max_claims: Some(max_claims),
    };
    let lead = match intake.create(submission) {
        Ok(lead) => lead,
        Err(err) => {
            println!("- intake rejected the lead: {err}");
            return Ok(());
        }
    };
    println!(
        "- {} | {} in {} | {} | listed at {} credits | {} claim slots",
        lead.id,
        lead.category,
        lead.location,
        lead.urgency.label(),
        lead.credit_cost,
        lead.max_claims
    );

    println!("\nClaim attempts");
    let mut admitted: Vec<Claim> = Vec::new();
    for provider in [&alpha, &gamma, &alpha, &beta, &delta] {
        match arbiter.attempt_claim(&lead.id, provider) {
            Ok(decision) => {
                println!("- {provider}: {}", decision.summary());
                if let ClaimDecision::Admitted { claim, .. } = decision {
                    if !admitted.iter().any(|existing| existing.id == claim.id) {
                        admitted.push(claim);
                    }
                }
            }
            Err(err) => println!("- {provider}: attempt failed: {err}"),
        }
    }

    if !skip_settlement {
        println!("\nSettlement");
        if let Some(claim) = admitted.last() {
            match arbiter.refund_claim(&claim.id) {
                Ok(entry) => println!(
                    "- refunded claim {}: {} credits back to {}",
                    claim.id, entry.amount, entry.provider_id
                ),
                Err(err) => println!("- refund failed: {err}"),
            }
            match arbiter.refund_claim(&claim.id) {
                Ok(entry) => println!("- second refund unexpectedly applied: {}", entry.id),
                Err(err) => println!("- second refund refused: {err}"),
            }
        } else {
            println!("- nothing to refund, no claim was admitted");
        }
    }

    println!("\nWallet ledgers");
    for provider in [&alpha, &beta, &gamma, &delta] {
        let wallet = match ledger.wallet(provider) {
            Ok(wallet) => wallet,
            Err(err) => {
                println!("- {provider}: {err}");
                continue;
            }
        };
        println!(
            "- {} holds {} credits (version {})",
            wallet.provider_id, wallet.balance, wallet.version
        );
        match ledger.history(provider) {
            Ok(entries) => {
                for entry in entries {
                    let reference = entry
                        .claim_ref
                        .as_ref()
                        .map(|claim| format!(" for {claim}"))
                        .unwrap_or_default();
                    println!("    {} {}{}", entry.reason.label(), entry.amount, reference);
                }
            }
            Err(err) => println!("    ledger unavailable: {err}"),
        }
    }

    println!("\nFeed events on {GLOBAL_FEED_TOPIC}");
    while let Ok(frame) = feed.try_recv() {
        match serde_json::from_slice::<LeadEvent>(&frame.payload) {
            Ok(event) => println!("- {}", describe_event(&event)),
            Err(err) => println!("- undecodable frame: {err}"),
        }
    }

    Ok(())
}

fn credits(units: i64) -> Decimal {
    Decimal::new(units * 100, 2)
}

fn install_demo_snapshot(
    factors: &InMemoryFactorTable,
    category: &Category,
    location: &Location,
    urgency: UrgencyTier,
    multiplier: Decimal,
) {
    let now = Utc::now();
    factors.install_snapshot(
        1,
        vec![PricingFactor {
            key: FactorKey {
                category: category.clone(),
                location: location.clone(),
                urgency,
                time_of_day: TimeOfDay::of(now),
                day_of_week: now.weekday(),
            },
            multiplier,
            effective_at: now - Duration::minutes(1),
        }],
    );
}

fn describe_event(event: &LeadEvent) -> String {
    match event {
        LeadEvent::ClaimStateChanged {
            lead_id,
            current_claims,
            remaining_slots,
            status,
            ..
        } => format!(
            "claim_state_changed {lead_id}: {current_claims} claimed, {remaining_slots} slots left, status {}",
            status.label()
        ),
        LeadEvent::LeadCreated { lead } => format!(
            "lead_created {}: {} credits, {} slots",
            lead.id, lead.credit_cost, lead.remaining_slots
        ),
        LeadEvent::LeadUpdated { lead } => {
            format!("lead_updated {}: status {}", lead.id, lead.status.label())
        }
        LeadEvent::LeadDeleted { lead_id } => format!("lead_deleted {lead_id}"),
    }
}
