use leadmarket::config::{AppConfig, AppEnvironment};
use leadmarket::marketplace::claims::{ClaimArbiter, ClaimPolicy, InMemoryClaimStore};
use leadmarket::marketplace::feed::{AccountId, FeedHub, LeadBroadcaster, TokenDirectory};
use leadmarket::marketplace::leads::{InMemoryLeadStore, LeadIntake, UrgencyTier};
use leadmarket::marketplace::pricing::{InMemoryFactorTable, PriceCalculator, PricingConfig};
use leadmarket::marketplace::wallet::{InMemoryWalletStore, WalletLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Intake = LeadIntake<InMemoryLeadStore, InMemoryFactorTable, FeedHub>;
pub(crate) type Arbiter =
    ClaimArbiter<InMemoryLeadStore, InMemoryClaimStore, InMemoryWalletStore, FeedHub>;

pub(crate) struct Runtime {
    pub(crate) intake: Arc<Intake>,
    pub(crate) arbiter: Arc<Arbiter>,
    pub(crate) ledger: Arc<WalletLedger<InMemoryWalletStore>>,
    pub(crate) hub: Arc<FeedHub>,
    pub(crate) tokens: Arc<InMemoryTokenDirectory>,
}

impl Runtime {
    pub(crate) fn bootstrap(config: &AppConfig) -> Self {
        let leads = Arc::new(InMemoryLeadStore::new());
        let claims = Arc::new(InMemoryClaimStore::new());
        let factors = Arc::new(InMemoryFactorTable::new());
        let hub = Arc::new(FeedHub::new(config.feed.buffer));
        let ledger = WalletLedger::new(Arc::new(InMemoryWalletStore::new()))
            .with_max_attempts(config.claims.retry_attempts);

        let intake = Arc::new(LeadIntake::new(
            Arc::clone(&leads),
            PriceCalculator::new(Arc::clone(&factors), PricingConfig::default()),
            LeadBroadcaster::new(Arc::clone(&hub)),
        ));
        let arbiter = Arc::new(ClaimArbiter::new(
            leads,
            claims,
            ledger.clone(),
            LeadBroadcaster::new(Arc::clone(&hub)),
            ClaimPolicy {
                max_attempts: config.claims.retry_attempts,
            },
        ));

        let tokens = Arc::new(InMemoryTokenDirectory::default());
        if config.environment == AppEnvironment::Development {
            tokens.register("dev-feed-token", AccountId("acct-dev".to_string()));
            info!("registered the development feed token");
        }

        Runtime {
            intake,
            arbiter,
            ledger: Arc::new(ledger),
            hub,
            tokens,
        }
    }
}

/// Token lookup backed by a map, standing in for the account system's
/// token issuance.
#[derive(Default)]
pub(crate) struct InMemoryTokenDirectory {
    tokens: Mutex<HashMap<String, AccountId>>,
}

impl InMemoryTokenDirectory {
    pub(crate) fn register(&self, token: &str, account: AccountId) {
        let mut guard = self.tokens.lock().expect("token directory mutex poisoned");
        guard.insert(token.to_string(), account);
    }
}

impl TokenDirectory for InMemoryTokenDirectory {
    fn resolve(&self, token: &str) -> Option<AccountId> {
        let guard = self.tokens.lock().expect("token directory mutex poisoned");
        guard.get(token).cloned()
    }
}

pub(crate) fn parse_urgency(raw: &str) -> Result<UrgencyTier, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "flexible" => Ok(UrgencyTier::Flexible),
        "standard" => Ok(UrgencyTier::Standard),
        "urgent" => Ok(UrgencyTier::Urgent),
        "emergency" => Ok(UrgencyTier::Emergency),
        other => Err(format!(
            "unknown urgency '{other}', expected flexible|standard|urgent|emergency"
        )),
    }
}

pub(crate) fn parse_multiplier(raw: &str) -> Result<Decimal, String> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|err| format!("failed to parse '{raw}' as a decimal multiplier ({err})"))
}
