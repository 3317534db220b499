use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use super::domain::{Wallet, WalletTransaction};
use crate::marketplace::leads::ProviderId;
use crate::marketplace::store::StoreError;

/// Storage seam for wallets and their ledgers.
///
/// `apply` is the only write path for balances. Implementations must make
/// the version check, the ledger append, and the balance refresh one
/// atomic step; callers loop on `VersionConflict`.
pub trait WalletRepository: Send + Sync {
    /// Register a new wallet. Fails with `Conflict` when the provider
    /// already has one.
    fn create(&self, wallet: Wallet) -> Result<Wallet, StoreError>;

    fn fetch(&self, provider: &ProviderId) -> Result<Option<Wallet>, StoreError>;

    /// Atomically append `entry` and fold its amount into the balance,
    /// provided the stored version still equals `expected_version`.
    /// Returns the refreshed wallet.
    fn apply(
        &self,
        provider: &ProviderId,
        expected_version: u64,
        entry: WalletTransaction,
    ) -> Result<Wallet, StoreError>;

    /// Full ledger for a provider, oldest first.
    fn transactions(&self, provider: &ProviderId) -> Result<Vec<WalletTransaction>, StoreError>;
}

#[derive(Debug)]
struct WalletAccount {
    wallet: Wallet,
    ledger: Vec<WalletTransaction>,
}

/// In-memory wallet store for single-process deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWalletStore {
    accounts: Arc<Mutex<HashMap<ProviderId, WalletAccount>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletRepository for InMemoryWalletStore {
    fn create(&self, wallet: Wallet) -> Result<Wallet, StoreError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("wallet store lock poisoned".to_string()))?;
        if accounts.contains_key(&wallet.provider_id) {
            return Err(StoreError::Conflict);
        }
        accounts.insert(
            wallet.provider_id.clone(),
            WalletAccount {
                wallet: wallet.clone(),
                ledger: Vec::new(),
            },
        );
        Ok(wallet)
    }

    fn fetch(&self, provider: &ProviderId) -> Result<Option<Wallet>, StoreError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("wallet store lock poisoned".to_string()))?;
        Ok(accounts.get(provider).map(|account| account.wallet.clone()))
    }

    fn apply(
        &self,
        provider: &ProviderId,
        expected_version: u64,
        entry: WalletTransaction,
    ) -> Result<Wallet, StoreError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("wallet store lock poisoned".to_string()))?;
        let account = accounts.get_mut(provider).ok_or(StoreError::NotFound)?;
        if account.wallet.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: account.wallet.version,
            });
        }
        account.wallet.balance += entry.amount;
        account.wallet.version += 1;
        account.wallet.updated_at = entry.created_at;
        account.ledger.push(entry);
        // The ledger service refuses overdrafts before applying; a negative
        // balance here means a caller skipped the funds check.
        debug_assert!(account.wallet.balance >= Decimal::ZERO);
        Ok(account.wallet.clone())
    }

    fn transactions(&self, provider: &ProviderId) -> Result<Vec<WalletTransaction>, StoreError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("wallet store lock poisoned".to_string()))?;
        let account = accounts.get(provider).ok_or(StoreError::NotFound)?;
        Ok(account.ledger.clone())
    }
}
