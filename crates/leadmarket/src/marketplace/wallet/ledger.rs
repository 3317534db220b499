use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use super::domain::{TransactionId, TransactionReason, Wallet, WalletTransaction};
use super::repository::WalletRepository;
use crate::marketplace::claims::{Claim, ClaimId};
use crate::marketplace::leads::ProviderId;
use crate::marketplace::store::StoreError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

static TRANSACTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_transaction_id() -> TransactionId {
    let id = TRANSACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TransactionId(format!("txn-{id:08}"))
}

/// Errors surfaced by wallet ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no wallet found for provider {provider}")]
    WalletNotFound { provider: ProviderId },
    #[error("provider {provider} already has a wallet")]
    WalletExists { provider: ProviderId },
    #[error("insufficient credits: balance {balance}, required {required}")]
    InsufficientFunds {
        balance: Decimal,
        required: Decimal,
    },
    #[error("amount {amount} is not a positive credit amount")]
    InvalidAmount { amount: Decimal },
    #[error("claim {claim} has already been refunded")]
    AlreadyRefunded { claim: ClaimId },
    #[error("wallet update still contested after {attempts} attempts")]
    Contention { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Append-only wallet ledger.
///
/// Every operation reads the wallet, builds one transaction entry, and
/// applies it under the store's version check, retrying a bounded number
/// of times when another writer got there first. Debits refuse to take a
/// balance below zero.
pub struct WalletLedger<W> {
    wallets: Arc<W>,
    max_attempts: u32,
}

impl<W> Clone for WalletLedger<W> {
    fn clone(&self) -> Self {
        Self {
            wallets: Arc::clone(&self.wallets),
            max_attempts: self.max_attempts,
        }
    }
}

impl<W: WalletRepository> WalletLedger<W> {
    pub fn new(wallets: Arc<W>) -> Self {
        Self {
            wallets,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the retry budget for contested wallet writes.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Register a wallet for a provider, optionally seeded with credits.
    /// The seed lands as an ordinary top-up entry so the ledger stays the
    /// complete record of every balance change.
    pub fn open_wallet(
        &self,
        provider: &ProviderId,
        opening_balance: Decimal,
    ) -> Result<Wallet, LedgerError> {
        if opening_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount {
                amount: opening_balance,
            });
        }
        let wallet = Wallet::opened(provider.clone(), Utc::now());
        let wallet = match self.wallets.create(wallet) {
            Ok(wallet) => wallet,
            Err(StoreError::Conflict) => {
                return Err(LedgerError::WalletExists {
                    provider: provider.clone(),
                })
            }
            Err(other) => return Err(other.into()),
        };
        info!(provider = %provider, "wallet opened");
        if opening_balance > Decimal::ZERO {
            self.top_up(provider, opening_balance)?;
            return self.wallet(provider);
        }
        Ok(wallet)
    }

    pub fn wallet(&self, provider: &ProviderId) -> Result<Wallet, LedgerError> {
        self.wallets
            .fetch(provider)?
            .ok_or_else(|| LedgerError::WalletNotFound {
                provider: provider.clone(),
            })
    }

    /// Full ledger for a provider, oldest first.
    pub fn history(&self, provider: &ProviderId) -> Result<Vec<WalletTransaction>, LedgerError> {
        match self.wallets.transactions(provider) {
            Ok(entries) => Ok(entries),
            Err(StoreError::NotFound) => Err(LedgerError::WalletNotFound {
                provider: provider.clone(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    pub fn top_up(
        &self,
        provider: &ProviderId,
        amount: Decimal,
    ) -> Result<WalletTransaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let entry = self.apply_with_retry(provider, |_| {
            Ok(WalletTransaction {
                id: next_transaction_id(),
                provider_id: provider.clone(),
                amount,
                reason: TransactionReason::TopUp,
                claim_ref: None,
                created_at: Utc::now(),
            })
        })?;
        info!(provider = %provider, amount = %amount, "wallet topped up");
        Ok(entry)
    }

    /// Charge `amount` for `claim`. Refuses rather than overdraw: the
    /// funds check and the version the entry applies under come from the
    /// same wallet read, so a racing debit forces a retry instead of a
    /// double spend.
    pub fn debit(
        &self,
        provider: &ProviderId,
        amount: Decimal,
        claim: &ClaimId,
    ) -> Result<WalletTransaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let entry = self.apply_with_retry(provider, |wallet| {
            if !wallet.covers(amount) {
                return Err(LedgerError::InsufficientFunds {
                    balance: wallet.balance,
                    required: amount,
                });
            }
            Ok(WalletTransaction {
                id: next_transaction_id(),
                provider_id: provider.clone(),
                amount: -amount,
                reason: TransactionReason::ClaimDebit,
                claim_ref: Some(claim.clone()),
                created_at: Utc::now(),
            })
        })?;
        info!(provider = %provider, claim = %claim, amount = %amount, "wallet debited for claim");
        Ok(entry)
    }

    /// Return the debit taken for a claim that failed before it was fully
    /// recorded. Compensating entry, not an edit: the ledger keeps both
    /// sides of the aborted attempt.
    pub fn reverse_debit(
        &self,
        provider: &ProviderId,
        amount: Decimal,
        claim: &ClaimId,
    ) -> Result<WalletTransaction, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let entry = self.apply_with_retry(provider, |_| {
            Ok(WalletTransaction {
                id: next_transaction_id(),
                provider_id: provider.clone(),
                amount,
                reason: TransactionReason::Refund,
                claim_ref: Some(claim.clone()),
                created_at: Utc::now(),
            })
        })?;
        info!(provider = %provider, claim = %claim, amount = %amount, "claim debit reversed");
        Ok(entry)
    }

    /// Administrative refund of an admitted claim, at most once per claim.
    pub fn refund(&self, claim: &Claim) -> Result<WalletTransaction, LedgerError> {
        let provider = &claim.provider_id;
        let mut attempt = 0;
        loop {
            attempt += 1;
            // Read the wallet version before scanning the ledger. A racing
            // refund bumps the version and fails this attempt's apply, so
            // the rescan on retry sees its entry and refuses the double.
            let wallet = self.wallet(provider)?;
            let already_refunded = self
                .wallets
                .transactions(provider)?
                .iter()
                .any(|txn| {
                    txn.reason == TransactionReason::Refund
                        && txn.claim_ref.as_ref() == Some(&claim.id)
                });
            if already_refunded {
                return Err(LedgerError::AlreadyRefunded {
                    claim: claim.id.clone(),
                });
            }
            let entry = WalletTransaction {
                id: next_transaction_id(),
                provider_id: provider.clone(),
                amount: claim.price_paid,
                reason: TransactionReason::Refund,
                claim_ref: Some(claim.id.clone()),
                created_at: Utc::now(),
            };
            match self.wallets.apply(provider, wallet.version, entry.clone()) {
                Ok(updated) => {
                    info!(
                        provider = %provider,
                        claim = %claim.id,
                        amount = %claim.price_paid,
                        balance = %updated.balance,
                        "claim refunded"
                    );
                    return Ok(entry);
                }
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_attempts => {
                    debug!(provider = %provider, attempt, "wallet contested during refund, retrying");
                    std::thread::yield_now();
                }
                Err(StoreError::VersionConflict { .. }) => {
                    return Err(LedgerError::Contention { attempts: attempt })
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn apply_with_retry<F>(
        &self,
        provider: &ProviderId,
        build: F,
    ) -> Result<WalletTransaction, LedgerError>
    where
        F: Fn(&Wallet) -> Result<WalletTransaction, LedgerError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let wallet = self.wallet(provider)?;
            let entry = build(&wallet)?;
            match self.wallets.apply(provider, wallet.version, entry.clone()) {
                Ok(_) => return Ok(entry),
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_attempts => {
                    debug!(provider = %provider, attempt, "wallet contested, retrying");
                    std::thread::yield_now();
                }
                Err(StoreError::VersionConflict { .. }) => {
                    return Err(LedgerError::Contention { attempts: attempt })
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}
