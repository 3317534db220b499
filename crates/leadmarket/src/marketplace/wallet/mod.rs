//! Provider credit wallets and the append-only transaction ledger.
//!
//! Wallets never move money directly: every balance change is one ledger
//! entry applied through an optimistic version check, so the materialized
//! balance always equals the sum of the ledger.

pub mod domain;
pub mod ledger;
pub mod repository;
pub mod router;

pub use domain::{TransactionId, TransactionReason, Wallet, WalletTransaction, WalletView};
pub use ledger::{LedgerError, WalletLedger};
pub use repository::{InMemoryWalletStore, WalletRepository};
pub use router::wallet_router;
