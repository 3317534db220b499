use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::marketplace::claims::ClaimId;
use crate::marketplace::leads::ProviderId;

/// Identifier wrapper for ledger transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    /// Debit charged when a claim is admitted.
    ClaimDebit,
    /// Credit returned for a claim, either an administrative refund or an
    /// automatic reversal of a claim that failed mid-flight.
    Refund,
    /// Credit purchased or granted outside the claim flow.
    TopUp,
}

impl TransactionReason {
    pub const fn label(self) -> &'static str {
        match self {
            TransactionReason::ClaimDebit => "claim_debit",
            TransactionReason::Refund => "refund",
            TransactionReason::TopUp => "top_up",
        }
    }
}

/// One append-only ledger entry. `amount` is signed: debits are negative,
/// credits positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub provider_id: ProviderId,
    pub amount: Decimal,
    pub reason: TransactionReason,
    /// The claim this entry settles or reverses, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_ref: Option<ClaimId>,
    pub created_at: DateTime<Utc>,
}

/// A provider's credit account.
///
/// `balance` is materialized from the ledger; `version` increments on
/// every applied entry and is the optimistic-concurrency token writers
/// check against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub provider_id: ProviderId,
    pub balance: Decimal,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn opened(provider_id: ProviderId, now: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            balance: Decimal::ZERO,
            version: 0,
            updated_at: now,
        }
    }

    pub fn covers(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    pub fn view(&self) -> WalletView {
        WalletView {
            provider_id: self.provider_id.clone(),
            balance: self.balance,
            updated_at: self.updated_at,
        }
    }
}

/// Wallet representation returned by the balance endpoint. The version
/// token stays internal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletView {
    pub provider_id: ProviderId,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}
