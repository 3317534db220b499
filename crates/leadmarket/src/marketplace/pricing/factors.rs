use std::sync::RwLock;

use chrono::{DateTime, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::marketplace::leads::{Category, Location, UrgencyTier};

/// Coarse daypart bucket used as a pricing dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket for an hour-of-day in `0..24`.
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn of(timestamp: DateTime<Utc>) -> Self {
        Self::from_hour(timestamp.hour())
    }

    pub const fn label(self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

/// The demand-model dimensions a multiplier row is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactorKey {
    pub category: Category,
    pub location: Location,
    pub urgency: UrgencyTier,
    pub time_of_day: TimeOfDay,
    pub day_of_week: Weekday,
}

/// One learned multiplier row, as published by the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingFactor {
    pub key: FactorKey,
    pub multiplier: Decimal,
    /// When the row starts to apply. Among matching rows the most recent
    /// effective one wins.
    pub effective_at: DateTime<Utc>,
}

/// Read seam over the externally trained multiplier table.
///
/// Lookups return `None` rather than failing; the calculator treats every
/// miss as "use the default multiplier", so a broken or empty table can
/// degrade prices but never block lead creation.
pub trait PricingFactorSource: Send + Sync {
    /// Most recent row effective at `as_of` matching the full key.
    fn exact(&self, key: &FactorKey, as_of: DateTime<Utc>) -> Option<PricingFactor>;

    /// Most recent row effective at `as_of` matching only category and
    /// urgency, used when no exact row exists.
    fn for_category_urgency(
        &self,
        category: &Category,
        urgency: UrgencyTier,
        as_of: DateTime<Utc>,
    ) -> Option<PricingFactor>;
}

#[derive(Debug, Default)]
struct FactorSnapshot {
    version: u64,
    rows: Vec<PricingFactor>,
}

/// In-memory multiplier table, replaced wholesale whenever the training
/// pipeline publishes a new snapshot.
#[derive(Debug, Default)]
pub struct InMemoryFactorTable {
    snapshot: RwLock<FactorSnapshot>,
}

impl InMemoryFactorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly trained snapshot, discarding the previous one.
    /// `version` only identifies the snapshot in logs.
    pub fn install_snapshot(&self, version: u64, rows: Vec<PricingFactor>) {
        let mut snapshot = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!(version, rows = rows.len(), "installing pricing factor snapshot");
        snapshot.version = version;
        snapshot.rows = rows;
    }

    pub fn snapshot_version(&self) -> u64 {
        match self.snapshot.read() {
            Ok(guard) => guard.version,
            Err(poisoned) => poisoned.into_inner().version,
        }
    }
}

impl PricingFactorSource for InMemoryFactorTable {
    fn exact(&self, key: &FactorKey, as_of: DateTime<Utc>) -> Option<PricingFactor> {
        let snapshot = self.snapshot.read().ok()?;
        snapshot
            .rows
            .iter()
            .filter(|row| row.key == *key && row.effective_at <= as_of)
            .max_by_key(|row| row.effective_at)
            .cloned()
    }

    fn for_category_urgency(
        &self,
        category: &Category,
        urgency: UrgencyTier,
        as_of: DateTime<Utc>,
    ) -> Option<PricingFactor> {
        let snapshot = self.snapshot.read().ok()?;
        snapshot
            .rows
            .iter()
            .filter(|row| {
                row.key.category == *category
                    && row.key.urgency == urgency
                    && row.effective_at <= as_of
            })
            .max_by_key(|row| row.effective_at)
            .cloned()
    }
}
