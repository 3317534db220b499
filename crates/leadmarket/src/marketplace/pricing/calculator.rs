use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::warn;

use super::config::PricingConfig;
use super::factors::{FactorKey, PricingFactorSource, TimeOfDay};
use crate::marketplace::leads::{Category, Location, UrgencyTier};

/// Multiplier applied when no model row matches.
pub const DEFAULT_MULTIPLIER: Decimal = Decimal::ONE;

/// Which lookup produced the applied multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierSource {
    Exact,
    CategoryUrgency,
    Default,
}

impl MultiplierSource {
    pub const fn label(self) -> &'static str {
        match self {
            MultiplierSource::Exact => "exact",
            MultiplierSource::CategoryUrgency => "category_urgency",
            MultiplierSource::Default => "default",
        }
    }
}

/// Priced outcome for one lead at quote time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    /// Final credit cost, rounded to two decimal places.
    pub credit_cost: Decimal,
    /// The multiplier actually applied, after clamping.
    pub multiplier: Decimal,
    pub source: MultiplierSource,
}

/// Stateless price calculator combining configured base prices with
/// learned demand multipliers.
///
/// Quoting never fails: a missing row, an empty table, or a poisoned
/// table lock all degrade to the default multiplier.
#[derive(Debug)]
pub struct PriceCalculator<S> {
    factors: Arc<S>,
    config: PricingConfig,
}

impl<S> Clone for PriceCalculator<S> {
    fn clone(&self) -> Self {
        Self {
            factors: Arc::clone(&self.factors),
            config: self.config.clone(),
        }
    }
}

impl<S: PricingFactorSource> PriceCalculator<S> {
    pub fn new(factors: Arc<S>, config: PricingConfig) -> Self {
        Self { factors, config }
    }

    /// Price a lead with the given dimensions as of `now`.
    ///
    /// Lookup order: exact five-dimension key, then category plus urgency,
    /// then the default multiplier. The multiplier is clamped to the
    /// configured bounds before it touches the price.
    pub fn quote(
        &self,
        category: &Category,
        location: &Location,
        urgency: UrgencyTier,
        now: DateTime<Utc>,
    ) -> PriceQuote {
        let key = FactorKey {
            category: category.clone(),
            location: location.clone(),
            urgency,
            time_of_day: TimeOfDay::of(now),
            day_of_week: now.weekday(),
        };

        let (multiplier, source) = match self.factors.exact(&key, now) {
            Some(row) => (row.multiplier, MultiplierSource::Exact),
            None => match self.factors.for_category_urgency(category, urgency, now) {
                Some(row) => (row.multiplier, MultiplierSource::CategoryUrgency),
                None => (DEFAULT_MULTIPLIER, MultiplierSource::Default),
            },
        };

        let clamped = multiplier.clamp(self.config.min_multiplier, self.config.max_multiplier);
        if clamped != multiplier {
            warn!(
                category = %category,
                raw = %multiplier,
                applied = %clamped,
                "clamped out-of-bounds pricing multiplier"
            );
        }

        let base = self.config.base_price(category);
        let credit_cost =
            (base * clamped).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        PriceQuote {
            credit_cost,
            multiplier: clamped,
            source,
        }
    }
}
