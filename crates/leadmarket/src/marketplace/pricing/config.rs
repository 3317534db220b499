use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::marketplace::leads::Category;

/// Pricing knobs: per-category base prices and the clamp bounds applied to
/// model multipliers before they touch a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Base credit price per category. Categories missing here fall back
    /// to `default_base_price`.
    pub base_prices: BTreeMap<Category, Decimal>,
    pub default_base_price: Decimal,
    /// Lower clamp bound for multipliers. Keeps a misbehaving model from
    /// giving leads away.
    pub min_multiplier: Decimal,
    /// Upper clamp bound for multipliers.
    pub max_multiplier: Decimal,
}

impl PricingConfig {
    pub fn base_price(&self, category: &Category) -> Decimal {
        self.base_prices
            .get(category)
            .copied()
            .unwrap_or(self.default_base_price)
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let mut base_prices = BTreeMap::new();
        base_prices.insert(Category("plumbing".to_string()), Decimal::new(5000, 2));
        base_prices.insert(Category("electrical".to_string()), Decimal::new(4500, 2));
        base_prices.insert(Category("heating".to_string()), Decimal::new(5500, 2));
        base_prices.insert(Category("cleaning".to_string()), Decimal::new(1500, 2));
        base_prices.insert(Category("landscaping".to_string()), Decimal::new(2000, 2));
        base_prices.insert(Category("removals".to_string()), Decimal::new(3000, 2));
        Self {
            base_prices,
            default_base_price: Decimal::new(2500, 2),
            min_multiplier: Decimal::new(5, 1),
            max_multiplier: Decimal::new(30, 1),
        }
    }
}
