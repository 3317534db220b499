//! Dynamic lead pricing.
//!
//! A lead's credit cost is `base_price(category) * multiplier`, where the
//! multiplier comes from an externally trained demand model. The engine
//! only ever reads multiplier snapshots through [`PricingFactorSource`];
//! training and publishing those snapshots happens elsewhere.

pub mod calculator;
pub mod config;
pub mod factors;

pub use calculator::{MultiplierSource, PriceCalculator, PriceQuote};
pub use config::PricingConfig;
pub use factors::{
    FactorKey, InMemoryFactorTable, PricingFactor, PricingFactorSource, TimeOfDay,
};
