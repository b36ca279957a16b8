//! Reference-price resolution
//!
//! Listings and buy orders are never priced against each other. Both sides derive a unit price from the reference
//! market (see [`MarketPrice`]) using a [`PricingPolicy`]: a price source and a percentage mark-up or mark-down.
//!
//! Policies are layered. A container or auto-buy config supplies the default policy, and a per-item override may
//! shadow either field independently:
//!
//! ```rust
//! use trade_engine::{db_types::PriceSource, pricing::PricingPolicy};
//! let default = PricingPolicy::new(PriceSource::JitaBuy, 90.0);
//! let policy = PricingPolicy::layered(default, Some(PriceSource::JitaSell), None);
//! assert_eq!(policy.source, PriceSource::JitaSell);
//! assert_eq!(policy.percentage, 90.0);
//! ```
use serde::{Deserialize, Serialize};
use trade_common::Isk;

use crate::db_types::{AutoBuyConfig, AutoSellContainer, MarketPrice, PriceSource, StockpileDeficit};

/// Maps a reference price record to a single base price for the given source.
///
/// `jita_split` is only defined when both sides of the market are present. A `None` result means "no usable price",
/// and callers must deactivate any derived row for the type rather than leave it untouched.
pub fn resolve_base_price(price: &MarketPrice, source: PriceSource) -> Option<Isk> {
    match source {
        PriceSource::JitaBuy => price.buy_price,
        PriceSource::JitaSell => price.sell_price,
        PriceSource::JitaSplit => match (price.buy_price, price.sell_price) {
            (Some(buy), Some(sell)) => Some(Isk::from((buy.value() + sell.value()) / 2.0)),
            _ => None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub source: PriceSource,
    pub percentage: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { source: PriceSource::default(), percentage: 100.0 }
    }
}

impl PricingPolicy {
    pub fn new(source: PriceSource, percentage: f64) -> Self {
        Self { source, percentage }
    }

    /// Each field of the override, when present, replaces the corresponding field of `default`.
    pub fn layered(default: PricingPolicy, source: Option<PriceSource>, percentage: Option<f64>) -> Self {
        Self { source: source.unwrap_or(default.source), percentage: percentage.unwrap_or(default.percentage) }
    }

    pub fn for_container(container: &AutoSellContainer) -> Self {
        Self::new(container.price_source, container.price_percentage)
    }

    pub fn for_config(config: &AutoBuyConfig) -> Self {
        Self::new(config.price_source, config.price_percentage)
    }

    /// The policy for one deficit line: the deficit's own fields shadow the config defaults.
    pub fn for_deficit(config: &AutoBuyConfig, deficit: &StockpileDeficit) -> Self {
        Self::layered(Self::for_config(config), deficit.price_source, deficit.price_percentage)
    }

    /// `base * percentage / 100`, or `None` if the base price is missing or non-positive, or if the result is not a
    /// positive price.
    pub fn unit_price(&self, price: &MarketPrice) -> Option<Isk> {
        let base = resolve_base_price(price, self.source).filter(Isk::is_positive)?;
        Some(base.percent(self.percentage)).filter(Isk::is_positive)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn price(buy: Option<f64>, sell: Option<f64>) -> MarketPrice {
        MarketPrice::new(34, 10000002, buy, sell)
    }

    #[test]
    fn base_prices() {
        let p = price(Some(5.0), Some(7.0));
        assert_eq!(resolve_base_price(&p, PriceSource::JitaBuy), Some(Isk::from(5.0)));
        assert_eq!(resolve_base_price(&p, PriceSource::JitaSell), Some(Isk::from(7.0)));
        assert_eq!(resolve_base_price(&p, PriceSource::JitaSplit), Some(Isk::from(6.0)));
    }

    #[test]
    fn split_needs_both_sides() {
        assert_eq!(resolve_base_price(&price(Some(5.0), None), PriceSource::JitaSplit), None);
        assert_eq!(resolve_base_price(&price(None, Some(7.0)), PriceSource::JitaSplit), None);
        assert_eq!(resolve_base_price(&price(None, Some(7.0)), PriceSource::JitaBuy), None);
    }

    #[test]
    fn unusable_prices() {
        let policy = PricingPolicy::new(PriceSource::JitaBuy, 90.0);
        assert_eq!(policy.unit_price(&price(Some(0.0), Some(1.0))), None);
        assert_eq!(policy.unit_price(&price(Some(-1.0), None)), None);
        assert_eq!(policy.unit_price(&price(None, Some(1.0))), None);
        let zero = PricingPolicy::new(PriceSource::JitaBuy, 0.0);
        assert_eq!(zero.unit_price(&price(Some(5.0), None)), None);
    }

    #[test]
    fn tritanium_at_ninety_percent() {
        let policy = PricingPolicy::new(PriceSource::JitaBuy, 90.0);
        assert_eq!(policy.unit_price(&price(Some(5.0), Some(6.0))), Some(Isk::from(4.5)));
    }

    #[test]
    fn layering() {
        let default = PricingPolicy::new(PriceSource::JitaSell, 110.0);
        assert_eq!(PricingPolicy::layered(default, None, None), default);
        let p = PricingPolicy::layered(default, None, Some(95.0));
        assert_eq!(p, PricingPolicy::new(PriceSource::JitaSell, 95.0));
        let p = PricingPolicy::layered(default, Some(PriceSource::JitaSplit), None);
        assert_eq!(p, PricingPolicy::new(PriceSource::JitaSplit, 110.0));
    }
}
