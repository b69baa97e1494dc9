//! Stateless market scoring calculators.
//!
//! Every calculator takes its lookup tables and thresholds from
//! [`ScoringConfig`] at construction time and never touches storage; callers
//! pass in whatever history the calculation needs.

pub mod demand;
pub mod pricing;
pub mod quality;

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub use demand::{
    DemandForecast, DemandForecaster, DemandLevel, DemandSample, DemandTrend, ForecastPeriod,
    ForecastWindow, ProductDemand,
};
pub use pricing::{PriceBreakdown, PriceQuery, PriceSuggestion, PriceSuggestionEngine, QualityTier};
pub use quality::QualityInspector;

/// Rounds a monetary amount to two decimals, midpoint away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub pricing: PricingTables,
    pub demand: DemandThresholds,
    pub quality: QualityThresholds,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePrice {
    pub product_type: String,
    pub price: Decimal,
}

impl BasePrice {
    fn new(product_type: &str, price: i64) -> Self {
        Self { product_type: product_type.to_string(), price: Decimal::from(price) }
    }
}

/// Discount applied when the quantity is strictly greater than
/// `min_quantity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTier {
    pub min_quantity: Decimal,
    pub discount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFactors {
    pub premium: Decimal,
    pub standard: Decimal,
    pub basic: Decimal,
}

impl Default for QualityFactors {
    fn default() -> Self {
        Self { premium: Decimal::new(12, 1), standard: Decimal::ONE, basic: Decimal::new(85, 2) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTables {
    /// Base price per kg by millet type. Order is significant: demand
    /// forecasts list product types in this order before sorting.
    pub base_prices: Vec<BasePrice>,
    pub default_base_price: Decimal,
    pub location_factors: BTreeMap<String, Decimal>,
    pub default_location_factor: Decimal,
    pub quality_factors: QualityFactors,
    /// Ascending by `min_quantity`; the last satisfied tier wins.
    pub bulk_tiers: Vec<BulkTier>,
    pub history_window: u32,
    pub seasonal_floor: Decimal,
    pub seasonal_ceiling: Decimal,
}

impl Default for PricingTables {
    fn default() -> Self {
        let location_factors = [
            ("Karnataka", Decimal::new(11, 1)),
            ("Tamil Nadu", Decimal::new(105, 2)),
            ("Andhra Pradesh", Decimal::new(108, 2)),
            ("Telangana", Decimal::new(107, 2)),
            ("Maharashtra", Decimal::ONE),
            ("Kerala", Decimal::new(115, 2)),
        ]
        .into_iter()
        .map(|(region, factor)| (region.to_string(), factor))
        .collect();

        Self {
            base_prices: vec![
                BasePrice::new("Finger Millet", 45),
                BasePrice::new("Pearl Millet", 40),
                BasePrice::new("Foxtail Millet", 55),
                BasePrice::new("Little Millet", 50),
                BasePrice::new("Kodo Millet", 52),
                BasePrice::new("Barnyard Millet", 48),
                BasePrice::new("Proso Millet", 46),
                BasePrice::new("Browntop Millet", 54),
            ],
            default_base_price: Decimal::from(45),
            location_factors,
            default_location_factor: Decimal::new(95, 2),
            quality_factors: QualityFactors::default(),
            bulk_tiers: vec![
                BulkTier { min_quantity: Decimal::from(100), discount: Decimal::new(5, 2) },
                BulkTier { min_quantity: Decimal::from(500), discount: Decimal::new(8, 2) },
                BulkTier { min_quantity: Decimal::from(1000), discount: Decimal::new(10, 2) },
            ],
            history_window: 30,
            seasonal_floor: Decimal::new(90, 2),
            seasonal_ceiling: Decimal::new(115, 2),
        }
    }
}

impl PricingTables {
    /// Exact-key lookup; anything else prices at `default_base_price`.
    pub fn base_price(&self, product_type: &str) -> Option<Decimal> {
        self.base_prices
            .iter()
            .find(|entry| entry.product_type == product_type)
            .map(|entry| entry.price)
    }

    /// Exact-key lookup; anything else uses `default_location_factor`.
    pub fn location_factor(&self, region: &str) -> Option<Decimal> {
        self.location_factors.get(region).copied()
    }

    pub fn product_types(&self) -> impl Iterator<Item = &str> {
        self.base_prices.iter().map(|entry| entry.product_type.as_str())
    }
}

/// Order-count thresholds used by the demand forecast. Comparisons are strict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandThresholds {
    pub high_above: u32,
    pub medium_above: u32,
    pub increasing_above: u32,
    pub decreasing_below: u32,
}

impl Default for DemandThresholds {
    fn default() -> Self {
        Self { high_above: 20, medium_above: 10, increasing_above: 15, decreasing_below: 5 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Moisture percentage above which a batch is unsafe to store (default: 14)
    pub moisture_critical: f64,
    /// Moisture percentage above which a warning is raised (default: 12)
    pub moisture_warning: f64,
    pub impurity_critical: f64,
    pub impurity_warning: f64,
    /// Maximum tolerated weight deviation, in percent of the expected weight
    pub weight_variance_pct: f64,
    pub critical_penalty: u8,
    pub warning_penalty: u8,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            moisture_critical: 14.0,
            moisture_warning: 12.0,
            impurity_critical: 2.0,
            impurity_warning: 1.0,
            weight_variance_pct: 5.0,
            critical_penalty: 20,
            warning_penalty: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{round_money, PricingTables};

    #[test]
    fn round_money_rounds_midpoints_up() {
        assert_eq!(round_money(Decimal::new(56_425, 3)), Decimal::new(5_643, 2));
        assert_eq!(round_money(Decimal::new(56_424, 3)), Decimal::new(5_642, 2));
        assert_eq!(round_money(Decimal::new(84645, 1)), Decimal::new(846_450, 2));
    }

    #[test]
    fn table_lookups_match_keys_exactly() {
        let tables = PricingTables::default();
        assert_eq!(tables.base_price("Finger Millet"), Some(Decimal::from(45)));
        assert_eq!(tables.base_price("finger millet"), None);
        assert_eq!(tables.location_factor("Kerala"), Some(Decimal::new(115, 2)));
        assert_eq!(tables.location_factor("karnataka"), None);
        assert_eq!(tables.base_price("Sorghum"), None);
        assert_eq!(tables.product_types().count(), 8);
    }
}
