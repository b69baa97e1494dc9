use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::scoring::{round_money, PricingTables};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityTier {
    Premium,
    #[default]
    Standard,
    Basic,
}

impl QualityTier {
    /// Unknown or missing tiers price as `Standard`.
    pub fn parse_or_standard(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("premium") => Self::Premium,
            Some("basic") => Self::Basic,
            _ => Self::Standard,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceQuery {
    pub product_type: String,
    pub quantity: Decimal,
    pub location: String,
    pub quality: QualityTier,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub location_factor: Decimal,
    pub quality_factor: Decimal,
    pub bulk_discount: Decimal,
    pub seasonal_factor: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestion {
    pub millet_type: String,
    pub quantity: Decimal,
    pub location: String,
    pub quality: QualityTier,
    pub suggested_price: Decimal,
    pub total_cost: Decimal,
    #[serde(rename = "priceBreakdown")]
    pub breakdown: PriceBreakdown,
    pub recommendation: String,
    pub history_samples: usize,
}

pub const BULK_RECOMMENDATION: &str = "Bulk discount applied - Good deal for large quantities!";
pub const SMALL_ORDER_RECOMMENDATION: &str =
    "Consider ordering in bulk (>100kg) for better pricing";

pub struct PriceSuggestionEngine {
    tables: PricingTables,
}

impl PriceSuggestionEngine {
    pub fn new(tables: PricingTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &PricingTables {
        &self.tables
    }

    /// Number of recent prices the seasonal adjustment looks at.
    pub fn history_window(&self) -> u32 {
        self.tables.history_window
    }

    /// Suggests a per-kg price. `recent_prices` are the most recent observed
    /// prices for the product type, newest first; only the first
    /// `history_window` entries are used.
    pub fn suggest(
        &self,
        query: &PriceQuery,
        recent_prices: &[Decimal],
    ) -> Result<PriceSuggestion, DomainError> {
        if query.quantity <= Decimal::ZERO {
            return Err(DomainError::InvalidInput("quantity must be positive".to_string()));
        }

        let tables = &self.tables;
        let base_price =
            tables.base_price(&query.product_type).unwrap_or(tables.default_base_price);
        let location_factor =
            tables.location_factor(&query.location).unwrap_or(tables.default_location_factor);
        let quality_factor = match query.quality {
            QualityTier::Premium => tables.quality_factors.premium,
            QualityTier::Standard => tables.quality_factors.standard,
            QualityTier::Basic => tables.quality_factors.basic,
        };
        let bulk_discount = self.bulk_discount(query.quantity);

        let window = recent_prices.len().min(tables.history_window as usize);
        let history = &recent_prices[..window];
        let seasonal_factor = self.seasonal_factor(base_price, history);

        let out_of_range =
            || DomainError::InvalidInput("quantity exceeds the supported range".to_string());
        let unit = [location_factor, quality_factor, seasonal_factor, Decimal::ONE - bulk_discount]
            .into_iter()
            .try_fold(base_price, |acc, factor| acc.checked_mul(factor))
            .ok_or_else(out_of_range)?;
        let suggested_price = round_money(unit);
        let total_cost = suggested_price
            .checked_mul(query.quantity)
            .map(round_money)
            .ok_or_else(out_of_range)?;

        let recommendation = if bulk_discount > Decimal::ZERO {
            BULK_RECOMMENDATION
        } else {
            SMALL_ORDER_RECOMMENDATION
        };

        Ok(PriceSuggestion {
            millet_type: query.product_type.clone(),
            quantity: query.quantity,
            location: query.location.clone(),
            quality: query.quality,
            suggested_price,
            total_cost,
            breakdown: PriceBreakdown {
                base_price,
                location_factor,
                quality_factor,
                bulk_discount,
                seasonal_factor: round_money(seasonal_factor),
            },
            recommendation: recommendation.to_string(),
            history_samples: window,
        })
    }

    fn bulk_discount(&self, quantity: Decimal) -> Decimal {
        self.tables
            .bulk_tiers
            .iter()
            .filter(|tier| quantity > tier.min_quantity)
            .last()
            .map(|tier| tier.discount)
            .unwrap_or(Decimal::ZERO)
    }

    fn seasonal_factor(&self, base_price: Decimal, history: &[Decimal]) -> Decimal {
        if history.is_empty() || base_price <= Decimal::ZERO {
            return Decimal::ONE;
        }
        let ceiling = self.tables.seasonal_ceiling;
        let ratio = history
            .iter()
            .try_fold(Decimal::ZERO, |acc, price| acc.checked_add(*price))
            .and_then(|sum| sum.checked_div(Decimal::from(history.len())))
            .and_then(|mean| mean.checked_div(base_price))
            .unwrap_or(ceiling);
        ratio.clamp(self.tables.seasonal_floor, ceiling)
    }
}

impl Default for PriceSuggestionEngine {
    fn default() -> Self {
        Self::new(PricingTables::default())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        PriceQuery, PriceSuggestionEngine, QualityTier, BULK_RECOMMENDATION,
        SMALL_ORDER_RECOMMENDATION,
    };
    use crate::errors::DomainError;
    use crate::scoring::{BasePrice, PricingTables};

    fn query(product_type: &str, quantity: i64, location: &str, quality: QualityTier) -> PriceQuery {
        PriceQuery {
            product_type: product_type.to_string(),
            quantity: Decimal::from(quantity),
            location: location.to_string(),
            quality,
        }
    }

    #[test]
    fn premium_finger_millet_in_karnataka_without_history() {
        let engine = PriceSuggestionEngine::default();
        let suggestion = engine
            .suggest(&query("Finger Millet", 150, "Karnataka", QualityTier::Premium), &[])
            .expect("valid query");

        assert_eq!(suggestion.suggested_price, Decimal::new(5643, 2));
        assert_eq!(suggestion.total_cost, Decimal::new(84645, 1));
        assert_eq!(suggestion.breakdown.base_price, Decimal::from(45));
        assert_eq!(suggestion.breakdown.location_factor, Decimal::new(11, 1));
        assert_eq!(suggestion.breakdown.quality_factor, Decimal::new(12, 1));
        assert_eq!(suggestion.breakdown.bulk_discount, Decimal::new(5, 2));
        assert_eq!(suggestion.breakdown.seasonal_factor, Decimal::ONE);
        assert_eq!(suggestion.recommendation, BULK_RECOMMENDATION);
        assert_eq!(suggestion.history_samples, 0);
    }

    #[test]
    fn unknown_product_and_region_fall_back_to_defaults() {
        let engine = PriceSuggestionEngine::default();
        let suggestion = engine
            .suggest(&query("Sorghum", 10, "Goa", QualityTier::Standard), &[])
            .expect("valid query");

        // 45 * 0.95
        assert_eq!(suggestion.suggested_price, Decimal::new(4275, 2));
        assert_eq!(suggestion.total_cost, Decimal::new(4275, 1));
        assert_eq!(suggestion.recommendation, SMALL_ORDER_RECOMMENDATION);
    }

    #[test]
    fn bulk_thresholds_are_strict_and_last_tier_wins() {
        let engine = PriceSuggestionEngine::default();
        let discount = |quantity: i64| {
            engine
                .suggest(&query("Pearl Millet", quantity, "Maharashtra", QualityTier::Standard), &[])
                .expect("valid")
                .breakdown
                .bulk_discount
        };

        assert_eq!(discount(100), Decimal::ZERO);
        assert_eq!(discount(101), Decimal::new(5, 2));
        assert_eq!(discount(500), Decimal::new(5, 2));
        assert_eq!(discount(501), Decimal::new(8, 2));
        assert_eq!(discount(1000), Decimal::new(8, 2));
        assert_eq!(discount(1001), Decimal::new(10, 2));
    }

    #[test]
    fn unit_price_never_increases_with_quantity() {
        let engine = PriceSuggestionEngine::default();
        let mut previous = None;
        for quantity in [1, 50, 100, 101, 250, 500, 501, 999, 1000, 1001, 5000] {
            let price = engine
                .suggest(&query("Kodo Millet", quantity, "Kerala", QualityTier::Basic), &[])
                .expect("valid")
                .suggested_price;
            if let Some(previous) = previous {
                assert!(price <= previous, "quantity {quantity}: {price} > {previous}");
            }
            previous = Some(price);
        }
    }

    #[test]
    fn seasonal_factor_is_clamped_for_extreme_history() {
        let engine = PriceSuggestionEngine::default();
        let spike = vec![Decimal::from(10_000); 30];
        let crash = vec![Decimal::new(1, 2); 30];

        let high = engine
            .suggest(&query("Finger Millet", 10, "Maharashtra", QualityTier::Standard), &spike)
            .expect("valid");
        let low = engine
            .suggest(&query("Finger Millet", 10, "Maharashtra", QualityTier::Standard), &crash)
            .expect("valid");

        assert_eq!(high.breakdown.seasonal_factor, Decimal::new(115, 2));
        assert_eq!(high.suggested_price, Decimal::new(5175, 2));
        assert_eq!(low.breakdown.seasonal_factor, Decimal::new(90, 2));
        assert_eq!(low.suggested_price, Decimal::new(4050, 2));
    }

    #[test]
    fn only_the_configured_history_window_is_used() {
        let engine = PriceSuggestionEngine::new(PricingTables {
            history_window: 2,
            ..PricingTables::default()
        });
        let history = [Decimal::from(50), Decimal::from(50), Decimal::from(1)];

        let suggestion = engine
            .suggest(&query("Little Millet", 10, "Maharashtra", QualityTier::Standard), &history)
            .expect("valid");

        assert_eq!(suggestion.history_samples, 2);
        assert_eq!(suggestion.breakdown.seasonal_factor, Decimal::ONE);
        assert_eq!(suggestion.suggested_price, Decimal::from(50));
    }

    #[test]
    fn identical_inputs_give_identical_suggestions() {
        let engine = PriceSuggestionEngine::default();
        let history = [Decimal::new(4810, 2), Decimal::new(4790, 2)];
        let request = query("Barnyard Millet", 320, "Telangana", QualityTier::Premium);

        let first = engine.suggest(&request, &history).expect("valid");
        let second = engine.suggest(&request, &history).expect("valid");
        assert_eq!(first, second);
    }

    #[test]
    fn alternate_tables_can_be_injected() {
        let engine = PriceSuggestionEngine::new(PricingTables {
            base_prices: vec![BasePrice { product_type: "Ragi".to_string(), price: Decimal::from(60) }],
            ..PricingTables::default()
        });
        let suggestion = engine
            .suggest(&query("Ragi", 1, "Maharashtra", QualityTier::Standard), &[])
            .expect("valid");
        assert_eq!(suggestion.suggested_price, Decimal::from(60));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let engine = PriceSuggestionEngine::default();
        let error = engine
            .suggest(&query("Finger Millet", 0, "Karnataka", QualityTier::Standard), &[])
            .expect_err("zero quantity");
        assert!(matches!(error, DomainError::InvalidInput(_)));
    }

    #[test]
    fn quantities_too_large_to_price_are_rejected() {
        let engine = PriceSuggestionEngine::default();
        let mut huge = query("Finger Millet", 1, "Karnataka", QualityTier::Standard);
        huge.quantity = Decimal::MAX;

        let error = engine.suggest(&huge, &[]).expect_err("total overflows");
        assert!(matches!(error, DomainError::InvalidInput(ref message) if message.contains("quantity")));
    }

    #[test]
    fn extreme_price_history_saturates_at_the_seasonal_ceiling() {
        let engine = PriceSuggestionEngine::default();
        let suggestion = engine
            .suggest(
                &query("Finger Millet", 10, "Karnataka", QualityTier::Standard),
                &[Decimal::MAX, Decimal::MAX],
            )
            .expect("history overflow is not an input error");

        assert_eq!(suggestion.breakdown.seasonal_factor, Decimal::new(115, 2));
    }

    #[test]
    fn quality_tier_parsing_defaults_to_standard() {
        assert_eq!(QualityTier::parse_or_standard(Some("premium")), QualityTier::Premium);
        assert_eq!(QualityTier::parse_or_standard(Some("Basic")), QualityTier::Basic);
        assert_eq!(QualityTier::parse_or_standard(Some("Gold")), QualityTier::Standard);
        assert_eq!(QualityTier::parse_or_standard(None), QualityTier::Standard);
    }
}
