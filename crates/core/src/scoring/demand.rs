use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::scoring::{DemandThresholds, ScoringConfig};

pub const ALL_REGIONS_LABEL: &str = "All India";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastPeriod {
    Weekly,
    #[default]
    Monthly,
    Quarterly,
}

impl ForecastPeriod {
    /// Unknown or missing keywords fall back to `Monthly`.
    pub fn parse_or_monthly(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("weekly") => Self::Weekly,
            Some("quarterly") => Self::Quarterly,
            _ => Self::Monthly,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }
}

/// Normalizes a requested region: absent, blank, `All` and `All India` mean
/// every region.
pub fn region_filter(location: Option<&str>) -> Option<String> {
    let trimmed = location.map(str::trim).filter(|value| !value.is_empty())?;
    if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case(ALL_REGIONS_LABEL) {
        return None;
    }
    Some(trimmed.to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// One order inside the forecast window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemandSample {
    pub product_type: String,
    pub quantity: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DemandLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DemandTrend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDemand {
    pub millet_type: String,
    pub demand_level: DemandLevel,
    pub trend: DemandTrend,
    pub orders_count: u32,
    pub total_quantity: Decimal,
    pub average_order_size: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandSummary {
    pub total_orders: u32,
    pub date_range: ForecastWindow,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandForecast {
    pub location: String,
    pub period: ForecastPeriod,
    pub forecast: Vec<ProductDemand>,
    pub summary: DemandSummary,
}

pub struct DemandForecaster {
    product_types: Vec<String>,
    thresholds: DemandThresholds,
}

impl DemandForecaster {
    pub fn new(product_types: Vec<String>, thresholds: DemandThresholds) -> Self {
        Self { product_types, thresholds }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(
            config.pricing.product_types().map(str::to_owned).collect(),
            config.demand,
        )
    }

    pub fn window(&self, period: ForecastPeriod, now: DateTime<Utc>) -> ForecastWindow {
        ForecastWindow { from: now - Duration::days(period.days()), to: now }
    }

    /// Builds a forecast from the orders that fell inside `window`. Every
    /// known product type is reported, including those with no orders, and
    /// the list is stably sorted from High to Low demand.
    pub fn forecast(
        &self,
        location: &str,
        period: ForecastPeriod,
        window: ForecastWindow,
        samples: &[DemandSample],
    ) -> DemandForecast {
        let mut totals: HashMap<String, (u32, Decimal)> = HashMap::new();
        for sample in samples {
            let entry = totals
                .entry(sample.product_type.trim().to_ascii_lowercase())
                .or_insert((0, Decimal::ZERO));
            entry.0 = entry.0.saturating_add(1);
            entry.1 = entry.1.checked_add(sample.quantity).unwrap_or(Decimal::MAX);
        }

        let mut forecast: Vec<ProductDemand> = self
            .product_types
            .iter()
            .map(|product_type| {
                let (count, quantity) = totals
                    .get(&product_type.to_ascii_lowercase())
                    .copied()
                    .unwrap_or((0, Decimal::ZERO));
                self.classify(product_type, count, quantity)
            })
            .collect();
        forecast.sort_by(|left, right| right.demand_level.cmp(&left.demand_level));

        DemandForecast {
            location: location.to_string(),
            period,
            forecast,
            summary: DemandSummary {
                total_orders: u32::try_from(samples.len()).unwrap_or(u32::MAX),
                date_range: window,
            },
        }
    }

    fn classify(&self, product_type: &str, count: u32, quantity: Decimal) -> ProductDemand {
        let thresholds = &self.thresholds;
        let demand_level = if count > thresholds.high_above {
            DemandLevel::High
        } else if count > thresholds.medium_above {
            DemandLevel::Medium
        } else {
            DemandLevel::Low
        };
        let trend = if count > thresholds.increasing_above {
            DemandTrend::Increasing
        } else if count < thresholds.decreasing_below {
            DemandTrend::Decreasing
        } else {
            DemandTrend::Stable
        };
        let average_order_size = if count > 0 {
            (quantity / Decimal::from(count))
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        } else {
            Decimal::ZERO
        };

        ProductDemand {
            millet_type: product_type.to_string(),
            demand_level,
            trend,
            orders_count: count,
            total_quantity: quantity,
            average_order_size,
        }
    }
}

impl Default for DemandForecaster {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}
