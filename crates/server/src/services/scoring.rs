use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use milletchain_core::domain::batch::{BatchId, BatchMeasurements, QualityCheckRecord};
use milletchain_core::errors::ApplicationError;
use milletchain_core::scoring::demand::{region_filter, ALL_REGIONS_LABEL};
use milletchain_core::scoring::{
    DemandForecast, DemandForecaster, DemandSample, ForecastPeriod, PriceQuery, PriceSuggestion,
    PriceSuggestionEngine, QualityInspector, ScoringConfig,
};
use milletchain_db::repositories::{
    OrderRepository, PriceHistoryRepository, QualityCheckRepository,
};

/// Feeds stored history into the scoring calculators and logs quality
/// verdicts.
pub struct ScoringService {
    prices: Arc<dyn PriceHistoryRepository>,
    orders: Arc<dyn OrderRepository>,
    quality_log: Arc<dyn QualityCheckRepository>,
    pricing: PriceSuggestionEngine,
    demand: DemandForecaster,
    inspector: QualityInspector,
}

impl ScoringService {
    pub fn new(
        config: &ScoringConfig,
        prices: Arc<dyn PriceHistoryRepository>,
        orders: Arc<dyn OrderRepository>,
        quality_log: Arc<dyn QualityCheckRepository>,
    ) -> Self {
        Self {
            prices,
            orders,
            quality_log,
            pricing: PriceSuggestionEngine::new(config.pricing.clone()),
            demand: DemandForecaster::from_config(config),
            inspector: QualityInspector::new(config.quality),
        }
    }

    pub async fn suggest_price(
        &self,
        query: PriceQuery,
        correlation_id: &str,
    ) -> Result<PriceSuggestion, ApplicationError> {
        let history =
            self.prices.recent_prices(&query.product_type, self.pricing.history_window()).await?;
        let suggestion = self.pricing.suggest(&query, &history)?;

        info!(
            event_name = "scoring.price.suggested",
            correlation_id = %correlation_id,
            millet_type = %suggestion.millet_type,
            location = %suggestion.location,
            suggested_price = %suggestion.suggested_price,
            history_samples = suggestion.history_samples,
            "price suggestion computed"
        );
        Ok(suggestion)
    }

    pub async fn forecast_demand(
        &self,
        location: Option<&str>,
        period: Option<&str>,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<DemandForecast, ApplicationError> {
        let period = ForecastPeriod::parse_or_monthly(period);
        let window = self.demand.window(period, now);
        let region = region_filter(location);

        let orders = self.orders.list_created_since(window.from, region.as_deref()).await?;
        let samples = orders
            .into_iter()
            .map(|order| DemandSample { product_type: order.product_type, quantity: order.quantity })
            .collect::<Vec<_>>();

        let label = region.as_deref().unwrap_or(ALL_REGIONS_LABEL);
        let forecast = self.demand.forecast(label, period, window, &samples);

        info!(
            event_name = "scoring.demand.forecasted",
            correlation_id = %correlation_id,
            location = %forecast.location,
            period = period.as_str(),
            total_orders = forecast.summary.total_orders,
            "demand forecast computed"
        );
        Ok(forecast)
    }

    /// Inspects a batch and appends the verdict to the quality log. A failed
    /// append is logged; the verdict is returned either way.
    pub async fn check_quality(
        &self,
        batch_id: BatchId,
        product_type: String,
        measurements: BatchMeasurements,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> QualityCheckRecord {
        let verdict = self.inspector.inspect(&measurements, now);
        let record = QualityCheckRecord {
            id: Uuid::new_v4().to_string(),
            batch_id,
            product_type,
            measurements,
            verdict,
        };

        if let Err(error) = self.quality_log.append(record.clone()).await {
            warn!(
                event_name = "scoring.quality.log_failed",
                correlation_id = %correlation_id,
                batch_id = %record.batch_id,
                error = %error,
                "failed to append quality check to log"
            );
        }

        info!(
            event_name = "scoring.quality.checked",
            correlation_id = %correlation_id,
            batch_id = %record.batch_id,
            status = record.verdict.status.as_str(),
            score = record.verdict.score,
            "quality check completed"
        );
        record
    }

    pub async fn quality_history(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<QualityCheckRecord>, ApplicationError> {
        Ok(self.quality_log.list_for_batch(batch_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use milletchain_core::domain::batch::{
        BatchId, BatchMeasurements, GrainColor, GrainSize, QualityCheckRecord, QualityStatus,
    };
    use milletchain_core::domain::market::PriceRecord;
    use milletchain_core::domain::order::{Order, OrderId, PlaceOrder, SellerCategory};
    use milletchain_core::errors::{ApplicationError, DomainError};
    use milletchain_core::scoring::{
        DemandLevel, ForecastPeriod, PriceQuery, QualityTier, ScoringConfig,
    };
    use milletchain_db::repositories::{
        InMemoryOrderRepository, InMemoryPriceHistoryRepository, InMemoryQualityCheckRepository,
        OrderRepository, PriceHistoryRepository, QualityCheckRepository, RepositoryError,
    };

    use super::ScoringService;

    fn service(
        prices: Arc<InMemoryPriceHistoryRepository>,
        orders: Arc<InMemoryOrderRepository>,
        quality: Arc<dyn QualityCheckRepository>,
    ) -> ScoringService {
        ScoringService::new(&ScoringConfig::default(), prices, orders, quality)
    }

    #[tokio::test]
    async fn price_suggestion_uses_recent_history() {
        let prices = Arc::new(InMemoryPriceHistoryRepository::default());
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).single().expect("timestamp");
        for (day, price) in [(0, 60), (1, 60)] {
            prices
                .append(PriceRecord {
                    product_type: "Finger Millet".to_string(),
                    region: None,
                    price: Decimal::new(price, 0),
                    recorded_at: start + Duration::days(day),
                })
                .await
                .expect("append");
        }
        let scoring = service(
            prices,
            Arc::new(InMemoryOrderRepository::default()),
            Arc::new(InMemoryQualityCheckRepository::default()),
        );

        let suggestion = scoring
            .suggest_price(
                PriceQuery {
                    product_type: "Finger Millet".to_string(),
                    quantity: Decimal::new(50, 0),
                    location: "Karnataka".to_string(),
                    quality: QualityTier::Standard,
                },
                "test",
            )
            .await
            .expect("suggest");

        // 60 / 45 clamps to the 1.15 ceiling: 45 * 1.1 * 1.15 = 56.925
        assert_eq!(suggestion.breakdown.seasonal_factor, Decimal::new(115, 2));
        assert_eq!(suggestion.suggested_price, Decimal::new(5693, 2));
        assert_eq!(suggestion.history_samples, 2);
    }

    #[tokio::test]
    async fn non_positive_quantity_is_a_domain_error() {
        let scoring = service(
            Arc::new(InMemoryPriceHistoryRepository::default()),
            Arc::new(InMemoryOrderRepository::default()),
            Arc::new(InMemoryQualityCheckRepository::default()),
        );

        let error = scoring
            .suggest_price(
                PriceQuery {
                    product_type: "Kodo Millet".to_string(),
                    quantity: Decimal::ZERO,
                    location: "Kerala".to_string(),
                    quality: QualityTier::Basic,
                },
                "test",
            )
            .await
            .expect_err("zero quantity");

        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidInput(_))));
        assert_eq!(error.into_interface("cid").status_code(), 400);
    }

    #[tokio::test]
    async fn forecast_counts_orders_in_window_and_region() {
        let orders = Arc::new(InMemoryOrderRepository::default());
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).single().expect("timestamp");
        for index in 0..22 {
            let region = if index < 21 { "Karnataka" } else { "Kerala" };
            let order = Order::place(
                PlaceOrder {
                    id: OrderId(format!("ORD-{index}")),
                    product_id: "prod-ragi".to_string(),
                    product_name: "Ragi".to_string(),
                    product_type: "Finger Millet".to_string(),
                    region: Some(region.to_string()),
                    buyer_id: "consumer-1".to_string(),
                    buyer_name: "Priya".to_string(),
                    seller_id: "farmer-1".to_string(),
                    seller_name: "Ramesh".to_string(),
                    seller_category: SellerCategory::Farmer,
                    quantity: Decimal::new(10, 0),
                    unit: "kg".to_string(),
                    price_per_unit: Decimal::new(45, 0),
                },
                now - Duration::days(3),
            )
            .expect("valid order");
            orders.insert(order).await.expect("insert");
        }
        let scoring = service(
            Arc::new(InMemoryPriceHistoryRepository::default()),
            orders,
            Arc::new(InMemoryQualityCheckRepository::default()),
        );

        let karnataka = scoring
            .forecast_demand(Some("Karnataka"), Some("weekly"), now, "test")
            .await
            .expect("forecast");
        let everywhere =
            scoring.forecast_demand(Some("All India"), None, now, "test").await.expect("forecast");

        assert_eq!(karnataka.location, "Karnataka");
        assert_eq!(karnataka.period, ForecastPeriod::Weekly);
        assert_eq!(karnataka.summary.total_orders, 21);
        assert_eq!(karnataka.forecast[0].millet_type, "Finger Millet");
        assert_eq!(karnataka.forecast[0].demand_level, DemandLevel::High);
        assert_eq!(karnataka.forecast.len(), 8);
        assert_eq!(everywhere.location, "All India");
        assert_eq!(everywhere.period, ForecastPeriod::Monthly);
        assert_eq!(everywhere.summary.total_orders, 22);
    }

    struct FailingQualityLog;

    #[async_trait::async_trait]
    impl QualityCheckRepository for FailingQualityLog {
        async fn append(&self, _record: QualityCheckRecord) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn list_for_batch(
            &self,
            _batch_id: &BatchId,
        ) -> Result<Vec<QualityCheckRecord>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn quality_verdict_is_logged_and_survives_log_failure() {
        let measurements = BatchMeasurements {
            moisture_content: Some(15.0),
            impurity_level: Some(1.5),
            grain_size: Some(GrainSize::Uniform),
            color: Some(GrainColor::Natural),
            ..BatchMeasurements::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("timestamp");

        let logged = Arc::new(InMemoryQualityCheckRepository::default());
        let scoring = service(
            Arc::new(InMemoryPriceHistoryRepository::default()),
            Arc::new(InMemoryOrderRepository::default()),
            logged.clone(),
        );
        let record = scoring
            .check_quality(
                BatchId("BATCH-1".to_string()),
                "Foxtail Millet".to_string(),
                measurements.clone(),
                now,
                "test",
            )
            .await;
        assert_eq!(record.verdict.status, QualityStatus::Flagged);
        assert_eq!(record.verdict.score, 75);
        assert_eq!(
            scoring.quality_history(&BatchId("BATCH-1".to_string())).await.expect("history"),
            vec![record]
        );

        let failing = service(
            Arc::new(InMemoryPriceHistoryRepository::default()),
            Arc::new(InMemoryOrderRepository::default()),
            Arc::new(FailingQualityLog),
        );
        let unsaved = failing
            .check_quality(
                BatchId("BATCH-2".to_string()),
                "Foxtail Millet".to_string(),
                measurements,
                now,
                "test",
            )
            .await;
        assert!(!unsaved.verdict.approved);
    }
}
