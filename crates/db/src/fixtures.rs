use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use milletchain_core::domain::batch::{
    BatchId, BatchMeasurements, GrainColor, GrainSize, QualityCheckRecord,
};
use milletchain_core::domain::market::Payment;
use milletchain_core::domain::order::{
    ActorRole, Order, OrderId, OrderStatus, PlaceOrder, SellerCategory,
};
use milletchain_core::errors::DomainError;
use milletchain_core::orders::{OrderStateMachine, TransitionRequest};
use milletchain_core::scoring::{QualityInspector, QualityThresholds};

use crate::codec::encode_timestamp;
use crate::connection::DbPool;
use crate::repositories::{
    OrderRepository, PaymentRepository, QualityCheckRepository, RepositoryError,
    SqlOrderRepository, SqlPaymentRepository, SqlQualityCheckRepository,
};

/// Deterministic demo orders: one per lifecycle stage worth showing.
const SEED_ORDERS: &[SeedOrderContract] = &[
    SeedOrderContract {
        order_id: "order-seed-001",
        product_type: "Finger Millet",
        product_name: "Organic Ragi",
        region: "Karnataka",
        buyer: ("consumer-1", "Priya Singh"),
        seller: ("farmer-1", "Ramesh Kumar", SellerCategory::Farmer),
        quantity_kg: 25,
        price_per_kg: 48,
        days_ago: 2,
        path: &[],
        description: "Fresh order awaiting seller confirmation",
    },
    SeedOrderContract {
        order_id: "order-seed-002",
        product_type: "Foxtail Millet",
        product_name: "Foxtail Millet Flakes",
        region: "Karnataka",
        buyer: ("consumer-2", "Amit Verma"),
        seller: ("shg-1", "Mahila SHG", SellerCategory::Shg),
        quantity_kg: 120,
        price_per_kg: 58,
        days_ago: 6,
        path: &[
            (OrderStatus::Confirmed, "shg-1", ActorRole::Shg),
            (OrderStatus::Processing, "shg-1", ActorRole::Shg),
            (OrderStatus::Shipped, "shg-1", ActorRole::Shg),
        ],
        description: "Bulk order in transit",
    },
    SeedOrderContract {
        order_id: "order-seed-003",
        product_type: "Little Millet",
        product_name: "Little Millet Rice",
        region: "Tamil Nadu",
        buyer: ("consumer-1", "Priya Singh"),
        seller: ("shg-2", "Green Valley SHG", SellerCategory::Shg),
        quantity_kg: 10,
        price_per_kg: 52,
        days_ago: 12,
        path: &[
            (OrderStatus::Confirmed, "shg-2", ActorRole::Shg),
            (OrderStatus::Processing, "shg-2", ActorRole::Shg),
            (OrderStatus::Shipped, "shg-2", ActorRole::Shg),
            (OrderStatus::Delivered, "consumer-1", ActorRole::Consumer),
        ],
        description: "Delivered order with a pending seller payment",
    },
    SeedOrderContract {
        order_id: "order-seed-004",
        product_type: "Pearl Millet",
        product_name: "Bajra Grain",
        region: "Maharashtra",
        buyer: ("consumer-2", "Amit Verma"),
        seller: ("farmer-2", "Suresh Patil", SellerCategory::Farmer),
        quantity_kg: 40,
        price_per_kg: 41,
        days_ago: 20,
        path: &[(OrderStatus::Cancelled, "consumer-2", ActorRole::Consumer)],
        description: "Order cancelled by the buyer",
    },
];

/// (product type, region, prices in rupees per kg oldest first)
const SEED_PRICES: &[(&str, &str, &[i64])] = &[
    ("Finger Millet", "Karnataka", &[44, 46, 47]),
    ("Foxtail Millet", "Karnataka", &[56, 57, 58]),
    ("Pearl Millet", "Maharashtra", &[38, 39, 41]),
    ("Little Millet", "Tamil Nadu", &[50, 51, 53]),
];

const SEED_QUALITY_CHECK_ID: &str = "qc-seed-001";
const SEED_BATCH_ID: &str = "BATCH-SEED-001";

const SEED_CANCELLATION_REASON: &str = "Ordered the wrong variety";

pub struct MarketSeedDataset;

impl MarketSeedDataset {
    /// Loads the demo marketplace relative to `now`. Records that already
    /// exist are left untouched, so loading twice is harmless.
    pub async fn load(pool: &DbPool, now: DateTime<Utc>) -> Result<SeedResult, RepositoryError> {
        let orders = SqlOrderRepository::new(pool.clone());
        let payments = SqlPaymentRepository::new(pool.clone());
        let quality = SqlQualityCheckRepository::new(pool.clone());
        let machine = OrderStateMachine::default();

        let mut orders_seeded = Vec::new();
        for contract in SEED_ORDERS {
            let id = OrderId(contract.order_id.to_string());
            if orders.find_by_id(&id).await?.is_none() {
                let placed = contract.build(&machine, now).map_err(|error| {
                    RepositoryError::Decode(format!("seed order {}: {error}", contract.order_id))
                })?;
                orders.insert(placed.clone()).await?;
                if placed.status == OrderStatus::Delivered {
                    let payment_id = format!("payment-{}", contract.order_id);
                    let created_at = placed.delivered_at.unwrap_or(now);
                    payments
                        .record_if_absent(Payment::pending_for(&placed, payment_id, created_at))
                        .await?;
                }
            }
            orders_seeded.push(OrderSeedInfo {
                order_id: contract.order_id,
                final_status: contract.final_status(),
                description: contract.description,
            });
        }

        let mut prices_seeded = 0;
        for (product_type, region, prices) in SEED_PRICES {
            for (index, price) in prices.iter().enumerate() {
                let days_back = i64::try_from(prices.len() - index).unwrap_or(i64::MAX);
                let recorded_at = encode_timestamp(now - Duration::days(days_back));
                let inserted = sqlx::query(
                    "INSERT INTO price_history (product_type, region, price, recorded_at)
                     SELECT ?1, ?2, ?3, ?4
                     WHERE NOT EXISTS (
                        SELECT 1 FROM price_history
                        WHERE product_type = ?1 AND region = ?2 AND price = ?3
                     )",
                )
                .bind(*product_type)
                .bind(*region)
                .bind(Decimal::from(*price).to_string())
                .bind(recorded_at)
                .execute(pool)
                .await?;
                prices_seeded += inserted.rows_affected();
            }
        }

        let batch_id = BatchId(SEED_BATCH_ID.to_string());
        let existing = quality.list_for_batch(&batch_id).await?;
        if !existing.iter().any(|record| record.id == SEED_QUALITY_CHECK_ID) {
            let measurements = BatchMeasurements {
                moisture_content: Some(12.5),
                impurity_level: Some(0.8),
                grain_size: Some(GrainSize::Uniform),
                color: Some(GrainColor::Natural),
                weight: Some(98.0),
                expected_weight: Some(100.0),
            };
            let verdict = QualityInspector::new(QualityThresholds::default())
                .inspect(&measurements, now - Duration::days(1));
            quality
                .append(QualityCheckRecord {
                    id: SEED_QUALITY_CHECK_ID.to_string(),
                    batch_id,
                    product_type: "Finger Millet".to_string(),
                    measurements,
                    verdict,
                })
                .await?;
        }

        Ok(SeedResult { orders_seeded, prices_seeded })
    }

    /// Checks that every seeded record is present with its expected state.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let orders = SqlOrderRepository::new(pool.clone());
        let payments = SqlPaymentRepository::new(pool.clone());
        let mut checks = Vec::new();

        for contract in SEED_ORDERS {
            let id = OrderId(contract.order_id.to_string());
            let stored = orders.find_by_id(&id).await?;
            let status_ok = stored.as_ref().is_some_and(|order| {
                order.status == contract.final_status()
                    && order.status_history.len() == contract.path.len()
            });
            checks.push((contract.order_id, status_ok));

            if contract.final_status() == OrderStatus::Delivered {
                let paid = payments.find_by_order(&id).await?.is_some();
                checks.push(("delivered-order-payment", paid));
            }
        }

        let price_rows: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM price_history")
            .fetch_one(pool)
            .await?;
        let expected_prices = SEED_PRICES.iter().map(|(_, _, prices)| prices.len()).sum::<usize>();
        checks.push((
            "price-history",
            usize::try_from(price_rows).is_ok_and(|rows| rows >= expected_prices),
        ));

        let quality_present: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quality_checks WHERE id = ?1)")
                .bind(SEED_QUALITY_CHECK_ID)
                .fetch_one(pool)
                .await?;
        checks.push(("quality-check", quality_present == 1));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedOrderContract {
    order_id: &'static str,
    product_type: &'static str,
    product_name: &'static str,
    region: &'static str,
    buyer: (&'static str, &'static str),
    seller: (&'static str, &'static str, SellerCategory),
    quantity_kg: i64,
    price_per_kg: i64,
    days_ago: i64,
    path: &'static [(OrderStatus, &'static str, ActorRole)],
    description: &'static str,
}

impl SeedOrderContract {
    fn final_status(&self) -> OrderStatus {
        self.path.last().map(|(status, _, _)| *status).unwrap_or(OrderStatus::Placed)
    }

    fn build(&self, machine: &OrderStateMachine, now: DateTime<Utc>) -> Result<Order, DomainError> {
        let placed_at = now - Duration::days(self.days_ago);
        let mut order = Order::place(
            PlaceOrder {
                id: OrderId(self.order_id.to_string()),
                product_id: format!("product-{}", self.order_id),
                product_name: self.product_name.to_string(),
                product_type: self.product_type.to_string(),
                region: Some(self.region.to_string()),
                buyer_id: self.buyer.0.to_string(),
                buyer_name: self.buyer.1.to_string(),
                seller_id: self.seller.0.to_string(),
                seller_name: self.seller.1.to_string(),
                seller_category: self.seller.2,
                quantity: Decimal::from(self.quantity_kg),
                unit: "kg".to_string(),
                price_per_unit: Decimal::from(self.price_per_kg),
            },
            placed_at,
        )?;

        for (step, (status, actor_id, role)) in self.path.iter().enumerate() {
            let mut request = TransitionRequest::new(*status, *actor_id, *role);
            if *status == OrderStatus::Cancelled {
                request = request.with_reason(SEED_CANCELLATION_REASON);
            }
            let hours = i64::try_from(step + 1).unwrap_or(i64::MAX) * 6;
            order = machine.apply(&order, &request, placed_at + Duration::hours(hours))?.order;
        }

        Ok(order)
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub orders_seeded: Vec<OrderSeedInfo>,
    pub prices_seeded: u64,
}

#[derive(Debug)]
pub struct OrderSeedInfo {
    pub order_id: &'static str,
    pub final_status: OrderStatus,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
