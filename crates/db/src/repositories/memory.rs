use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use milletchain_core::domain::batch::{BatchId, QualityCheckRecord};
use milletchain_core::domain::market::{Payment, PriceRecord};
use milletchain_core::domain::order::{Order, OrderId};

use super::{
    OrderRepository, PaymentRepository, PriceHistoryRepository, QualityCheckRepository,
    RepositoryError,
};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn insert(&self, order: Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id.0) {
            return Err(RepositoryError::Duplicate { entity: "order", id: order.id.0 });
        }
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    async fn update_if_version(
        &self,
        order: &Order,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let Some(stored) = orders.get_mut(&order.id.0) else {
            return Err(RepositoryError::NotFound { entity: "order", id: order.id.0.clone() });
        };
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                id: order.id.0.clone(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = order.clone();
        Ok(())
    }

    async fn list_created_since(
        &self,
        since: DateTime<Utc>,
        region: Option<&str>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let region = region.map(|value| value.trim().to_lowercase());
        let mut matching = orders
            .values()
            .filter(|order| order.created_at >= since)
            .filter(|order| match &region {
                Some(wanted) => order
                    .region
                    .as_deref()
                    .is_some_and(|value| value.trim().to_lowercase() == *wanted),
                None => true,
            })
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryPriceHistoryRepository {
    records: RwLock<Vec<PriceRecord>>,
}

#[async_trait::async_trait]
impl PriceHistoryRepository for InMemoryPriceHistoryRepository {
    async fn recent_prices(
        &self,
        product_type: &str,
        limit: u32,
    ) -> Result<Vec<Decimal>, RepositoryError> {
        let records = self.records.read().await;
        let wanted = product_type.trim().to_lowercase();
        let mut matching = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.product_type.to_lowercase() == wanted)
            .collect::<Vec<_>>();
        matching.sort_by(|(ia, a), (ib, b)| b.recorded_at.cmp(&a.recorded_at).then(ib.cmp(ia)));
        Ok(matching
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, record)| record.price)
            .collect())
    }

    async fn append(&self, record: PriceRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.push(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryQualityCheckRepository {
    records: RwLock<Vec<QualityCheckRecord>>,
}

#[async_trait::async_trait]
impl QualityCheckRepository for InMemoryQualityCheckRepository {
    async fn append(&self, record: QualityCheckRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Duplicate { entity: "quality check", id: record.id });
        }
        records.push(record);
        Ok(())
    }

    async fn list_for_batch(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<QualityCheckRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching = records
            .iter()
            .filter(|record| record.batch_id == *batch_id)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| {
            a.verdict.checked_at.cmp(&b.verdict.checked_at).then_with(|| a.id.cmp(&b.id))
        });
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    payments: RwLock<HashMap<String, Payment>>,
}

#[async_trait::async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn record_if_absent(&self, payment: Payment) -> Result<bool, RepositoryError> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.order_id.0) {
            return Ok(false);
        }
        payments.insert(payment.order_id.0.clone(), payment);
        Ok(true)
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Option<Payment>, RepositoryError> {
        let payments = self.payments.read().await;
        Ok(payments.get(&order_id.0).cloned())
    }
}
