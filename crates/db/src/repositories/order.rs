use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Sqlite, SqliteConnection};

use milletchain_core::domain::order::{
    ActorRole, Order, OrderId, OrderStatus, SellerCategory, StatusChange,
};

use super::{OrderRepository, RepositoryError};
use crate::codec::{
    encode_optional_timestamp, encode_timestamp, get, get_decimal, get_optional_timestamp,
    get_timestamp,
};
use crate::DbPool;

const ORDER_COLUMNS: &str = "id, product_id, product_name, product_type, region, buyer_id,
    buyer_name, seller_id, seller_name, seller_category, quantity, unit, price_per_unit,
    total_price, status, version, created_at, updated_at, updated_by, confirmed_at,
    processing_at, shipped_at, delivered_at, completed_at, cancelled_at, cancellation_reason";

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history_rows = sqlx::query(
            "SELECT order_id, sequence, status, actor_id, actor_role, reason, changed_at
             FROM order_status_history
             WHERE order_id = ?
             ORDER BY sequence ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut order = order_from_row(&row)?;
        order.status_history =
            history_rows.iter().map(status_change_from_row).collect::<Result<_, _>>()?;
        Ok(Some(order))
    }

    async fn insert(&self, order: Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO orders (
                id, product_id, product_name, product_type, region, buyer_id,
                buyer_name, seller_id, seller_name, seller_category, quantity, unit,
                price_per_unit, total_price, status, version, created_at, updated_at,
                updated_by, confirmed_at, processing_at, shipped_at, delivered_at,
                completed_at, cancelled_at, cancellation_reason
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.product_id)
        .bind(&order.product_name)
        .bind(&order.product_type)
        .bind(order.region.as_deref())
        .bind(&order.buyer_id)
        .bind(&order.buyer_name)
        .bind(&order.seller_id)
        .bind(&order.seller_name)
        .bind(order.seller_category.as_str())
        .bind(order.quantity.to_string())
        .bind(&order.unit)
        .bind(order.price_per_unit.to_string())
        .bind(order.total_price.to_string())
        .bind(order.status.as_str())
        .bind(i64::from(order.version))
        .bind(encode_timestamp(order.created_at))
        .bind(encode_optional_timestamp(order.updated_at))
        .bind(order.updated_by.as_deref())
        .bind(encode_optional_timestamp(order.confirmed_at))
        .bind(encode_optional_timestamp(order.processing_at))
        .bind(encode_optional_timestamp(order.shipped_at))
        .bind(encode_optional_timestamp(order.delivered_at))
        .bind(encode_optional_timestamp(order.completed_at))
        .bind(encode_optional_timestamp(order.cancelled_at))
        .bind(order.cancellation_reason.as_deref())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                return Err(RepositoryError::Duplicate { entity: "order", id: order.id.0 });
            }
            Err(error) => return Err(error.into()),
        }

        insert_history(&mut tx, &order, 0).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_if_version(
        &self,
        order: &Order,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET
                status = ?,
                version = ?,
                updated_at = ?,
                updated_by = ?,
                confirmed_at = ?,
                processing_at = ?,
                shipped_at = ?,
                delivered_at = ?,
                completed_at = ?,
                cancelled_at = ?,
                cancellation_reason = ?
             WHERE id = ? AND version = ?",
        )
        .bind(order.status.as_str())
        .bind(i64::from(order.version))
        .bind(encode_optional_timestamp(order.updated_at))
        .bind(order.updated_by.as_deref())
        .bind(encode_optional_timestamp(order.confirmed_at))
        .bind(encode_optional_timestamp(order.processing_at))
        .bind(encode_optional_timestamp(order.shipped_at))
        .bind(encode_optional_timestamp(order.delivered_at))
        .bind(encode_optional_timestamp(order.completed_at))
        .bind(encode_optional_timestamp(order.cancelled_at))
        .bind(order.cancellation_reason.as_deref())
        .bind(&order.id.0)
        .bind(i64::from(expected_version))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let stored: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = ?")
                .bind(&order.id.0)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            return Err(match stored {
                None => RepositoryError::NotFound { entity: "order", id: order.id.0.clone() },
                Some(actual) => RepositoryError::VersionConflict {
                    id: order.id.0.clone(),
                    expected: expected_version,
                    actual: decode_version(actual)?,
                },
            });
        }

        let stored_entries: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM order_status_history WHERE order_id = ?")
                .bind(&order.id.0)
                .fetch_one(&mut *tx)
                .await?;
        let already_stored = usize::try_from(stored_entries)
            .map_err(|_| RepositoryError::Decode(format!("negative history count {stored_entries}")))?;

        insert_history(&mut tx, order, already_stored).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_created_since(
        &self,
        since: DateTime<Utc>,
        region: Option<&str>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let since = encode_timestamp(since);

        let mut orders_query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE created_at >= "));
        orders_query.push_bind(since.clone());
        if let Some(region) = region {
            orders_query.push(" AND LOWER(region) = LOWER(").push_bind(region.trim()).push(")");
        }
        orders_query.push(" ORDER BY created_at ASC, id ASC");
        let rows = orders_query.build().fetch_all(&self.pool).await?;

        let mut history_query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT h.order_id, h.sequence, h.status, h.actor_id, h.actor_role, h.reason,
                    h.changed_at
             FROM order_status_history h
             JOIN orders o ON o.id = h.order_id
             WHERE o.created_at >= ",
        );
        history_query.push_bind(since);
        if let Some(region) = region {
            history_query.push(" AND LOWER(o.region) = LOWER(").push_bind(region.trim()).push(")");
        }
        history_query.push(" ORDER BY h.order_id ASC, h.sequence ASC");
        let history_rows = history_query.build().fetch_all(&self.pool).await?;

        let mut histories: HashMap<String, Vec<StatusChange>> = HashMap::new();
        for row in &history_rows {
            let order_id: String = get(row, "order_id")?;
            histories.entry(order_id).or_default().push(status_change_from_row(row)?);
        }

        rows.iter()
            .map(|row| {
                let mut order = order_from_row(row)?;
                order.status_history = histories.remove(&order.id.0).unwrap_or_default();
                Ok(order)
            })
            .collect()
    }
}

async fn insert_history(
    conn: &mut SqliteConnection,
    order: &Order,
    skip: usize,
) -> Result<(), RepositoryError> {
    for (index, change) in order.status_history.iter().enumerate().skip(skip) {
        let sequence = i64::try_from(index + 1)
            .map_err(|_| RepositoryError::Decode(format!("history sequence {index} overflows")))?;
        sqlx::query(
            "INSERT INTO order_status_history (
                order_id, sequence, status, actor_id, actor_role, reason, changed_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(sequence)
        .bind(change.status.as_str())
        .bind(&change.actor_id)
        .bind(change.actor_role.as_str())
        .bind(change.reason.as_deref())
        .bind(encode_timestamp(change.changed_at))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn decode_version(raw: i64) -> Result<u32, RepositoryError> {
    u32::try_from(raw).map_err(|_| RepositoryError::Decode(format!("invalid order version {raw}")))
}

fn order_from_row(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let id: String = get(row, "id")?;
    let status_raw: String = get(row, "status")?;
    let status = OrderStatus::from_str(&status_raw)
        .map_err(|_| RepositoryError::InvalidStatus { id: id.clone(), status: status_raw })?;
    let category_raw: String = get(row, "seller_category")?;
    let seller_category = SellerCategory::from_str(&category_raw)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(Order {
        id: OrderId(id),
        product_id: get(row, "product_id")?,
        product_name: get(row, "product_name")?,
        product_type: get(row, "product_type")?,
        region: get(row, "region")?,
        buyer_id: get(row, "buyer_id")?,
        buyer_name: get(row, "buyer_name")?,
        seller_id: get(row, "seller_id")?,
        seller_name: get(row, "seller_name")?,
        seller_category,
        quantity: get_decimal(row, "quantity")?,
        unit: get(row, "unit")?,
        price_per_unit: get_decimal(row, "price_per_unit")?,
        total_price: get_decimal(row, "total_price")?,
        status,
        version: decode_version(get(row, "version")?)?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_optional_timestamp(row, "updated_at")?,
        updated_by: get(row, "updated_by")?,
        confirmed_at: get_optional_timestamp(row, "confirmed_at")?,
        processing_at: get_optional_timestamp(row, "processing_at")?,
        shipped_at: get_optional_timestamp(row, "shipped_at")?,
        delivered_at: get_optional_timestamp(row, "delivered_at")?,
        completed_at: get_optional_timestamp(row, "completed_at")?,
        cancelled_at: get_optional_timestamp(row, "cancelled_at")?,
        cancellation_reason: get(row, "cancellation_reason")?,
        status_history: Vec::new(),
    })
}

fn status_change_from_row(row: &SqliteRow) -> Result<StatusChange, RepositoryError> {
    let order_id: String = get(row, "order_id")?;
    let status_raw: String = get(row, "status")?;
    let status = OrderStatus::from_str(&status_raw)
        .map_err(|_| RepositoryError::InvalidStatus { id: order_id, status: status_raw })?;
    let role_raw: String = get(row, "actor_role")?;
    let actor_role =
        ActorRole::from_str(&role_raw).map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(StatusChange {
        status,
        actor_id: get(row, "actor_id")?,
        actor_role,
        changed_at: get_timestamp(row, "changed_at")?,
        reason: get(row, "reason")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use milletchain_core::domain::order::{
        ActorRole, Order, OrderId, OrderStatus, PlaceOrder, SellerCategory,
    };
    use milletchain_core::orders::{OrderStateMachine, TransitionRequest};

    use super::SqlOrderRepository;
    use crate::repositories::{OrderRepository, RepositoryError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn placed(id: &str, region: Option<&str>, minutes_ago: i64) -> Order {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().expect("timestamp");
        Order::place(
            PlaceOrder {
                id: OrderId(id.to_string()),
                product_id: "prod-ragi".to_string(),
                product_name: "Organic Ragi".to_string(),
                product_type: "Finger Millet".to_string(),
                region: region.map(str::to_string),
                buyer_id: "buyer-1".to_string(),
                buyer_name: "Asha".to_string(),
                seller_id: "farmer-1".to_string(),
                seller_name: "Ravi".to_string(),
                seller_category: SellerCategory::Farmer,
                quantity: Decimal::new(25, 0),
                unit: "kg".to_string(),
                price_per_unit: Decimal::new(4550, 2),
            },
            now - Duration::minutes(minutes_ago),
        )
        .expect("valid order")
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let repo = SqlOrderRepository::new(setup().await);
        let order = placed("ORD-1", Some("Karnataka"), 0);

        repo.insert(order.clone()).await.expect("insert");
        let found = repo.find_by_id(&order.id).await.expect("find");

        assert_eq!(found, Some(order));
        assert_eq!(repo.find_by_id(&OrderId("missing".to_string())).await.expect("find"), None);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let repo = SqlOrderRepository::new(setup().await);
        let order = placed("ORD-1", None, 0);

        repo.insert(order.clone()).await.expect("insert");
        let error = repo.insert(order).await.expect_err("duplicate");

        assert!(matches!(error, RepositoryError::Duplicate { entity: "order", .. }));
    }

    #[tokio::test]
    async fn versioned_update_persists_transition_and_history() {
        let repo = SqlOrderRepository::new(setup().await);
        let machine = OrderStateMachine::default();
        let order = placed("ORD-1", None, 0);
        repo.insert(order.clone()).await.expect("insert");

        let outcome = machine
            .apply(
                &order,
                &TransitionRequest::new(OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer),
                order.created_at + Duration::minutes(5),
            )
            .expect("confirm");
        repo.update_if_version(&outcome.order, order.version).await.expect("update");

        let stored = repo.find_by_id(&order.id).await.expect("find").expect("present");
        assert_eq!(stored, outcome.order);
        assert_eq!(stored.version, 2);
        assert_eq!(stored.status_history.len(), 1);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict_and_writes_nothing() {
        let repo = SqlOrderRepository::new(setup().await);
        let machine = OrderStateMachine::default();
        let order = placed("ORD-1", None, 0);
        repo.insert(order.clone()).await.expect("insert");

        let confirm = machine
            .apply(
                &order,
                &TransitionRequest::new(OrderStatus::Confirmed, "farmer-1", ActorRole::Farmer),
                order.created_at,
            )
            .expect("confirm");
        let cancel = machine
            .apply(
                &order,
                &TransitionRequest::new(OrderStatus::Cancelled, "buyer-1", ActorRole::Consumer)
                    .with_reason("changed my mind"),
                order.created_at,
            )
            .expect("cancel");

        repo.update_if_version(&confirm.order, 1).await.expect("first writer wins");
        let error = repo.update_if_version(&cancel.order, 1).await.expect_err("second loses");

        assert!(matches!(
            error,
            RepositoryError::VersionConflict { expected: 1, actual: 2, .. }
        ));
        let stored = repo.find_by_id(&order.id).await.expect("find").expect("present");
        assert_eq!(stored.status, OrderStatus::Confirmed);
        assert_eq!(stored.status_history.len(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_order_is_not_found() {
        let repo = SqlOrderRepository::new(setup().await);
        let order = placed("ORD-404", None, 0);

        let error = repo.update_if_version(&order, 1).await.expect_err("missing");

        assert!(matches!(error, RepositoryError::NotFound { entity: "order", .. }));
    }

    #[tokio::test]
    async fn unknown_stored_status_surfaces_as_invalid_status() {
        let pool = setup().await;
        let repo = SqlOrderRepository::new(pool.clone());
        let order = placed("ORD-1", None, 0);
        repo.insert(order.clone()).await.expect("insert");
        sqlx::query("UPDATE orders SET status = 'archived' WHERE id = ?")
            .bind(&order.id.0)
            .execute(&pool)
            .await
            .expect("corrupt status");

        let error = repo.find_by_id(&order.id).await.expect_err("undecodable");

        assert!(matches!(error, RepositoryError::InvalidStatus { ref status, .. } if status == "archived"));
    }

    #[tokio::test]
    async fn list_created_since_filters_by_window_and_region() {
        let repo = SqlOrderRepository::new(setup().await);
        repo.insert(placed("ORD-OLD", Some("Karnataka"), 60 * 24 * 40)).await.expect("insert");
        repo.insert(placed("ORD-KA", Some("Karnataka"), 60)).await.expect("insert");
        repo.insert(placed("ORD-TN", Some("Tamil Nadu"), 30)).await.expect("insert");

        let since = Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).single().expect("timestamp");
        let all = repo.list_created_since(since, None).await.expect("list");
        let karnataka = repo.list_created_since(since, Some("karnataka")).await.expect("list");

        let ids = all.iter().map(|order| order.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["ORD-KA", "ORD-TN"]);
        assert_eq!(karnataka.len(), 1);
        assert_eq!(karnataka[0].id.0, "ORD-KA");
    }
}
