use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use tokio::runtime::Handle;
use tracing::warn;

use milletchain_core::domain::order::{OrderId, OrderStatus};
use milletchain_core::notifications::{Notification, NotificationKind, NotificationSink};

use super::RepositoryError;
use crate::codec::{encode_timestamp, get, get_timestamp};
use crate::DbPool;

/// Notification sink backed by the `notifications` table. `emit` hands the
/// insert to the current tokio runtime and returns immediately.
#[derive(Clone)]
pub struct SqlNotificationSink {
    pool: DbPool,
}

impl SqlNotificationSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn store(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notifications (id, kind, order_id, user_id, status, message, read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&notification.id)
        .bind(notification.kind.as_str())
        .bind(&notification.order_id.0)
        .bind(&notification.user_id)
        .bind(notification.status.as_str())
        .bind(&notification.message)
        .bind(notification.read)
        .bind(encode_timestamp(notification.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, kind, order_id, user_id, status, message, read, created_at
             FROM notifications
             WHERE user_id = ?
             ORDER BY created_at DESC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }
}

impl NotificationSink for SqlNotificationSink {
    fn emit(&self, notification: Notification) {
        let Ok(handle) = Handle::try_current() else {
            warn!(
                event_name = "order.notification.failed",
                order_id = %notification.order_id,
                "no async runtime available to deliver notification"
            );
            return;
        };

        let sink = self.clone();
        handle.spawn(async move {
            if let Err(error) = sink.store(&notification).await {
                warn!(
                    event_name = "order.notification.failed",
                    order_id = %notification.order_id,
                    user_id = %notification.user_id,
                    error = %error,
                    "failed to store order notification"
                );
            }
        });
    }
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let kind_raw: String = get(row, "kind")?;
    let kind = match kind_raw.as_str() {
        "order_update" => NotificationKind::OrderUpdate,
        other => {
            return Err(RepositoryError::Decode(format!("unknown notification kind `{other}`")))
        }
    };
    let order_id: String = get(row, "order_id")?;
    let status_raw: String = get(row, "status")?;
    let status = OrderStatus::from_str(&status_raw)
        .map_err(|_| RepositoryError::InvalidStatus { id: order_id.clone(), status: status_raw })?;

    Ok(Notification {
        id: get(row, "id")?,
        kind,
        order_id: OrderId(order_id),
        user_id: get(row, "user_id")?,
        status,
        message: get(row, "message")?,
        read: get(row, "read")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use milletchain_core::domain::order::{OrderId, OrderStatus};
    use milletchain_core::notifications::{Notification, NotificationKind, NotificationSink};

    use super::SqlNotificationSink;
    use crate::{connect_with_settings, migrations};

    fn notification(id: &str, status: OrderStatus) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationKind::OrderUpdate,
            order_id: OrderId("ORD-1".to_string()),
            user_id: "buyer-1".to_string(),
            status,
            message: format!("Your order #ORD-1 is now {status}"),
            read: false,
            created_at: Utc.with_ymd_and_hms(2026, 3, 3, 8, 0, 0).single().expect("timestamp"),
        }
    }

    #[tokio::test]
    async fn emitted_notifications_are_stored_in_the_background() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let sink = SqlNotificationSink::new(pool);

        sink.emit(notification("n-1", OrderStatus::Confirmed));

        let mut stored = Vec::new();
        for _ in 0..50 {
            stored = sink.list_for_user("buyer-1").await.expect("list");
            if !stored.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(stored, vec![notification("n-1", OrderStatus::Confirmed)]);
    }

    #[tokio::test]
    async fn duplicate_ids_fail_without_reaching_the_caller() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let sink = SqlNotificationSink::new(pool);

        sink.store(&notification("n-1", OrderStatus::Confirmed)).await.expect("store");
        assert!(sink.store(&notification("n-1", OrderStatus::Shipped)).await.is_err());

        sink.emit(notification("n-1", OrderStatus::Shipped));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stored = sink.list_for_user("buyer-1").await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, OrderStatus::Confirmed);
    }
}
