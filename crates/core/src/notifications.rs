use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{Order, OrderId, OrderStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderUpdate => "order_update",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub order_id: OrderId,
    pub user_id: String,
    pub status: OrderStatus,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Buyer-facing notice that `order` moved to its current status.
    pub fn status_changed(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: NotificationKind::OrderUpdate,
            order_id: order.id.clone(),
            user_id: order.buyer_id.clone(),
            status: order.status,
            message: format!("Your order #{} is now {}", order.id, order.status),
            read: false,
            created_at: now,
        }
    }
}

/// Fire-and-forget delivery of user notifications. Implementations must not
/// block the caller and must swallow (and log) their own failures.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: Notification);
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn notifications(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(notifications) => notifications.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn emit(&self, notification: Notification) {
        match self.notifications.lock() {
            Ok(mut notifications) => notifications.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
