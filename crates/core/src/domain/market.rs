use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderId};

/// Observed market price for a millet type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub product_type: String,
    pub region: Option<String>,
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: OrderId,
    pub payee_id: String,
    pub payer_id: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Pending payment owed by the buyer to the seller for a delivered order.
    pub fn pending_for(order: &Order, id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            order_id: order.id.clone(),
            payee_id: order.seller_id.clone(),
            payer_id: order.buyer_id.clone(),
            amount: order.total_price,
            status: PaymentStatus::Pending,
            created_at: now,
        }
    }
}
