use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Placed,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "placed" => Ok(Self::Placed),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Marketplace participant roles. `Farmer` is the producer, `Shg` the
/// self-help-group processor and `Consumer` the buyer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Farmer,
    Shg,
    Consumer,
    Admin,
}

impl ActorRole {
    pub const ALL: [ActorRole; 4] =
        [ActorRole::Farmer, ActorRole::Shg, ActorRole::Consumer, ActorRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Shg => "shg",
            Self::Consumer => "consumer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Self::Farmer),
            "shg" => Ok(Self::Shg),
            "consumer" => Ok(Self::Consumer),
            "admin" => Ok(Self::Admin),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerCategory {
    Farmer,
    Shg,
}

impl SellerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Shg => "shg",
        }
    }
}

impl FromStr for SellerCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "farmer" => Ok(Self::Farmer),
            "shg" => Ok(Self::Shg),
            other => Err(DomainError::InvalidInput(format!(
                "unsupported seller category `{other}` (expected farmer|shg)"
            ))),
        }
    }
}

/// One entry of the append-only status history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub product_id: String,
    pub product_name: String,
    pub product_type: String,
    pub region: Option<String>,
    pub buyer_id: String,
    pub buyer_name: String,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_category: SellerCategory,
    pub quantity: Decimal,
    pub unit: String,
    pub price_per_unit: Decimal,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub processing_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub status_history: Vec<StatusChange>,
}

/// Input for placing a new order on behalf of a buyer.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceOrder {
    pub id: OrderId,
    pub product_id: String,
    pub product_name: String,
    pub product_type: String,
    pub region: Option<String>,
    pub buyer_id: String,
    pub buyer_name: String,
    pub seller_id: String,
    pub seller_name: String,
    pub seller_category: SellerCategory,
    pub quantity: Decimal,
    pub unit: String,
    pub price_per_unit: Decimal,
}

impl Order {
    /// Creates an order in the `placed` status with an empty history and
    /// `total_price = quantity * price_per_unit`.
    pub fn place(request: PlaceOrder, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let required = [
            ("id", request.id.0.as_str()),
            ("productId", request.product_id.as_str()),
            ("productType", request.product_type.as_str()),
            ("buyerId", request.buyer_id.as_str()),
            ("sellerId", request.seller_id.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(DomainError::InvalidInput(format!("order field `{field}` is required")));
        }
        if request.quantity <= Decimal::ZERO {
            return Err(DomainError::InvalidInput("order quantity must be positive".to_string()));
        }
        if request.price_per_unit <= Decimal::ZERO {
            return Err(DomainError::InvalidInput(
                "order price per unit must be positive".to_string(),
            ));
        }

        let total_price =
            request.quantity.checked_mul(request.price_per_unit).ok_or_else(|| {
                DomainError::InvalidInput("order total exceeds the supported range".to_string())
            })?;
        let unit = if request.unit.trim().is_empty() { "kg".to_string() } else { request.unit };

        Ok(Self {
            id: request.id,
            product_id: request.product_id,
            product_name: request.product_name,
            product_type: request.product_type,
            region: request.region.filter(|region| !region.trim().is_empty()),
            buyer_id: request.buyer_id,
            buyer_name: request.buyer_name,
            seller_id: request.seller_id,
            seller_name: request.seller_name,
            seller_category: request.seller_category,
            quantity: request.quantity,
            unit,
            price_per_unit: request.price_per_unit,
            total_price,
            status: OrderStatus::Placed,
            version: 1,
            created_at: now,
            updated_at: None,
            updated_by: None,
            confirmed_at: None,
            processing_at: None,
            shipped_at: None,
            delivered_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            status_history: Vec::new(),
        })
    }

    pub fn last_change(&self) -> Option<&StatusChange> {
        self.status_history.last()
    }

    /// Timestamp recorded when the order entered `status`, if any.
    pub fn status_timestamp(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        match status {
            OrderStatus::Placed => Some(self.created_at),
            OrderStatus::Confirmed => self.confirmed_at,
            OrderStatus::Processing => self.processing_at,
            OrderStatus::Shipped => self.shipped_at,
            OrderStatus::Delivered => self.delivered_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{ActorRole, Order, OrderId, OrderStatus, PlaceOrder, SellerCategory};
    use crate::errors::DomainError;

    fn request() -> PlaceOrder {
        PlaceOrder {
            id: OrderId("ORD-1".to_string()),
            product_id: "prod-ragi-flour".to_string(),
            product_name: "Organic Ragi Flour".to_string(),
            product_type: "Finger Millet".to_string(),
            region: Some("Karnataka".to_string()),
            buyer_id: "consumer-1".to_string(),
            buyer_name: "Priya".to_string(),
            seller_id: "shg-1".to_string(),
            seller_name: "Mahila SHG".to_string(),
            seller_category: SellerCategory::Shg,
            quantity: Decimal::new(125, 1),
            unit: "kg".to_string(),
            price_per_unit: Decimal::new(85, 0),
        }
    }

    #[test]
    fn placing_an_order_computes_total_and_starts_placed() {
        let order = Order::place(request(), Utc::now()).expect("valid order");

        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.total_price, Decimal::new(10625, 1));
        assert_eq!(order.version, 1);
        assert!(order.status_history.is_empty());
        assert_eq!(order.status_timestamp(OrderStatus::Placed), Some(order.created_at));
    }

    #[test]
    fn placing_rejects_non_positive_quantity() {
        let mut bad = request();
        bad.quantity = Decimal::ZERO;

        let error = Order::place(bad, Utc::now()).expect_err("zero quantity must fail");
        assert!(matches!(error, DomainError::InvalidInput(ref message) if message.contains("quantity")));
    }

    #[test]
    fn placing_rejects_totals_that_overflow() {
        let mut huge = request();
        huge.quantity = Decimal::MAX;

        let error = Order::place(huge, Utc::now()).expect_err("overflowing total must fail");
        assert!(matches!(error, DomainError::InvalidInput(ref message) if message.contains("total")));
    }

    #[test]
    fn placing_rejects_blank_buyer() {
        let mut bad = request();
        bad.buyer_id = "  ".to_string();

        let error = Order::place(bad, Utc::now()).expect_err("blank buyer must fail");
        assert!(matches!(error, DomainError::InvalidInput(ref message) if message.contains("buyerId")));
    }

    #[test]
    fn status_and_role_parsing_is_case_insensitive() {
        assert_eq!("Shipped".parse::<OrderStatus>().expect("status"), OrderStatus::Shipped);
        assert_eq!(" SHG ".parse::<ActorRole>().expect("role"), ActorRole::Shg);
        assert!(matches!(
            "refunded".parse::<OrderStatus>(),
            Err(DomainError::UnknownStatus(ref value)) if value == "refunded"
        ));
        assert!(matches!("buyer".parse::<ActorRole>(), Err(DomainError::UnknownRole(_))));
    }

    #[test]
    fn only_delivered_and_cancelled_are_terminal() {
        let terminal: Vec<_> =
            OrderStatus::ALL.iter().filter(|status| status.is_terminal()).collect();
        assert_eq!(terminal, vec![&OrderStatus::Delivered, &OrderStatus::Cancelled]);
    }
}
