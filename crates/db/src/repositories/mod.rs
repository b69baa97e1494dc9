use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use milletchain_core::domain::batch::{BatchId, QualityCheckRecord};
use milletchain_core::domain::market::{Payment, PriceRecord};
use milletchain_core::domain::order::{Order, OrderId};
use milletchain_core::errors::ApplicationError;

pub mod memory;
pub mod notification;
pub mod order;
pub mod payment;
pub mod price_history;
pub mod quality_check;

pub use memory::{
    InMemoryOrderRepository, InMemoryPaymentRepository, InMemoryPriceHistoryRepository,
    InMemoryQualityCheckRepository,
};
pub use notification::SqlNotificationSink;
pub use order::SqlOrderRepository;
pub use payment::SqlPaymentRepository;
pub use price_history::SqlPriceHistoryRepository;
pub use quality_check::SqlQualityCheckRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} `{id}` already exists")]
    Duplicate { entity: &'static str, id: String },
    #[error("order `{id}` version mismatch (expected {expected}, stored {actual})")]
    VersionConflict { id: String, expected: u32, actual: u32 },
    #[error("order `{id}` has unrecognised stored status `{status}`")]
    InvalidStatus { id: String, status: String },
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::Duplicate { entity, id } => Self::AlreadyExists { entity, id },
            RepositoryError::VersionConflict { id, expected, actual } => {
                Self::ConcurrencyConflict { id, expected, actual }
            }
            RepositoryError::InvalidStatus { id, status } => {
                Self::InvalidState { entity: "order", id, status }
            }
            RepositoryError::Database(error) => Self::Persistence(error.to_string()),
            RepositoryError::Decode(message) => Self::Persistence(message),
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Stores a freshly placed order. Fails with `Duplicate` if the id is taken.
    async fn insert(&self, order: Order) -> Result<(), RepositoryError>;

    /// Writes `order` only if the stored version still equals
    /// `expected_version`; otherwise nothing is written and `VersionConflict`
    /// reports the version found.
    async fn update_if_version(
        &self,
        order: &Order,
        expected_version: u32,
    ) -> Result<(), RepositoryError>;

    /// Orders created at or after `since`, oldest first, optionally limited to
    /// one region (case-insensitive).
    async fn list_created_since(
        &self,
        since: DateTime<Utc>,
        region: Option<&str>,
    ) -> Result<Vec<Order>, RepositoryError>;
}

#[async_trait]
pub trait PriceHistoryRepository: Send + Sync {
    /// Most recent prices for a product type, newest first.
    async fn recent_prices(
        &self,
        product_type: &str,
        limit: u32,
    ) -> Result<Vec<Decimal>, RepositoryError>;

    async fn append(&self, record: PriceRecord) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QualityCheckRepository: Send + Sync {
    async fn append(&self, record: QualityCheckRecord) -> Result<(), RepositoryError>;

    async fn list_for_batch(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<QualityCheckRecord>, RepositoryError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Returns `true` when a new payment was stored, `false` when the order
    /// already had one.
    async fn record_if_absent(&self, payment: Payment) -> Result<bool, RepositoryError>;

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Option<Payment>, RepositoryError>;
}
