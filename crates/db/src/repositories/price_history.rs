use rust_decimal::Decimal;
use sqlx::Row;

use milletchain_core::domain::market::PriceRecord;

use super::{PriceHistoryRepository, RepositoryError};
use crate::codec::{decode_decimal, encode_timestamp};
use crate::DbPool;

pub struct SqlPriceHistoryRepository {
    pool: DbPool,
}

impl SqlPriceHistoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PriceHistoryRepository for SqlPriceHistoryRepository {
    async fn recent_prices(
        &self,
        product_type: &str,
        limit: u32,
    ) -> Result<Vec<Decimal>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT price
             FROM price_history
             WHERE LOWER(product_type) = LOWER(?)
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?",
        )
        .bind(product_type.trim())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let raw: String =
                    row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                decode_decimal("price", &raw)
            })
            .collect()
    }

    async fn append(&self, record: PriceRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO price_history (product_type, region, price, recorded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.product_type)
        .bind(record.region.as_deref())
        .bind(record.price.to_string())
        .bind(encode_timestamp(record.recorded_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
