use sqlx::sqlite::SqliteRow;

use milletchain_core::domain::market::{Payment, PaymentStatus};
use milletchain_core::domain::order::OrderId;

use super::{PaymentRepository, RepositoryError};
use crate::codec::{encode_timestamp, get, get_decimal, get_timestamp};
use crate::DbPool;

pub struct SqlPaymentRepository {
    pool: DbPool,
}

impl SqlPaymentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PaymentRepository for SqlPaymentRepository {
    async fn record_if_absent(&self, payment: Payment) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO payments (id, order_id, payee_id, payer_id, amount, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(order_id) DO NOTHING",
        )
        .bind(&payment.id)
        .bind(&payment.order_id.0)
        .bind(&payment.payee_id)
        .bind(&payment.payer_id)
        .bind(payment.amount.to_string())
        .bind(payment.status.as_str())
        .bind(encode_timestamp(payment.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, order_id, payee_id, payer_id, amount, status, created_at
             FROM payments
             WHERE order_id = ?",
        )
        .bind(&order_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }
}

fn payment_from_row(row: &SqliteRow) -> Result<Payment, RepositoryError> {
    let status_raw: String = get(row, "status")?;
    let status = PaymentStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown payment status `{status_raw}`")))?;

    Ok(Payment {
        id: get(row, "id")?,
        order_id: OrderId(get(row, "order_id")?),
        payee_id: get(row, "payee_id")?,
        payer_id: get(row, "payer_id")?,
        amount: get_decimal(row, "amount")?,
        status,
        created_at: get_timestamp(row, "created_at")?,
    })
}
