use sqlx::sqlite::SqliteRow;

use milletchain_core::domain::batch::{
    BatchId, BatchMeasurements, QualityCheckRecord, QualityFinding, QualityStatus, QualityVerdict,
};

use super::{QualityCheckRepository, RepositoryError};
use crate::codec::{encode_timestamp, get, get_timestamp};
use crate::DbPool;

pub struct SqlQualityCheckRepository {
    pool: DbPool,
}

impl SqlQualityCheckRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QualityCheckRepository for SqlQualityCheckRepository {
    async fn append(&self, record: QualityCheckRecord) -> Result<(), RepositoryError> {
        let measurements_json = encode_json(&record.measurements)?;
        let issues_json = encode_json(&record.verdict.issues)?;
        let warnings_json = encode_json(&record.verdict.warnings)?;

        sqlx::query(
            "INSERT INTO quality_checks (
                id, batch_id, product_type, measurements_json, issues_json, warnings_json,
                status, approved, score, recommendation, checked_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.batch_id.0)
        .bind(&record.product_type)
        .bind(measurements_json)
        .bind(issues_json)
        .bind(warnings_json)
        .bind(record.verdict.status.as_str())
        .bind(record.verdict.approved)
        .bind(i64::from(record.verdict.score))
        .bind(&record.verdict.recommendation)
        .bind(encode_timestamp(record.verdict.checked_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_batch(
        &self,
        batch_id: &BatchId,
    ) -> Result<Vec<QualityCheckRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                batch_id,
                product_type,
                measurements_json,
                issues_json,
                warnings_json,
                status,
                approved,
                score,
                recommendation,
                checked_at
             FROM quality_checks
             WHERE batch_id = ?
             ORDER BY checked_at ASC, id ASC",
        )
        .bind(&batch_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> Result<T, RepositoryError> {
    let raw: String = get(row, column)?;
    serde_json::from_str(&raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid JSON in `{column}`: {error}")))
}

fn record_from_row(row: &SqliteRow) -> Result<QualityCheckRecord, RepositoryError> {
    let status_raw: String = get(row, "status")?;
    let status = QualityStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown quality status `{status_raw}`"))
    })?;
    let score: i64 = get(row, "score")?;
    let score = u8::try_from(score)
        .map_err(|_| RepositoryError::Decode(format!("quality score {score} out of range")))?;

    Ok(QualityCheckRecord {
        id: get(row, "id")?,
        batch_id: BatchId(get(row, "batch_id")?),
        product_type: get(row, "product_type")?,
        measurements: decode_json::<BatchMeasurements>(row, "measurements_json")?,
        verdict: QualityVerdict {
            issues: decode_json::<Vec<QualityFinding>>(row, "issues_json")?,
            warnings: decode_json::<Vec<QualityFinding>>(row, "warnings_json")?,
            status,
            approved: get(row, "approved")?,
            score,
            recommendation: get(row, "recommendation")?,
            checked_at: get_timestamp(row, "checked_at")?,
        },
    })
}
