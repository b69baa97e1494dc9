use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use crate::repositories::RepositoryError;

/// Fixed-width UTC timestamps so `created_at >= ?` compares lexicographically.
pub fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn encode_optional_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(encode_timestamp)
}

pub fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}

pub fn decode_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.as_deref().map(decode_timestamp).transpose()
}

pub fn decode_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}` (`{value}`): {error}"))
    })
}

pub fn get<T>(row: &SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|error| RepositoryError::Decode(error.to_string()))
}

pub fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = get(row, column)?;
    decode_timestamp(&raw)
}

pub fn get_optional_timestamp(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    decode_optional_timestamp(get(row, column)?)
}

pub fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = get(row, column)?;
    decode_decimal(column, &raw)
}
