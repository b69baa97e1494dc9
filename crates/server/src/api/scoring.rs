use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use milletchain_core::domain::batch::{BatchId, BatchMeasurements, QualityCheckRecord};
use milletchain_core::errors::ApplicationError;
use milletchain_core::scoring::{DemandForecast, PriceQuery, PriceSuggestion, QualityTier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{correlation_id, json_body, present, ApiError, AppState};

const PRICE_REQUIRED: [&str; 3] = ["milletType", "quantity", "location"];
const QUALITY_REQUIRED: [&str; 2] = ["batchId", "milletType"];

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestionRequest {
    #[serde(alias = "productType")]
    pub millet_type: Option<String>,
    pub quantity: Option<Decimal>,
    pub location: Option<String>,
    pub quality: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ForecastParams {
    pub location: Option<String>,
    pub period: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheckRequest {
    pub batch_id: Option<String>,
    #[serde(alias = "productType")]
    pub millet_type: Option<String>,
    #[serde(flatten)]
    pub measurements: BatchMeasurements,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSuggestionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub suggestion: PriceSuggestion,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandForecastResponse {
    pub success: bool,
    #[serde(flatten)]
    pub forecast: DemandForecast,
    pub generated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QualityCheckResponse {
    pub success: bool,
    #[serde(flatten)]
    pub record: QualityCheckRecord,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityHistoryResponse {
    pub success: bool,
    pub batch_id: BatchId,
    pub checks: Vec<QualityCheckRecord>,
}

pub async fn price_suggestion(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PriceSuggestionRequest>, JsonRejection>,
) -> Result<Json<PriceSuggestionResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let body = json_body(payload, &correlation_id)?;
    let quantity = match body.quantity {
        Some(quantity) if present(&body.millet_type) && present(&body.location) => quantity,
        _ => {
            return Err(ApiError::from_application(
                ApplicationError::missing_fields(&PRICE_REQUIRED),
                &correlation_id,
            ))
        }
    };

    let query = PriceQuery {
        product_type: body.millet_type.unwrap_or_default().trim().to_string(),
        quantity,
        location: body.location.unwrap_or_default().trim().to_string(),
        quality: QualityTier::parse_or_standard(body.quality.as_deref()),
    };
    let suggestion = state
        .scoring
        .suggest_price(query, &correlation_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok(Json(PriceSuggestionResponse { success: true, suggestion, generated_at: Utc::now() }))
}

pub async fn demand_forecast(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ForecastParams>,
) -> Result<Json<DemandForecastResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let now = Utc::now();
    let forecast = state
        .scoring
        .forecast_demand(params.location.as_deref(), params.period.as_deref(), now, &correlation_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok(Json(DemandForecastResponse { success: true, forecast, generated_at: now }))
}

pub async fn quality_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<QualityCheckRequest>, JsonRejection>,
) -> Result<Json<QualityCheckResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let body = json_body(payload, &correlation_id)?;
    if !(present(&body.batch_id) && present(&body.millet_type)) {
        return Err(ApiError::from_application(
            ApplicationError::missing_fields(&QUALITY_REQUIRED),
            &correlation_id,
        ));
    }

    let record = state
        .scoring
        .check_quality(
            BatchId(body.batch_id.unwrap_or_default().trim().to_string()),
            body.millet_type.unwrap_or_default().trim().to_string(),
            body.measurements,
            Utc::now(),
            &correlation_id,
        )
        .await;

    Ok(Json(QualityCheckResponse { success: true, record }))
}

pub async fn quality_checks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(batch_id): Path<String>,
) -> Result<Json<QualityHistoryResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let batch_id = BatchId(batch_id);
    let checks = state
        .scoring
        .quality_history(&batch_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    Ok(Json(QualityHistoryResponse { success: true, batch_id, checks }))
}
