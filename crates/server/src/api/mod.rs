//! HTTP surface: order workflow and scoring endpoints plus the shared error
//! envelope.

pub mod orders;
pub mod scoring;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use milletchain_core::errors::{ApplicationError, InterfaceError};
use milletchain_db::DbPool;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::health;
use crate::services::{OrderWorkflow, ScoringService};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderWorkflow>,
    pub scoring: Arc<ScoringService>,
}

pub fn router(state: AppState, db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/orders", post(orders::place_order))
        .route("/api/orders/update-status", post(orders::update_status))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/ai/price-suggestion", post(scoring::price_suggestion))
        .route("/api/ai/demand-forecast", get(scoring::demand_forecast))
        .route("/api/ai/quality-check", post(scoring::quality_check))
        .route("/api/ai/quality-checks/{batch_id}", get(scoring::quality_checks))
        .with_state(state)
        .merge(health::router(db_pool))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Uses the caller's `x-correlation-id` when present, otherwise mints one.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Unwraps a JSON body or turns the rejection into the standard 400 envelope.
pub fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        ApiError::from_application(
            ApplicationError::validation(format!("invalid request body: {}", rejection.body_text())),
            correlation_id,
        )
    })
}

/// Blank strings count as missing.
pub fn present(value: &Option<String>) -> bool {
    value.as_deref().map(|raw| !raw.trim().is_empty()).unwrap_or(false)
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub user_message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    pub correlation_id: String,
}

impl From<&InterfaceError> for ErrorBody {
    fn from(error: &InterfaceError) -> Self {
        Self {
            success: false,
            error: error.client_message().to_string(),
            user_message: error.user_message().to_string(),
            required: error.required().to_vec(),
            correlation_id: error.correlation_id().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}
