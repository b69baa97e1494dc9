use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use milletchain_core::domain::order::{
    ActorRole, Order, OrderId, OrderStatus, PlaceOrder, SellerCategory,
};
use milletchain_core::errors::ApplicationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{correlation_id, json_body, present, ApiError, AppState};
use crate::services::UpdateStatusCommand;

const PLACE_REQUIRED: [&str; 8] = [
    "productId",
    "productType",
    "buyerId",
    "sellerId",
    "sellerCategory",
    "quantity",
    "pricePerUnit",
    "userRole",
];
const UPDATE_REQUIRED: [&str; 4] = ["orderId", "newStatus", "userId", "userRole"];

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    #[serde(alias = "milletType")]
    pub product_type: Option<String>,
    pub region: Option<String>,
    pub buyer_id: Option<String>,
    pub buyer_name: Option<String>,
    pub seller_id: Option<String>,
    pub seller_name: Option<String>,
    pub seller_category: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub price_per_unit: Option<Decimal>,
    pub user_role: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub order_id: Option<String>,
    pub new_status: Option<String>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub message: String,
    pub order: Order,
}

pub async fn place_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let body = json_body(payload, &correlation_id)?;
    let (request, role) = parse_place_order(body)
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    let order = state
        .orders
        .place_order(request, role, &correlation_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(OrderResponse { success: true, order })))
}

pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let order = state
        .orders
        .get_order(&OrderId(id))
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    Ok(Json(OrderResponse { success: true, order }))
}

pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let body = json_body(payload, &correlation_id)?;
    let command = parse_update_status(body)
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    let update = state
        .orders
        .update_status(command, &correlation_id)
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;
    let outcome = update.outcome;
    Ok(Json(StatusUpdateResponse {
        success: true,
        order_id: update.order_id,
        previous_status: outcome.previous_status,
        new_status: outcome.new_status,
        updated_at: outcome.updated_at,
        message: outcome.message,
        order: outcome.order,
    }))
}

fn parse_update_status(body: UpdateStatusRequest) -> Result<UpdateStatusCommand, ApplicationError> {
    if !(present(&body.order_id)
        && present(&body.new_status)
        && present(&body.user_id)
        && present(&body.user_role))
    {
        return Err(ApplicationError::missing_fields(&UPDATE_REQUIRED));
    }

    let new_status = body.new_status.unwrap_or_default().parse::<OrderStatus>()?;
    let actor_role = body.user_role.unwrap_or_default().parse::<ActorRole>()?;
    Ok(UpdateStatusCommand {
        order_id: OrderId(body.order_id.unwrap_or_default().trim().to_string()),
        new_status,
        actor_id: body.user_id.unwrap_or_default().trim().to_string(),
        actor_role,
        reason: body.reason.filter(|reason| !reason.is_empty()),
    })
}

fn parse_place_order(body: PlaceOrderRequest) -> Result<(PlaceOrder, ActorRole), ApplicationError> {
    let (Some(quantity), Some(price_per_unit)) = (body.quantity, body.price_per_unit) else {
        return Err(ApplicationError::missing_fields(&PLACE_REQUIRED));
    };
    let strings = [
        &body.product_id,
        &body.product_type,
        &body.buyer_id,
        &body.seller_id,
        &body.seller_category,
        &body.user_role,
    ];
    if !strings.into_iter().all(present) {
        return Err(ApplicationError::missing_fields(&PLACE_REQUIRED));
    }

    let role = body.user_role.unwrap_or_default().parse::<ActorRole>()?;
    let seller_category = body.seller_category.unwrap_or_default().parse::<SellerCategory>()?;
    let id = body
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("ORD-{}", Uuid::new_v4().simple()));
    let product_type = body.product_type.unwrap_or_default();

    let request = PlaceOrder {
        id: OrderId(id),
        product_id: body.product_id.unwrap_or_default(),
        product_name: body.product_name.unwrap_or_else(|| product_type.clone()),
        product_type,
        region: body.region,
        buyer_id: body.buyer_id.unwrap_or_default(),
        buyer_name: body.buyer_name.unwrap_or_default(),
        seller_id: body.seller_id.unwrap_or_default(),
        seller_name: body.seller_name.unwrap_or_default(),
        seller_category,
        quantity,
        unit: body.unit.unwrap_or_default(),
        price_per_unit,
    };
    Ok((request, role))
}
