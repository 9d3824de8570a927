//! Order and carpet handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{Carpet, CarpetAddon, CreateCarpet, CreateOrder, Order, OrderStatus},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub client_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub page_size: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCarpetRequest {
    pub carpet_type_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub scan_code: String,
    pub color: Option<String>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
    #[serde(default)]
    pub additional_charges: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AttachAddonRequest {
    pub addon_service_id: Uuid,
    pub price_override: Option<Decimal>,
}

/// An order together with its carpets.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub carpets: Vec<Carpet>,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state
        .db
        .create_order(&CreateOrder {
            client_id: payload.client_id,
            agent_id: payload.agent_id,
            notes: payload.notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .db
        .get_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;
    let carpets = state.db.list_carpets_for_order(order_id).await?;

    Ok(Json(OrderResponse { order, carpets }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<Order>>, AppError> {
    let status = params.status.as_deref().map(parse_order_status).transpose()?;
    let orders = state
        .db
        .list_orders(status, params.page_size.unwrap_or(50))
        .await?;

    Ok(Json(orders))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let next = parse_order_status(&payload.status)?;
    let order = state
        .db
        .update_order_status(order_id, next)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))?;

    Ok(Json(order))
}

pub async fn add_carpet(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<AddCarpetRequest>,
) -> Result<(StatusCode, Json<Carpet>), AppError> {
    payload.validate()?;

    if payload.additional_charges < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Additional charges must not be negative"
        )));
    }
    for (field, value) in [("width", payload.width), ("length", payload.length)] {
        if let Some(v) = value {
            if v < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Field '{}' must not be negative",
                    field
                )));
            }
        }
    }

    let carpet = state
        .db
        .add_carpet(&CreateCarpet {
            order_id,
            carpet_type_id: payload.carpet_type_id,
            scan_code: payload.scan_code,
            color: payload.color,
            width: payload.width,
            length: payload.length,
            additional_charges: payload.additional_charges,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(carpet)))
}

pub async fn attach_addon(
    State(state): State<AppState>,
    Path(carpet_id): Path<Uuid>,
    Json(payload): Json<AttachAddonRequest>,
) -> Result<(StatusCode, Json<CarpetAddon>), AppError> {
    let addon = state
        .db
        .attach_addon(carpet_id, payload.addon_service_id, payload.price_override)
        .await?;

    Ok((StatusCode::CREATED, Json(addon)))
}

pub async fn cancel_carpet(
    State(state): State<AppState>,
    Path(carpet_id): Path<Uuid>,
) -> Result<Json<Carpet>, AppError> {
    let carpet = state
        .db
        .cancel_carpet(carpet_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Carpet not found or already canceled")))?;

    Ok(Json(carpet))
}

/// Parse an order status string strictly; unknown values are rejected
/// rather than coerced.
fn parse_order_status(s: &str) -> Result<OrderStatus, AppError> {
    let status = OrderStatus::from_string(s);
    if status.as_str() != s {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown order status '{}'",
            s
        )));
    }
    Ok(status)
}
