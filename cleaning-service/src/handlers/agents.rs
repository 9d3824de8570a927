//! Agent and commission type handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    handlers::clients::ListParams,
    models::{Agent, CommissionType, CreateAgent, CreateCommissionType},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub commission_type_id: Option<Uuid>,
    pub fixed_amount_override: Option<Decimal>,
    pub percentage_rate_override: Option<Decimal>,
    pub fixed_commission: Option<Decimal>,
    pub percentage_commission: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommissionTypeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub fixed_amount: Decimal,
    #[serde(default)]
    pub percentage_rate: Decimal,
    #[serde(default)]
    pub is_default: bool,
}

pub async fn create_agent(
    State(state): State<AppState>,
    Json(payload): Json<CreateAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), AppError> {
    payload.validate()?;

    let agent = state
        .db
        .create_agent(&CreateAgent {
            name: payload.name,
            phone: payload.phone,
            email: payload.email,
            commission_type_id: payload.commission_type_id,
            fixed_amount_override: payload.fixed_amount_override,
            percentage_rate_override: payload.percentage_rate_override,
            fixed_commission: payload.fixed_commission,
            percentage_commission: payload.percentage_commission,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(agent)))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Agent>, AppError> {
    let agent = state
        .db
        .get_agent(agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Agent not found")))?;

    Ok(Json(agent))
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Agent>>, AppError> {
    let agents = state.db.list_agents(params.page_size.unwrap_or(50)).await?;
    Ok(Json(agents))
}

pub async fn create_commission_type(
    State(state): State<AppState>,
    Json(payload): Json<CreateCommissionTypeRequest>,
) -> Result<(StatusCode, Json<CommissionType>), AppError> {
    payload.validate()?;

    if payload.fixed_amount < Decimal::ZERO || payload.percentage_rate < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Commission rates must not be negative"
        )));
    }

    let commission_type = state
        .db
        .create_commission_type(&CreateCommissionType {
            name: payload.name,
            fixed_amount: payload.fixed_amount,
            percentage_rate: payload.percentage_rate,
            is_default: payload.is_default,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(commission_type)))
}

pub async fn list_commission_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<CommissionType>>, AppError> {
    let commission_types = state.db.list_commission_types().await?;
    Ok(Json(commission_types))
}

/// Mark a commission type as the business-wide default.
pub async fn set_default_commission_type(
    State(state): State<AppState>,
    Path(commission_type_id): Path<Uuid>,
) -> Result<Json<CommissionType>, AppError> {
    let commission_type = state
        .db
        .set_default_commission_type(commission_type_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Commission type not found")))?;

    Ok(Json(commission_type))
}
