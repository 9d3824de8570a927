//! Commission handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{handlers::clients::ListParams, models::Commission, AppState};

pub async fn get_commission(
    State(state): State<AppState>,
    Path(commission_id): Path<Uuid>,
) -> Result<Json<Commission>, AppError> {
    let commission = state
        .db
        .get_commission(commission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Commission not found")))?;

    Ok(Json(commission))
}

pub async fn list_agent_commissions(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Commission>>, AppError> {
    if state.db.get_agent(agent_id).await?.is_none() {
        return Err(AppError::NotFound(anyhow::anyhow!("Agent not found")));
    }

    let commissions = state
        .db
        .list_commissions_for_agent(agent_id, params.page_size.unwrap_or(50))
        .await?;

    Ok(Json(commissions))
}

/// Mark a pending commission as paid out to the agent.
pub async fn pay_commission(
    State(state): State<AppState>,
    Path(commission_id): Path<Uuid>,
) -> Result<Json<Commission>, AppError> {
    let commission = state
        .db
        .mark_commission_paid(commission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Commission not found")))?;

    Ok(Json(commission))
}

/// Cancel a pending commission.
pub async fn cancel_commission(
    State(state): State<AppState>,
    Path(commission_id): Path<Uuid>,
) -> Result<Json<Commission>, AppError> {
    let commission = state
        .db
        .cancel_commission(commission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Commission not found")))?;

    Ok(Json(commission))
}
