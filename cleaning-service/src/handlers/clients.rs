//! Client handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::{Client, CreateClient},
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page_size: Option<i32>,
}

pub async fn create_client(
    State(state): State<AppState>,
    Json(payload): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    payload.validate()?;

    let client = state
        .db
        .create_client(&CreateClient {
            name: payload.name,
            phone: payload.phone,
            email: payload.email,
            address: payload.address,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    let client = state
        .db
        .get_client(client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

pub async fn list_clients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Client>>, AppError> {
    let clients = state.db.list_clients(params.page_size.unwrap_or(50)).await?;
    Ok(Json(clients))
}
