//! HTTP handlers for cleaning-service.

pub mod agents;
pub mod catalog;
pub mod clients;
pub mod commissions;
pub mod invoices;
pub mod orders;
pub mod payments;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Health check, including database reachability.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "service": "cleaning-service" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "service": "cleaning-service" })),
            )
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics() -> impl IntoResponse {
    crate::services::metrics::get_metrics()
}
