//! Catalog handlers: carpet types, addon services, and tax settings.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

use crate::{
    models::{
        AddonService, CarpetType, CreateAddonService, CreateCarpetType, CreateTaxSetting,
        TaxSetting,
    },
    AppState,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCarpetTypeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub is_per_square_foot: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddonServiceRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub is_per_square_foot: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaxSettingRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub rate: Decimal,
    /// "percentage" or "fixed".
    pub calculation: String,
}

pub async fn create_carpet_type(
    State(state): State<AppState>,
    Json(payload): Json<CreateCarpetTypeRequest>,
) -> Result<(StatusCode, Json<CarpetType>), AppError> {
    payload.validate()?;
    require_non_negative(payload.price, "price")?;

    let carpet_type = state
        .db
        .create_carpet_type(&CreateCarpetType {
            name: payload.name,
            price: payload.price,
            is_per_square_foot: payload.is_per_square_foot,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(carpet_type)))
}

pub async fn list_carpet_types(
    State(state): State<AppState>,
) -> Result<Json<Vec<CarpetType>>, AppError> {
    let carpet_types = state.db.list_carpet_types().await?;
    Ok(Json(carpet_types))
}

pub async fn create_addon_service(
    State(state): State<AppState>,
    Json(payload): Json<CreateAddonServiceRequest>,
) -> Result<(StatusCode, Json<AddonService>), AppError> {
    payload.validate()?;
    require_non_negative(payload.price, "price")?;

    let addon = state
        .db
        .create_addon_service(&CreateAddonService {
            name: payload.name,
            price: payload.price,
            is_per_square_foot: payload.is_per_square_foot,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(addon)))
}

pub async fn list_addon_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<AddonService>>, AppError> {
    let addons = state.db.list_addon_services().await?;
    Ok(Json(addons))
}

pub async fn create_tax_setting(
    State(state): State<AppState>,
    Json(payload): Json<CreateTaxSettingRequest>,
) -> Result<(StatusCode, Json<TaxSetting>), AppError> {
    payload.validate()?;
    require_non_negative(payload.rate, "rate")?;

    let tax_setting = state
        .db
        .create_tax_setting(&CreateTaxSetting {
            name: payload.name,
            rate: payload.rate,
            calculation: payload.calculation,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(tax_setting)))
}

pub async fn list_tax_settings(
    State(state): State<AppState>,
) -> Result<Json<Vec<TaxSetting>>, AppError> {
    let tax_settings = state.db.list_tax_settings().await?;
    Ok(Json(tax_settings))
}

fn require_non_negative(value: Decimal, field: &str) -> Result<(), AppError> {
    if value < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Field '{}' must not be negative",
            field
        )));
    }
    Ok(())
}
