// src/handlers/inventory.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    engine::ledger::MovementLine,
    middleware::actor::ActingUser,
    models::inventory::MarginType,
    services::inventory_service::ConversionChanges,
};

// ---
// Validação Customizada
// ---
pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("exclusive_min".into(), &0.0);
        err.message = Some("O fator deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Movimentações manuais
// ---
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovementPayload {
    #[validate(length(min = 1, message = "O tipo de movimentação é obrigatório."))]
    pub movement_type: String,

    #[validate(length(max = 500))]
    pub notes: Option<String>,

    // Vazio cai na regra de total não positivo do serviço
    #[serde(default)]
    pub lines: Vec<MovementLine>,
}

// POST /api/products/{id}/movements
pub async fn create_movement(
    State(app_state): State<AppState>,
    user: ActingUser,
    Path(product_id): Path<i64>,
    Json(payload): Json<CreateMovementPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let movement = app_state
        .inventory_service
        .create_movement(
            &app_state.db_pool,
            user.0,
            product_id,
            &payload.movement_type,
            payload.notes.as_deref(),
            &payload.lines,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(movement)))
}

// GET /api/products/{id}/movements
pub async fn list_movements(
    State(app_state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let movements = app_state
        .inventory_service
        .list_movements(&app_state.db_pool, product_id)
        .await?;
    Ok(Json(movements))
}

// GET /api/products/{id}
pub async fn get_product(
    State(app_state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let product = app_state.inventory_service.get_product(product_id).await?;
    Ok(Json(product))
}

// ---
// Tabela de conversão
// ---
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversionPayload {
    #[validate(length(min = 1, max = 60, message = "O nome da apresentação é obrigatório."))]
    pub presentation_name: String,

    #[validate(custom(function = "validate_positive"))]
    pub units_per_presentation: Decimal,

    #[serde(default = "enabled")]
    pub for_purchase: bool,

    #[serde(default = "enabled")]
    pub for_sale: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConversionPayload {
    #[validate(length(min = 1, max = 60))]
    pub presentation_name: Option<String>,

    #[validate(custom(function = "validate_positive"))]
    pub units_per_presentation: Option<Decimal>,

    pub for_purchase: Option<bool>,
    pub for_sale: Option<bool>,
    pub is_active: Option<bool>,
}

impl From<UpdateConversionPayload> for ConversionChanges {
    fn from(payload: UpdateConversionPayload) -> Self {
        Self {
            presentation_name: payload.presentation_name,
            units_per_presentation: payload.units_per_presentation,
            for_purchase: payload.for_purchase,
            for_sale: payload.for_sale,
            is_active: payload.is_active,
        }
    }
}

// GET /api/products/{id}/conversions
pub async fn list_conversions(
    State(app_state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let conversions = app_state
        .inventory_service
        .list_conversions(&app_state.db_pool, product_id)
        .await?;
    Ok(Json(conversions))
}

// POST /api/products/{id}/conversions
pub async fn create_conversion(
    State(app_state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(payload): Json<CreateConversionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let conversion = app_state
        .inventory_service
        .create_conversion(
            &app_state.db_pool,
            product_id,
            &payload.presentation_name,
            payload.units_per_presentation,
            payload.for_purchase,
            payload.for_sale,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(conversion)))
}

// PATCH /api/conversions/{id}
pub async fn update_conversion(
    State(app_state): State<AppState>,
    Path(conversion_id): Path<i64>,
    Json(payload): Json<UpdateConversionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let conversion = app_state
        .inventory_service
        .update_conversion(&app_state.db_pool, conversion_id, payload.into())
        .await?;
    Ok(Json(conversion))
}

// ---
// Preços
// ---
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PricingPolicyPayload {
    pub margin_type: MarginType,

    #[validate(custom(function = "validate_not_negative"))]
    pub margin_value: Decimal,

    #[serde(default)]
    pub manual_price_active: bool,

    // Só usado com preço manual ativo
    #[validate(custom(function = "validate_not_negative"))]
    pub manual_sale_price: Option<Decimal>,
}

// PUT /api/products/{id}/pricing-policy
pub async fn update_pricing_policy(
    State(app_state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(payload): Json<PricingPolicyPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let product = app_state
        .inventory_service
        .update_pricing_policy(
            &app_state.db_pool,
            product_id,
            payload.margin_type,
            payload.margin_value,
            payload.manual_price_active,
            payload.manual_sale_price,
        )
        .await?;
    Ok(Json(product))
}

// POST /api/products/{id}/recalculate-pricing
pub async fn recalculate_pricing(
    State(app_state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let product = app_state
        .pricing_service
        .recalculate_pricing(&app_state.db_pool, product_id)
        .await?;
    Ok(Json(product))
}
