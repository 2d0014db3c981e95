// src/handlers/sales.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    common::error::AppError,
    config::AppState,
    engine::documents::DocumentLine,
    middleware::actor::ActingUser,
    models::sales::PaymentMethod,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSalePayload {
    pub customer_id: Option<i64>,

    pub payment_method: PaymentMethod,

    #[serde(default)]
    pub issue_invoice: bool,

    #[serde(default)]
    pub lines: Vec<DocumentLine>,
}

// POST /api/sales
pub async fn create_sale(
    State(app_state): State<AppState>,
    user: ActingUser,
    Json(payload): Json<CreateSalePayload>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state
        .sale_service
        .create_sale(
            &app_state.db_pool,
            user.0,
            payload.customer_id,
            payload.payment_method,
            payload.issue_invoice,
            &payload.lines,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

// GET /api/sales/{id}
pub async fn get_sale(
    State(app_state): State<AppState>,
    Path(sale_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.sale_service.get_sale(sale_id).await?;
    Ok(Json(sale))
}

// POST /api/sales/{id}/void
pub async fn void_sale(
    State(app_state): State<AppState>,
    user: ActingUser,
    Path(sale_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sale = app_state.sale_service.void_sale(&app_state.db_pool, user.0, sale_id).await?;
    Ok(Json(sale))
}
