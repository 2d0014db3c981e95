// src/handlers/purchases.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    engine::documents::DocumentLine,
    middleware::actor::ActingUser,
    models::purchases::PurchaseStatus,
};

fn pending() -> PurchaseStatus {
    PurchaseStatus::Pending
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchasePayload {
    pub supplier_id: i64,

    // Sem status, a compra nasce pendente
    #[serde(default = "pending")]
    pub status: PurchaseStatus,

    #[validate(length(max = 500))]
    pub notes: Option<String>,

    #[serde(default)]
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePurchasePayload {
    #[validate(length(max = 500))]
    pub notes: Option<String>,

    #[serde(default)]
    pub lines: Vec<DocumentLine>,
}

// POST /api/purchases
pub async fn create_purchase(
    State(app_state): State<AppState>,
    user: ActingUser,
    Json(payload): Json<CreatePurchasePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let purchase = app_state
        .purchase_service
        .create_purchase(
            &app_state.db_pool,
            user.0,
            payload.supplier_id,
            payload.status,
            payload.notes.as_deref(),
            &payload.lines,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(purchase)))
}

// GET /api/purchases/{id}
pub async fn get_purchase(
    State(app_state): State<AppState>,
    Path(purchase_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let purchase = app_state.purchase_service.get_purchase(purchase_id).await?;
    Ok(Json(purchase))
}

// PUT /api/purchases/{id}
pub async fn update_purchase(
    State(app_state): State<AppState>,
    user: ActingUser,
    Path(purchase_id): Path<i64>,
    Json(payload): Json<UpdatePurchasePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let purchase = app_state
        .purchase_service
        .update_purchase(
            &app_state.db_pool,
            user.0,
            purchase_id,
            payload.notes.as_deref(),
            &payload.lines,
        )
        .await?;
    Ok(Json(purchase))
}

// POST /api/purchases/{id}/complete
pub async fn complete_purchase(
    State(app_state): State<AppState>,
    user: ActingUser,
    Path(purchase_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let purchase = app_state
        .purchase_service
        .complete_purchase(&app_state.db_pool, user.0, purchase_id)
        .await?;
    Ok(Json(purchase))
}

// POST /api/purchases/{id}/void
pub async fn void_purchase(
    State(app_state): State<AppState>,
    user: ActingUser,
    Path(purchase_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let purchase = app_state
        .purchase_service
        .void_purchase(&app_state.db_pool, user.0, purchase_id)
        .await?;
    Ok(Json(purchase))
}
