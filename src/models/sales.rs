// src/models/sales.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sale_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Active,
    Voided, // Terminal
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Active => "active",
            SaleStatus::Voided => "voided",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Credit,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub user_id: i64,
    pub status: SaleStatus,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub invoice_requested: bool,
    pub created_at: DateTime<Utc>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub presentation_name: Option<String>,
    pub subtotal: Decimal,
    pub conversion_id: Option<i64>,
    pub units_per_presentation: Decimal,
    pub base_quantity: Decimal, // Devolvida ao estoque na anulação
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleWithDetails {
    #[serde(flatten)]
    pub header: Sale,
    pub details: Vec<SaleDetail>,
}
