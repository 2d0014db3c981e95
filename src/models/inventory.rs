// src/models/inventory.rs

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::common::error::AppError;

// --- 1. Política de Margem ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "margin_type", rename_all = "snake_case")] // Banco
#[serde(rename_all = "snake_case")] // JSON
pub enum MarginType {
    Percentage, // Vira "percentage"
    Fixed,      // Vira "fixed"
}

// --- 2. Produto ---
// Estoque e preços só mudam pelo razão de estoque e pelo motor de preços.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub unit_id: i64,
    pub base_unit_name: String, // Vem do JOIN com `units`

    pub stock: Decimal, // Sempre em unidade base
    pub min_stock: Decimal,

    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub margin_type: MarginType,
    pub margin_value: Decimal,
    pub manual_price_active: bool,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Rótulo usado nas mensagens de erro: "CODIGO (Nome)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.code, self.name)
    }
}

// --- 3. Tabela de Conversão ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub id: i64,
    pub product_id: i64,
    pub presentation_name: String,
    pub units_per_presentation: Decimal, // Quantas unidades base valem 1 apresentação
    pub for_purchase: bool,
    pub for_sale: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 4. Movimentações de Estoque ---
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "movement_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    PositiveAdjustment, // Vira "positive_adjustment"
    NegativeAdjustment,
    Shrinkage,
    InternalUse,
    Return,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::PositiveAdjustment => "positive_adjustment",
            MovementType::NegativeAdjustment => "negative_adjustment",
            MovementType::Shrinkage => "shrinkage",
            MovementType::InternalUse => "internal_use",
            MovementType::Return => "return",
        }
    }
}

// O tipo chega como texto livre da camada HTTP; valores fora da lista são rejeitados aqui.
impl FromStr for MovementType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive_adjustment" | "ajuste_positivo" => Ok(MovementType::PositiveAdjustment),
            "negative_adjustment" | "ajuste_negativo" => Ok(MovementType::NegativeAdjustment),
            "shrinkage" | "merma" => Ok(MovementType::Shrinkage),
            "internal_use" | "uso_interno" => Ok(MovementType::InternalUse),
            "return" | "devolucion" => Ok(MovementType::Return),
            _ => Err(AppError::UnknownMovementType(s.to_string())),
        }
    }
}

// --- MOVIMENTAÇÃO (Histórico imutável) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub movement_type: MovementType,
    pub quantity: Decimal, // Total em unidade base
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MovementDetail {
    pub id: i64,
    pub movement_id: i64,
    pub conversion_id: Option<i64>, // None = linha em unidade base
    pub presentation_name: Option<String>,
    pub quantity: Decimal,      // Na apresentação da linha
    pub base_quantity: Decimal, // Já convertida
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementWithDetails {
    #[serde(flatten)]
    pub header: Movement,
    pub details: Vec<MovementDetail>,
}
