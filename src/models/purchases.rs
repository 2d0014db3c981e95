// src/models/purchases.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "purchase_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Voided, // Terminal
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Voided => "voided",
        }
    }

    /// pending -> completed, pending -> voided, completed -> voided.
    pub fn can_transition_to(&self, next: PurchaseStatus) -> bool {
        matches!(
            (self, next),
            (PurchaseStatus::Pending, PurchaseStatus::Completed)
                | (PurchaseStatus::Pending, PurchaseStatus::Voided)
                | (PurchaseStatus::Completed, PurchaseStatus::Voided)
        )
    }

    /// Itens só podem ser trocados enquanto a compra está pendente.
    pub fn is_editable(&self) -> bool {
        *self == PurchaseStatus::Pending
    }
}

// --- Structs de Documento ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: i64,
    pub supplier_id: i64,
    pub user_id: i64,
    pub status: PurchaseStatus,
    pub total: Decimal, // Soma de quantity * unit_price dos itens atuais
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    // Quem fez a última alteração de itens, a conclusão e a anulação
    pub updated_by: Option<i64>,
    pub completed_by: Option<i64>,
    pub voided_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDetail {
    pub id: i64,
    pub purchase_id: i64,
    pub product_id: i64,
    pub quantity: Decimal, // Na apresentação da linha
    pub unit_price: Decimal,
    pub presentation_name: Option<String>,
    pub subtotal: Decimal,
    // Conversão usada na gravação; anulação e custo médio não consultam a tabela atual
    pub conversion_id: Option<i64>,
    pub units_per_presentation: Decimal,
    pub base_quantity: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseWithDetails {
    #[serde(flatten)]
    pub header: Purchase,
    pub details: Vec<PurchaseDetail>,
}
