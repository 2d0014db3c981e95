// src/models/parties.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Fornecedores e clientes: o núcleo só precisa saber se existem e estão ativos.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub document_number: Option<String>,
    pub is_active: bool,
}
