// src/db/party_repo.rs

use sqlx::{Executor, Postgres};

use crate::{
    common::error::AppError,
    models::parties::{Customer, Supplier},
};

// Fornecedores e clientes são cadastrados fora deste núcleo; aqui só lemos.
#[derive(Clone, Default)]
pub struct PartyRepository;

impl PartyRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_supplier<'e, E>(&self, executor: E, supplier_id: i64) -> Result<Option<Supplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, phone, email, is_active FROM suppliers WHERE id = $1",
        )
        .bind(supplier_id)
        .fetch_optional(executor)
        .await?;
        Ok(supplier)
    }

    pub async fn get_customer<'e, E>(&self, executor: E, customer_id: i64) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, document_number, is_active FROM customers WHERE id = $1",
        )
        .bind(customer_id)
        .fetch_optional(executor)
        .await?;
        Ok(customer)
    }
}
