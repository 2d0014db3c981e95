// src/db/purchase_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    engine::documents::PricedLine,
    models::purchases::{Purchase, PurchaseDetail, PurchaseStatus},
};

#[derive(Clone)]
pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CABEÇALHO
    // =========================================================================

    pub async fn create_purchase<'e, E>(
        &self,
        executor: E,
        supplier_id: i64,
        user_id: i64,
        status: PurchaseStatus,
        total: Decimal,
        notes: Option<&str>,
    ) -> Result<Purchase, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Compra criada já concluída grava completed_at no mesmo INSERT.
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (supplier_id, user_id, status, total, notes, completed_at, completed_by)
            VALUES (
                $1, $2, $3, $4, $5,
                CASE WHEN $3 = 'completed'::purchase_status THEN NOW() END,
                CASE WHEN $3 = 'completed'::purchase_status THEN $2 END
            )
            RETURNING *
            "#,
        )
        .bind(supplier_id)
        .bind(user_id)
        .bind(status)
        .bind(total)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(purchase)
    }

    /// Lê o cabeçalho bloqueando a linha: transições concorrentes ficam serializadas.
    pub async fn get_purchase_for_update<'e, E>(
        &self,
        executor: E,
        purchase_id: i64,
    ) -> Result<Option<Purchase>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1 FOR UPDATE")
            .bind(purchase_id)
            .fetch_optional(executor)
            .await?;
        Ok(purchase)
    }

    pub async fn update_total<'e, E>(
        &self,
        executor: E,
        purchase_id: i64,
        total: Decimal,
        notes: Option<&str>,
        user_id: i64,
    ) -> Result<Purchase, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            UPDATE purchases
            SET total = $1, notes = COALESCE($2, notes), updated_by = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(total)
        .bind(notes)
        .bind(user_id)
        .bind(purchase_id)
        .fetch_one(executor)
        .await?;
        Ok(purchase)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        purchase_id: i64,
        status: PurchaseStatus,
        user_id: i64,
    ) -> Result<Purchase, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Data e responsável da transição ficam no cabeçalho.
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            UPDATE purchases
            SET status = $1,
                completed_at = CASE WHEN $1 = 'completed'::purchase_status THEN NOW() ELSE completed_at END,
                completed_by = CASE WHEN $1 = 'completed'::purchase_status THEN $2 ELSE completed_by END,
                voided_at = CASE WHEN $1 = 'voided'::purchase_status THEN NOW() ELSE voided_at END,
                voided_by = CASE WHEN $1 = 'voided'::purchase_status THEN $2 ELSE voided_by END,
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(user_id)
        .bind(purchase_id)
        .fetch_one(executor)
        .await?;
        Ok(purchase)
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    pub async fn insert_detail<'e, E>(
        &self,
        executor: E,
        purchase_id: i64,
        line: &PricedLine,
    ) -> Result<PurchaseDetail, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let detail = sqlx::query_as::<_, PurchaseDetail>(
            r#"
            INSERT INTO purchase_details
                (purchase_id, product_id, quantity, unit_price, presentation_name, subtotal,
                 conversion_id, units_per_presentation, base_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(purchase_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(&line.presentation_name)
        .bind(line.subtotal)
        .bind(line.conversion_id)
        .bind(line.units_per_presentation)
        .bind(line.base_quantity)
        .fetch_one(executor)
        .await?;
        Ok(detail)
    }

    pub async fn list_details<'e, E>(&self, executor: E, purchase_id: i64) -> Result<Vec<PurchaseDetail>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let details = sqlx::query_as::<_, PurchaseDetail>(
            "SELECT * FROM purchase_details WHERE purchase_id = $1 ORDER BY id",
        )
        .bind(purchase_id)
        .fetch_all(executor)
        .await?;
        Ok(details)
    }

    pub async fn delete_details<'e, E>(&self, executor: E, purchase_id: i64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM purchase_details WHERE purchase_id = $1")
            .bind(purchase_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Base do custo médio: todos os itens de compras concluídas do produto.
    pub async fn completed_details_for_product<'e, E>(
        &self,
        executor: E,
        product_id: i64,
    ) -> Result<Vec<PurchaseDetail>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let details = sqlx::query_as::<_, PurchaseDetail>(
            r#"
            SELECT d.*
            FROM purchase_details d
            JOIN purchases p ON p.id = d.purchase_id
            WHERE d.product_id = $1 AND p.status = 'completed'
            ORDER BY d.id
            "#,
        )
        .bind(product_id)
        .fetch_all(executor)
        .await?;
        Ok(details)
    }

    // Leituras simples usam a pool principal.

    pub async fn find_purchase(&self, purchase_id: i64) -> Result<Option<Purchase>, AppError> {
        let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
            .bind(purchase_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(purchase)
    }

    pub async fn find_details(&self, purchase_id: i64) -> Result<Vec<PurchaseDetail>, AppError> {
        self.list_details(&self.pool, purchase_id).await
    }
}
