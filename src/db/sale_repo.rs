// src/db/sale_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    engine::documents::PricedLine,
    models::sales::{PaymentMethod, Sale, SaleDetail},
};

#[derive(Clone)]
pub struct SaleRepository {
    pool: PgPool,
}

impl SaleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_sale<'e, E>(
        &self,
        executor: E,
        customer_id: Option<i64>,
        user_id: i64,
        total: Decimal,
        payment_method: PaymentMethod,
        invoice_requested: bool,
    ) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (customer_id, user_id, total, payment_method, invoice_requested)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(customer_id)
        .bind(user_id)
        .bind(total)
        .bind(payment_method)
        .bind(invoice_requested)
        .fetch_one(executor)
        .await?;
        Ok(sale)
    }

    pub async fn insert_detail<'e, E>(
        &self,
        executor: E,
        sale_id: i64,
        line: &PricedLine,
    ) -> Result<SaleDetail, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let detail = sqlx::query_as::<_, SaleDetail>(
            r#"
            INSERT INTO sale_details
                (sale_id, product_id, quantity, unit_price, presentation_name, subtotal,
                 conversion_id, units_per_presentation, base_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(sale_id)
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

    pub async fn get_sale_for_update<'e, E>(&self, executor: E, sale_id: i64) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = $1 FOR UPDATE")
            .bind(sale_id)
            .fetch_optional(executor)
            .await?;
        Ok(sale)
    }

    pub async fn list_details<'e, E>(&self, executor: E, sale_id: i64) -> Result<Vec<SaleDetail>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let details = sqlx::query_as::<_, SaleDetail>(
            "SELECT * FROM sale_details WHERE sale_id = $1 ORDER BY id",
        )
        .bind(sale_id)
        .fetch_all(executor)
        .await?;
        Ok(details)
    }

    pub async fn mark_voided<'e, E>(&self, executor: E, sale_id: i64, user_id: i64) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales
            SET status = 'voided', voided_at = NOW(), voided_by = $1
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(sale_id)
        .fetch_one(executor)
        .await?;
        Ok(sale)
    }

    pub async fn find_sale(&self, sale_id: i64) -> Result<Option<Sale>, AppError> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = $1")
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    pub async fn find_details(&self, sale_id: i64) -> Result<Vec<SaleDetail>, AppError> {
        self.list_details(&self.pool, sale_id).await
    }
}
