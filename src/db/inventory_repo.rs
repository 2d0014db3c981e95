// src/db/inventory_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    engine::ledger::PlannedDetail,
    models::inventory::{Conversion, MarginType, Movement, MovementDetail, MovementType, Product},
};

// Produto sempre vem com o nome da unidade base (regra de unidade inteira).
const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.code, p.name, p.unit_id, u.name AS base_unit_name,
           p.stock, p.min_stock, p.purchase_price, p.sale_price,
           p.margin_type, p.margin_value, p.manual_price_active,
           p.is_active, p.created_at, p.updated_at
    FROM products p
    JOIN units u ON u.id = p.unit_id
"#;

#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Leitura" (Getters)
    // ---

    pub async fn get_product<'e, E>(&self, executor: E, product_id: i64) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(product_id)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    /// Bloqueia as linhas dos produtos (FOR UPDATE) em ordem de id para evitar deadlocks.
    /// Deve rodar dentro da transação que vai gravar o estoque.
    pub async fn lock_products<'e, E>(&self, executor: E, product_ids: &[i64]) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.id = ANY($1) ORDER BY p.id FOR UPDATE OF p"
        ))
        .bind(product_ids)
        .fetch_all(executor)
        .await?;
        Ok(products)
    }

    pub async fn list_conversions<'e, E>(&self, executor: E, product_ids: &[i64]) -> Result<Vec<Conversion>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let conversions = sqlx::query_as::<_, Conversion>(
            r#"
            SELECT * FROM conversions
            WHERE product_id = ANY($1)
            ORDER BY product_id, presentation_name ASC
            "#,
        )
        .bind(product_ids)
        .fetch_all(executor)
        .await?;
        Ok(conversions)
    }

    pub async fn get_conversion<'e, E>(&self, executor: E, conversion_id: i64) -> Result<Option<Conversion>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let conversion = sqlx::query_as::<_, Conversion>("SELECT * FROM conversions WHERE id = $1")
            .bind(conversion_id)
            .fetch_optional(executor)
            .await?;
        Ok(conversion)
    }

    pub async fn list_movements<'e, E>(&self, executor: E, product_id: i64) -> Result<Vec<Movement>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT * FROM inventory_movements
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(executor)
        .await?;
        Ok(movements)
    }

    pub async fn list_movement_details<'e, E>(
        &self,
        executor: E,
        movement_ids: &[i64],
    ) -> Result<Vec<MovementDetail>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let details = sqlx::query_as::<_, MovementDetail>(
            "SELECT * FROM inventory_movement_details WHERE movement_id = ANY($1) ORDER BY id",
        )
        .bind(movement_ids)
        .fetch_all(executor)
        .await?;
        Ok(details)
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---

    /// Cria uma apresentação para o produto. Nome único por produto, sem diferenciar maiúsculas.
    pub async fn create_conversion<'e, E>(
        &self,
        executor: E,
        product: &Product,
        presentation_name: &str,
        units_per_presentation: Decimal,
        for_purchase: bool,
        for_sale: bool,
    ) -> Result<Conversion, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Conversion>(
            r#"
            INSERT INTO conversions (product_id, presentation_name, units_per_presentation, for_purchase, for_sale)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(presentation_name)
        .bind(units_per_presentation)
        .bind(for_purchase)
        .bind(for_sale)
        .fetch_one(executor)
        .await
        .map_err(|e| map_presentation_conflict(e, presentation_name, &product.label()))
    }

    pub async fn update_conversion<'e, E>(
        &self,
        executor: E,
        conversion: &Conversion,
        product_label: &str,
    ) -> Result<Conversion, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Conversion>(
            r#"
            UPDATE conversions
            SET presentation_name = $1, units_per_presentation = $2,
                for_purchase = $3, for_sale = $4, is_active = $5, updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&conversion.presentation_name)
        .bind(conversion.units_per_presentation)
        .bind(conversion.for_purchase)
        .bind(conversion.for_sale)
        .bind(conversion.is_active)
        .bind(conversion.id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_presentation_conflict(e, &conversion.presentation_name, product_label))
    }

    /// Grava o estoque já calculado pelo razão (nunca um delta cego).
    pub async fn set_stock<'e, E>(&self, executor: E, product_id: i64, stock: Decimal) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE products SET stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(stock)
            .bind(product_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_pricing<'e, E>(
        &self,
        executor: E,
        product_id: i64,
        purchase_price: Decimal,
        sale_price: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE products
            SET purchase_price = $1, sale_price = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(purchase_price)
        .bind(sale_price)
        .bind(product_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Grava a política de margem. O preço em si é gravado por `set_pricing`.
    pub async fn set_pricing_policy<'e, E>(
        &self,
        executor: E,
        product_id: i64,
        margin_type: MarginType,
        margin_value: Decimal,
        manual_price_active: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE products
            SET margin_type = $1, margin_value = $2, manual_price_active = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(margin_type)
        .bind(margin_value)
        .bind(manual_price_active)
        .bind(product_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Registra o cabeçalho da movimentação no livro-razão (auditoria).
    pub async fn insert_movement<'e, E>(
        &self,
        executor: E,
        product_id: i64,
        user_id: i64,
        movement_type: MovementType,
        quantity: Decimal,
        stock_before: Decimal,
        stock_after: Decimal,
        notes: Option<&str>,
    ) -> Result<Movement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let movement = sqlx::query_as::<_, Movement>(
            r#"
            INSERT INTO inventory_movements
                (product_id, user_id, movement_type, quantity, stock_before, stock_after, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .bind(movement_type)
        .bind(quantity)
        .bind(stock_before)
        .bind(stock_after)
        .bind(notes)
        .fetch_one(executor)
        .await?;
        Ok(movement)
    }

    pub async fn insert_movement_detail<'e, E>(
        &self,
        executor: E,
        movement_id: i64,
        detail: &PlannedDetail,
    ) -> Result<MovementDetail, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let detail = sqlx::query_as::<_, MovementDetail>(
            r#"
            INSERT INTO inventory_movement_details
                (movement_id, conversion_id, presentation_name, quantity, base_quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(movement_id)
        .bind(detail.conversion_id)
        .bind(&detail.presentation_name)
        .bind(detail.quantity)
        .bind(detail.base_quantity)
        .fetch_one(executor)
        .await?;
        Ok(detail)
    }

    /// Leitura fora de transação, direto na pool.
    pub async fn find_product(&self, product_id: i64) -> Result<Option<Product>, AppError> {
        self.get_product(&self.pool, product_id).await
    }
}

fn map_presentation_conflict(e: sqlx::Error, presentation: &str, product_label: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::DuplicatePresentation {
                presentation: presentation.trim().to_string(),
                product: product_label.to_string(),
            };
        }
    }
    e.into()
}
