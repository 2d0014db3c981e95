// src/services/pricing_service.rs

use std::collections::BTreeSet;

use sqlx::{Acquire, PgConnection, Postgres};

use crate::{
    common::{db_utils::lock_catalog, error::AppError},
    db::{InventoryRepository, PurchaseRepository},
    engine::{
        conversion::ProductContext,
        documents::{context, Catalog},
        pricing::{cost_lines, reprice, Pricing},
    },
    models::inventory::Product,
};

#[derive(Clone)]
pub struct PricingService {
    inventory_repo: InventoryRepository,
    purchase_repo: PurchaseRepository,
}

impl PricingService {
    pub fn new(inventory_repo: InventoryRepository, purchase_repo: PurchaseRepository) -> Self {
        Self {
            inventory_repo,
            purchase_repo,
        }
    }

    /// Custo médio recalculado sobre todas as compras concluídas, sem gravar.
    pub async fn recompute_purchase_cost(
        &self,
        conn: &mut PgConnection,
        ctx: &ProductContext,
    ) -> Result<Pricing, AppError> {
        let details = self
            .purchase_repo
            .completed_details_for_product(&mut *conn, ctx.product.id)
            .await?;
        let lines = cost_lines(ctx.product.id, &details);
        reprice(&ctx.product, &lines)
    }

    /// Recalcula custo e preço de venda e grava os dois juntos.
    /// O produto precisa estar bloqueado pela transação do chamador.
    pub async fn update_product_pricing(
        &self,
        conn: &mut PgConnection,
        ctx: &ProductContext,
    ) -> Result<Pricing, AppError> {
        let pricing = self.recompute_purchase_cost(&mut *conn, ctx).await?;

        self.inventory_repo
            .set_pricing(&mut *conn, ctx.product.id, pricing.purchase_price, pricing.sale_price)
            .await?;

        tracing::info!(
            product_id = ctx.product.id,
            purchase_price = %pricing.purchase_price,
            sale_price = %pricing.sale_price,
            "💲 Preços recalculados para {}",
            ctx.product.label()
        );
        Ok(pricing)
    }

    /// Uma vez por produto distinto tocado pelo documento.
    pub async fn update_pricing_for(
        &self,
        conn: &mut PgConnection,
        catalog: &Catalog,
        product_ids: &BTreeSet<i64>,
    ) -> Result<(), AppError> {
        for product_id in product_ids {
            let ctx = context(catalog, *product_id)?;
            self.update_product_pricing(&mut *conn, ctx).await?;
        }
        Ok(())
    }

    // --- RECÁLCULO SOB DEMANDA ---
    pub async fn recalculate_pricing<'e, E>(&self, executor: E, product_id: i64) -> Result<Product, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &[product_id]).await?;
        let ctx = context(&catalog, product_id)?;
        let pricing = self.update_product_pricing(&mut *tx, ctx).await?;

        tx.commit().await?;

        let mut product = ctx.product.clone();
        product.purchase_price = pricing.purchase_price;
        product.sale_price = pricing.sale_price;
        Ok(product)
    }
}
