// src/common/db_utils.rs

use std::collections::HashMap;

use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    db::InventoryRepository,
    engine::{
        conversion::ProductContext,
        documents::{context, Catalog},
        ledger::StockChange,
    },
    services::inventory_service::warn_if_low_stock,
};

// ---
// Helper de bloqueio: a "chave" do estoque
// ---
/// Bloqueia os produtos (FOR UPDATE, em ordem de id) e carrega as conversões de cada um.
/// Precisa rodar dentro da transação do documento; os bloqueios caem no commit/rollback.
pub(crate) async fn lock_catalog(
    conn: &mut PgConnection,
    inventory_repo: &InventoryRepository,
    product_ids: &[i64],
) -> Result<Catalog, AppError> {
    let products = inventory_repo.lock_products(&mut *conn, product_ids).await?;
    let conversions = inventory_repo.list_conversions(&mut *conn, product_ids).await?;

    let mut by_product: HashMap<i64, Vec<_>> = HashMap::new();
    for conversion in conversions {
        by_product.entry(conversion.product_id).or_default().push(conversion);
    }

    let catalog = products
        .into_iter()
        .map(|product| {
            let own = by_product.remove(&product.id).unwrap_or_default();
            (product.id, ProductContext::new(product, own))
        })
        .collect();

    Ok(catalog)
}

/// Grava estoques já validados pelo plano. Só o valor final vai para o banco.
pub(crate) async fn apply_stock_changes(
    conn: &mut PgConnection,
    inventory_repo: &InventoryRepository,
    catalog: &Catalog,
    changes: &[StockChange],
) -> Result<(), AppError> {
    for change in changes {
        inventory_repo
            .set_stock(&mut *conn, change.product_id, change.after)
            .await?;

        let ctx = context(catalog, change.product_id)?;
        if change.went_negative() {
            tracing::warn!(
                product_id = change.product_id,
                stock_before = %change.before,
                stock_after = %change.after,
                "⚠️ Estoque negativo após reversão para {}",
                ctx.product.label()
            );
        } else {
            warn_if_low_stock(ctx, change);
        }
    }
    Ok(())
}
