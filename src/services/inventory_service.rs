// src/services/inventory_service.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, Postgres};

use crate::{
    common::{db_utils::lock_catalog, error::AppError},
    db::InventoryRepository,
    engine::{
        conversion::{round_quantity, ProductContext, MAX_QUANTITY},
        documents::context,
        ledger::{is_low_stock, plan_movement, MovementLine, StockChange},
        pricing::{derive_sale_price, round_money, PricingPolicy, MAX_MONEY},
    },
    models::inventory::{Conversion, MarginType, MovementType, MovementWithDetails, Product},
};

/// Campos alteráveis de uma apresentação; `None` mantém o valor atual.
#[derive(Debug, Clone, Default)]
pub struct ConversionChanges {
    pub presentation_name: Option<String>,
    pub units_per_presentation: Option<Decimal>,
    pub for_purchase: Option<bool>,
    pub for_sale: Option<bool>,
    pub is_active: Option<bool>,
}

/// Nome não vazio e fator dentro da faixa da coluna.
pub(crate) fn validate_presentation(product: &str, name: &str, factor: Decimal) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidPresentation {
            presentation: name.to_string(),
            product: product.to_string(),
        });
    }
    if factor <= Decimal::ZERO || factor > MAX_QUANTITY {
        return Err(AppError::InvalidConversionFactor {
            presentation: name.trim().to_string(),
            product: product.to_string(),
            factor,
        });
    }
    Ok(())
}

/// Loga a baixa que deixou o produto no estoque mínimo ou abaixo dele.
pub(crate) fn warn_if_low_stock(ctx: &ProductContext, change: &StockChange) {
    if change.delta() < Decimal::ZERO && is_low_stock(&ctx.product, change.after) {
        tracing::warn!(
            product_id = ctx.product.id,
            stock = %change.after,
            min_stock = %ctx.product.min_stock,
            "⚠️ Estoque baixo para {}",
            ctx.product.label()
        );
    }
}

#[derive(Clone)]
pub struct InventoryService {
    inventory_repo: InventoryRepository,
}

impl InventoryService {
    pub fn new(inventory_repo: InventoryRepository) -> Self {
        Self { inventory_repo }
    }

    pub async fn get_product(&self, product_id: i64) -> Result<Product, AppError> {
        self.inventory_repo
            .find_product(product_id)
            .await?
            .ok_or(AppError::EntityNotFound {
                entity: "Produto",
                id: product_id,
            })
    }

    // --- MOVIMENTAÇÃO MANUAL (AJUSTE / QUEBRA / USO INTERNO / DEVOLUÇÃO) ---
    pub async fn create_movement<'e, E>(
        &self,
        executor: E,
        user_id: i64,
        product_id: i64,
        movement_type: &str,
        notes: Option<&str>,
        lines: &[MovementLine],
    ) -> Result<MovementWithDetails, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        // Tipo inválido é rejeitado antes de abrir a transação.
        let movement_type: MovementType = movement_type.parse()?;

        let mut tx = executor.begin().await?;

        // 1. Bloqueia o produto e carrega as conversões
        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &[product_id]).await?;
        let ctx = context(&catalog, product_id)?;
        if !ctx.product.is_active {
            return Err(AppError::EntityNotFound {
                entity: "Produto",
                id: product_id,
            });
        }

        // 2. Resolve, soma, valida sinal e saldo (nada foi gravado ainda)
        let plan = plan_movement(ctx, movement_type, lines)?;

        // 3. Grava estoque, cabeçalho e detalhes na mesma transação
        self.inventory_repo
            .set_stock(&mut *tx, product_id, plan.change.after)
            .await?;

        let header = self
            .inventory_repo
            .insert_movement(
                &mut *tx,
                product_id,
                user_id,
                plan.movement_type,
                plan.total,
                plan.change.before,
                plan.change.after,
                notes,
            )
            .await?;

        let mut details = Vec::with_capacity(plan.details.len());
        for detail in &plan.details {
            details.push(
                self.inventory_repo
                    .insert_movement_detail(&mut *tx, header.id, detail)
                    .await?,
            );
        }

        tx.commit().await?;

        tracing::info!(
            movement_id = header.id,
            product_id,
            movement_type = plan.movement_type.as_str(),
            quantity = %plan.total,
            stock_before = %plan.change.before,
            stock_after = %plan.change.after,
            "📦 Movimentação registrada"
        );
        warn_if_low_stock(ctx, &plan.change);

        Ok(MovementWithDetails { header, details })
    }

    pub async fn list_movements<'e, E>(&self, executor: E, product_id: i64) -> Result<Vec<MovementWithDetails>, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let headers = self.inventory_repo.list_movements(&mut *conn, product_id).await?;
        let ids: Vec<i64> = headers.iter().map(|m| m.id).collect();
        let details = self.inventory_repo.list_movement_details(&mut *conn, &ids).await?;

        let mut by_movement: HashMap<i64, Vec<_>> = HashMap::new();
        for detail in details {
            by_movement.entry(detail.movement_id).or_default().push(detail);
        }

        Ok(headers
            .into_iter()
            .map(|header| {
                let details = by_movement.remove(&header.id).unwrap_or_default();
                MovementWithDetails { header, details }
            })
            .collect())
    }

    // --- TABELA DE CONVERSÃO ---

    pub async fn list_conversions<'e, E>(&self, executor: E, product_id: i64) -> Result<Vec<Conversion>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.inventory_repo.list_conversions(executor, &[product_id]).await
    }

    pub async fn create_conversion<'e, E>(
        &self,
        executor: E,
        product_id: i64,
        presentation_name: &str,
        units_per_presentation: Decimal,
        for_purchase: bool,
        for_sale: bool,
    ) -> Result<Conversion, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let product = self
            .inventory_repo
            .get_product(&mut *tx, product_id)
            .await?
            .ok_or(AppError::EntityNotFound {
                entity: "Produto",
                id: product_id,
            })?;
        let units_per_presentation = round_quantity(units_per_presentation);
        validate_presentation(&product.label(), presentation_name, units_per_presentation)?;

        let conversion = self
            .inventory_repo
            .create_conversion(
                &mut *tx,
                &product,
                presentation_name.trim(),
                units_per_presentation,
                for_purchase,
                for_sale,
            )
            .await?;

        tx.commit().await?;
        Ok(conversion)
    }

    pub async fn update_conversion<'e, E>(
        &self,
        executor: E,
        conversion_id: i64,
        changes: ConversionChanges,
    ) -> Result<Conversion, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut conversion = self
            .inventory_repo
            .get_conversion(&mut *tx, conversion_id)
            .await?
            .ok_or(AppError::EntityNotFound {
                entity: "Conversão",
                id: conversion_id,
            })?;

        if let Some(name) = changes.presentation_name {
            conversion.presentation_name = name.trim().to_string();
        }
        if let Some(factor) = changes.units_per_presentation {
            conversion.units_per_presentation = round_quantity(factor);
        }
        if let Some(flag) = changes.for_purchase {
            conversion.for_purchase = flag;
        }
        if let Some(flag) = changes.for_sale {
            conversion.for_sale = flag;
        }
        if let Some(flag) = changes.is_active {
            conversion.is_active = flag;
        }

        let product = self
            .inventory_repo
            .get_product(&mut *tx, conversion.product_id)
            .await?
            .ok_or(AppError::EntityNotFound {
                entity: "Produto",
                id: conversion.product_id,
            })?;
        let label = product.label();

        validate_presentation(&label, &conversion.presentation_name, conversion.units_per_presentation)?;

        let updated = self
            .inventory_repo
            .update_conversion(&mut *tx, &conversion, &label)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    // --- POLÍTICA DE PREÇO ---
    /// Troca a margem (ou fixa um preço manual) e rederiva o preço de venda na mesma transação.
    pub async fn update_pricing_policy<'e, E>(
        &self,
        executor: E,
        product_id: i64,
        margin_type: MarginType,
        margin_value: Decimal,
        manual_price_active: bool,
        manual_sale_price: Option<Decimal>,
    ) -> Result<Product, AppError>
    where
        E: Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let catalog = lock_catalog(&mut *tx, &self.inventory_repo, &[product_id]).await?;
        let mut product = context(&catalog, product_id)?.product.clone();

        let manual_sale_price = manual_sale_price.map(round_money);
        if let Some(price) = manual_sale_price.filter(|p| *p < Decimal::ZERO) {
            return Err(AppError::NegativeUnitPrice {
                product: product.label(),
                price,
            });
        }
        if let Some(value) = manual_sale_price.filter(|p| *p > MAX_MONEY) {
            return Err(AppError::AmountOutOfRange {
                context: format!("preço de venda do produto {}", product.label()),
                value,
            });
        }
        if margin_value > MAX_QUANTITY {
            return Err(AppError::AmountOutOfRange {
                context: format!("margem do produto {}", product.label()),
                value: margin_value,
            });
        }

        let policy = PricingPolicy {
            margin_type,
            margin_value,
            manual_price_active,
        };
        let current_sale_price = match (manual_price_active, manual_sale_price) {
            (true, Some(price)) => price,
            _ => product.sale_price,
        };
        let sale_price = derive_sale_price(product.purchase_price, current_sale_price, &policy);

        self.inventory_repo
            .set_pricing_policy(&mut *tx, product_id, margin_type, margin_value, manual_price_active)
            .await?;
        self.inventory_repo
            .set_pricing(&mut *tx, product_id, product.purchase_price, sale_price)
            .await?;

        tx.commit().await?;

        product.margin_type = margin_type;
        product.margin_value = margin_value;
        product.manual_price_active = manual_price_active;
        product.sale_price = sale_price;
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentation_errors_name_the_product_by_label() {
        let err = validate_presentation("P001 (Cabo)", "  ", Decimal::ONE).unwrap_err();
        assert!(matches!(err, AppError::InvalidPresentation { ref product, .. } if product == "P001 (Cabo)"));

        let err = validate_presentation("P001 (Cabo)", " Rollo ", Decimal::ZERO).unwrap_err();
        match err {
            AppError::InvalidConversionFactor { presentation, product, .. } => {
                assert_eq!(presentation, "Rollo");
                assert_eq!(product, "P001 (Cabo)");
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn factor_must_fit_the_recorded_scale() {
        assert!(validate_presentation("P001 (Cabo)", "Rollo", MAX_QUANTITY).is_ok());
        assert!(validate_presentation("P001 (Cabo)", "Rollo", MAX_QUANTITY + Decimal::ONE).is_err());
        // 0,00001 arredonda para zero antes da validação
        assert!(validate_presentation("P001 (Cabo)", "Rollo", round_quantity(Decimal::new(1, 5))).is_err());
    }
}
