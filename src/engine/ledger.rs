// src/engine/ledger.rs
//
// Aritmética de estoque em unidade base e planejamento de movimentações manuais.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    common::error::{AppError, AppResult},
    engine::conversion::{Direction, ProductContext, MAX_QUANTITY},
    models::inventory::{MovementType, Product},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    Increase,
    Decrease,
}

impl MovementType {
    pub fn effect(&self) -> StockEffect {
        match self {
            MovementType::Shrinkage
            | MovementType::NegativeAdjustment
            | MovementType::InternalUse => StockEffect::Decrease,
            MovementType::PositiveAdjustment | MovementType::Return => StockEffect::Increase,
        }
    }
}

/// O que fazer quando uma baixa deixaria o estoque negativo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeStock {
    Reject,
    // Só a anulação de compra usa esta opção.
    AllowWithWarning,
}

/// Fotografia antes/depois de uma alteração de estoque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: i64,
    pub before: Decimal,
    pub after: Decimal,
}

impl StockChange {
    pub fn delta(&self) -> Decimal {
        self.after - self.before
    }

    pub fn went_negative(&self) -> bool {
        self.after < Decimal::ZERO
    }
}

/// Calcula o novo estoque sem gravar nada; a validação acontece antes de qualquer escrita.
/// Entradas nunca são bloqueadas, mesmo partindo de um saldo negativo.
pub fn apply_delta(product: &Product, delta: Decimal, policy: NegativeStock) -> AppResult<StockChange> {
    let after = product
        .stock
        .checked_add(delta)
        .filter(|a| a.abs() <= MAX_QUANTITY)
        .ok_or_else(|| AppError::InvalidQuantity {
            product: product.label(),
            quantity: delta.abs(),
        })?;
    if delta < Decimal::ZERO && after < Decimal::ZERO && policy == NegativeStock::Reject {
        return Err(AppError::InsufficientStock {
            product: product.label(),
            available: product.stock,
            requested: -delta,
        });
    }
    Ok(StockChange {
        product_id: product.id,
        before: product.stock,
        after,
    })
}

/// Estoque igual ou abaixo do mínimo configurado (mínimo zero desliga o alerta).
pub fn is_low_stock(product: &Product, stock: Decimal) -> bool {
    product.min_stock > Decimal::ZERO && stock <= product.min_stock
}

// ---
// Movimentação manual
// ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementLine {
    pub presentation: Option<String>,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDetail {
    pub conversion_id: Option<i64>,
    pub presentation_name: Option<String>,
    pub quantity: Decimal,
    pub base_quantity: Decimal,
}

#[derive(Debug, Clone)]
pub struct MovementPlan {
    pub movement_type: MovementType,
    pub total: Decimal,
    pub change: StockChange,
    pub details: Vec<PlannedDetail>,
}

pub fn plan_movement(
    ctx: &ProductContext,
    movement_type: MovementType,
    lines: &[MovementLine],
) -> AppResult<MovementPlan> {
    let mut details = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;

    for line in lines {
        let resolved =
            ctx.resolve_quantity(line.quantity, line.presentation.as_deref(), Direction::Movement)?;
        total = total
            .checked_add(resolved.base_quantity)
            .filter(|t| *t <= MAX_QUANTITY)
            .ok_or_else(|| ctx.invalid_quantity(line.quantity))?;

        details.push(PlannedDetail {
            conversion_id: resolved.conversion_id,
            presentation_name: resolved.presentation_name,
            quantity: resolved.quantity,
            base_quantity: resolved.base_quantity,
        });
    }

    if total <= Decimal::ZERO {
        return Err(AppError::EmptyOrNonPositiveMovement {
            product: ctx.product.label(),
            total,
        });
    }
    ctx.ensure_whole_units(total)?;

    let delta = match movement_type.effect() {
        StockEffect::Increase => total,
        StockEffect::Decrease => -total,
    };
    let change = apply_delta(&ctx.product, delta, NegativeStock::Reject)?;

    Ok(MovementPlan {
        movement_type,
        total,
        change,
        details,
    })
}
