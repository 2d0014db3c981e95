// src/engine/pricing.rs
//
// Custo médio ponderado sobre as compras concluídas e preço de venda derivado da margem.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    common::error::{AppError, AppResult},
    models::{
        inventory::{MarginType, Product},
        purchases::PurchaseDetail,
    },
};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Casas decimais gravadas para valores monetários.
pub const MONEY_SCALE: u32 = 2;

/// Maior valor que cabe em NUMERIC(14, 2): 999.999.999.999,99.
pub const MAX_MONEY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, MONEY_SCALE);

/// Arredonda valores monetários para 2 casas, metade para cima.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Uma linha de compra concluída, com o fator gravado junto com ela.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostLine {
    pub quantity: Decimal,   // Na apresentação
    pub unit_price: Decimal, // Por apresentação
    pub factor: Decimal,     // Unidades base por apresentação
}

/// Recalcula o custo do zero sobre todo o histórico. `None` quando não há unidades recebidas.
pub fn weighted_average_cost(product: &Product, lines: &[CostLine]) -> AppResult<Option<Decimal>> {
    let overflow = |value: Decimal| AppError::AmountOutOfRange {
        context: format!("custo médio do produto {}", product.label()),
        value,
    };

    let mut spent = Decimal::ZERO;
    let mut base_units = Decimal::ZERO;
    for line in lines {
        spent = line
            .unit_price
            .checked_mul(line.quantity)
            .and_then(|v| spent.checked_add(v))
            .ok_or_else(|| overflow(line.unit_price))?;
        base_units = line
            .quantity
            .checked_mul(line.factor)
            .and_then(|v| base_units.checked_add(v))
            .ok_or_else(|| overflow(line.quantity))?;
    }

    if base_units > Decimal::ZERO {
        let average = spent.checked_div(base_units).ok_or_else(|| overflow(spent))?;
        Ok(Some(round_money(average)))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub margin_type: MarginType,
    pub margin_value: Decimal,
    pub manual_price_active: bool,
}

impl From<&Product> for PricingPolicy {
    fn from(product: &Product) -> Self {
        Self {
            margin_type: product.margin_type,
            margin_value: product.margin_value,
            manual_price_active: product.manual_price_active,
        }
    }
}

/// O preço de venda nunca fica abaixo do custo, qualquer que seja a margem.
/// Margens absurdas saturam no limite da coluna.
pub fn derive_sale_price(
    purchase_price: Decimal,
    current_sale_price: Decimal,
    policy: &PricingPolicy,
) -> Decimal {
    if policy.manual_price_active {
        return current_sale_price.max(purchase_price);
    }

    let candidate = match policy.margin_type {
        MarginType::Percentage => (policy.margin_value / HUNDRED)
            .checked_add(Decimal::ONE)
            .and_then(|m| purchase_price.checked_mul(m)),
        MarginType::Fixed => purchase_price.checked_add(policy.margin_value),
    };

    candidate
        .map(round_money)
        .unwrap_or(MAX_MONEY)
        .min(MAX_MONEY)
        .max(purchase_price)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
}

/// Custo recalculado seguido do preço derivado.
/// Sem compras concluídas o custo atual é mantido.
pub fn reprice(product: &Product, lines: &[CostLine]) -> AppResult<Pricing> {
    let purchase_price = weighted_average_cost(product, lines)?.unwrap_or(product.purchase_price);
    let sale_price = derive_sale_price(
        purchase_price,
        product.sale_price,
        &PricingPolicy::from(product),
    );
    Ok(Pricing {
        purchase_price,
        sale_price,
    })
}

/// Linhas de custo a partir dos itens gravados, sem consultar a tabela de conversão atual.
pub fn cost_lines(product_id: i64, details: &[PurchaseDetail]) -> Vec<CostLine> {
    details
        .iter()
        .filter(|d| d.product_id == product_id)
        .map(|d| CostLine {
            quantity: d.quantity,
            unit_price: d.unit_price,
            factor: d.units_per_presentation,
        })
        .collect()
}
