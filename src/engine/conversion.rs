// src/engine/conversion.rs
//
// Resolução de apresentações (caixa, rolo, metro...) para a unidade base do produto.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    common::error::{AppError, AppResult},
    models::inventory::{Conversion, Product},
};

/// Marcador literal aceito como "sem conversão", além do nome da própria unidade base.
pub const BASE_UNIT_MARKER: &str = "base";

/// Unidades base que só admitem totais inteiros.
const INTEGER_UNIT_NAMES: [&str; 2] = ["unidad", "unit"];

/// Casas decimais gravadas para quantidades e estoque.
pub const QUANTITY_SCALE: u32 = 4;

/// Maior quantidade que cabe em NUMERIC(14, 4): 9.999.999.999,9999.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, QUANTITY_SCALE);

/// Arredonda quantidades para a escala gravada, metade para cima.
pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Qual flag da conversão a operação exige.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Purchase,
    Sale,
    // Ajustes manuais aceitam qualquer conversão ativa.
    Movement,
}

/// Resultado de uma resolução: de onde veio o fator e quanto vale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub conversion_id: Option<i64>,
    pub factor: Decimal,
}

impl Resolution {
    pub const BASE: Resolution = Resolution {
        conversion_id: None,
        factor: Decimal::ONE,
    };
}

/// Quantidade de uma linha já normalizada e convertida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuantity {
    pub conversion_id: Option<i64>,
    pub presentation_name: Option<String>, // None = unidade base
    pub factor: Decimal,
    pub quantity: Decimal, // Na apresentação, 4 casas
    pub base_quantity: Decimal,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Um produto carregado junto com sua tabela de conversão.
#[derive(Debug, Clone)]
pub struct ProductContext {
    pub product: Product,
    pub conversions: Vec<Conversion>,
}

impl ProductContext {
    pub fn new(product: Product, conversions: Vec<Conversion>) -> Self {
        Self { product, conversions }
    }

    pub fn is_base_presentation(&self, presentation: Option<&str>) -> bool {
        match presentation.map(normalize) {
            None => true,
            Some(name) => {
                name.is_empty()
                    || name == BASE_UNIT_MARKER
                    || name == normalize(&self.product.base_unit_name)
            }
        }
    }

    /// Só conversões ativas e habilitadas para a direção pedida.
    pub fn find_conversion(&self, presentation: &str, direction: Direction) -> Option<&Conversion> {
        let wanted = normalize(presentation);
        self.conversions.iter().find(|c| {
            let enabled = match direction {
                Direction::Purchase => c.for_purchase,
                Direction::Sale => c.for_sale,
                Direction::Movement => true,
            };
            enabled && c.is_active && normalize(&c.presentation_name) == wanted
        })
    }

    /// Encontra o fator da apresentação. O fator é validado a cada chamada,
    /// já que a tabela pode ser editada entre documentos.
    pub fn resolve(&self, presentation: Option<&str>, direction: Direction) -> AppResult<Resolution> {
        if self.is_base_presentation(presentation) {
            return Ok(Resolution::BASE);
        }
        let name = presentation.unwrap_or_default();

        let conversion = self
            .find_conversion(name, direction)
            .ok_or_else(|| AppError::InvalidPresentation {
                presentation: name.trim().to_string(),
                product: self.product.label(),
            })?;

        if conversion.units_per_presentation <= Decimal::ZERO {
            return Err(AppError::InvalidConversionFactor {
                presentation: conversion.presentation_name.clone(),
                product: self.product.label(),
                factor: conversion.units_per_presentation,
            });
        }

        Ok(Resolution {
            conversion_id: Some(conversion.id),
            factor: conversion.units_per_presentation,
        })
    }

    pub fn invalid_quantity(&self, quantity: Decimal) -> AppError {
        AppError::InvalidQuantity {
            product: self.product.label(),
            quantity,
        }
    }

    /// Normaliza a quantidade para 4 casas, resolve a apresentação e converte para unidade base.
    /// Quantidade que arredonda para zero, ou que estoura a coluna, é rejeitada.
    pub fn resolve_quantity(
        &self,
        quantity: Decimal,
        presentation: Option<&str>,
        direction: Direction,
    ) -> AppResult<ResolvedQuantity> {
        let in_range = |q: &Decimal| *q > Decimal::ZERO && *q <= MAX_QUANTITY;

        let rounded = round_quantity(quantity);
        if !in_range(&rounded) {
            return Err(self.invalid_quantity(quantity));
        }

        let resolution = self.resolve(presentation, direction)?;
        let base_quantity = rounded
            .checked_mul(resolution.factor)
            .map(round_quantity)
            .filter(in_range)
            .ok_or_else(|| self.invalid_quantity(quantity))?;

        Ok(ResolvedQuantity {
            conversion_id: resolution.conversion_id,
            presentation_name: resolution
                .conversion_id
                .and(presentation.map(|p| p.trim().to_string())),
            factor: resolution.factor,
            quantity: rounded,
            base_quantity,
        })
    }

    pub fn is_integer_unit(&self) -> bool {
        let unit = normalize(&self.product.base_unit_name);
        INTEGER_UNIT_NAMES.contains(&unit.as_str())
    }

    /// Aplica a regra de unidade inteira sobre o total já somado.
    pub fn ensure_whole_units(&self, total: Decimal) -> AppResult<()> {
        if self.is_integer_unit() && !total.fract().is_zero() {
            return Err(AppError::FractionalUnitViolation {
                product: self.product.label(),
                total,
            });
        }
        Ok(())
    }
}
