// src/engine/documents.rs
//
// Itens de compra/venda: preço, quantidade em unidade base e saldo por produto.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    common::error::{AppError, AppResult},
    engine::{
        conversion::{Direction, ProductContext, MAX_QUANTITY},
        ledger::{apply_delta, NegativeStock, StockChange},
        pricing::{round_money, MAX_MONEY},
    },
    models::{
        purchases::{PurchaseDetail, PurchaseStatus},
        sales::{SaleDetail, SaleStatus},
    },
};

/// Produtos do documento indexados por id. BTreeMap mantém a ordem de bloqueio estável.
pub type Catalog = BTreeMap<i64, ProductContext>;

/// Item como chega do cliente.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLine {
    pub product_id: i64,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub presentation: Option<String>,
}

/// Item validado, pronto para gravar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: Decimal, // 4 casas
    pub unit_price: Decimal, // 2 casas
    pub presentation_name: Option<String>,
    pub conversion_id: Option<i64>,
    pub units_per_presentation: Decimal,
    pub subtotal: Decimal, // 2 casas
    pub base_quantity: Decimal,
}

/// Item já gravado, usado nas reversões. A quantidade base é a que foi gravada,
/// nunca reconvertida pela tabela atual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedLine {
    pub product_id: i64,
    pub base_quantity: Decimal,
}

impl From<&PurchaseDetail> for RecordedLine {
    fn from(detail: &PurchaseDetail) -> Self {
        Self {
            product_id: detail.product_id,
            base_quantity: detail.base_quantity,
        }
    }
}

impl From<&SaleDetail> for RecordedLine {
    fn from(detail: &SaleDetail) -> Self {
        Self {
            product_id: detail.product_id,
            base_quantity: detail.base_quantity,
        }
    }
}

/// Qual preço do produto usar quando o item não informa preço.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFallback {
    PurchasePrice,
    SalePrice,
}

pub fn product_ids(lines: &[DocumentLine]) -> BTreeSet<i64> {
    lines.iter().map(|l| l.product_id).collect()
}

pub fn context(catalog: &Catalog, product_id: i64) -> AppResult<&ProductContext> {
    catalog
        .get(&product_id)
        .ok_or(AppError::EntityNotFound {
            entity: "Produto",
            id: product_id,
        })
}

fn active_context(catalog: &Catalog, product_id: i64) -> AppResult<&ProductContext> {
    let ctx = context(catalog, product_id)?;
    if !ctx.product.is_active {
        return Err(AppError::EntityNotFound {
            entity: "Produto",
            id: product_id,
        });
    }
    Ok(ctx)
}

fn money_out_of_range(ctx: &ProductContext, value: Decimal) -> AppError {
    AppError::AmountOutOfRange {
        context: format!("produto {}", ctx.product.label()),
        value,
    }
}

/// Preço informado arredondado para centavos; zero (ou que arredonda para zero) usa o cadastro.
fn resolve_unit_price(
    ctx: &ProductContext,
    explicit: Option<Decimal>,
    fallback: PriceFallback,
) -> AppResult<Decimal> {
    let price = match explicit.map(round_money) {
        Some(price) if !price.is_zero() => price,
        _ => {
            let fallback_price = match fallback {
                PriceFallback::PurchasePrice => ctx.product.purchase_price,
                PriceFallback::SalePrice => ctx.product.sale_price,
            };
            if fallback_price.is_zero() {
                return Err(AppError::MissingUnitPrice {
                    product: ctx.product.label(),
                });
            }
            fallback_price
        }
    };

    if price < Decimal::ZERO {
        return Err(AppError::NegativeUnitPrice {
            product: ctx.product.label(),
            price,
        });
    }
    if price > MAX_MONEY {
        return Err(money_out_of_range(ctx, price));
    }
    Ok(price)
}

/// Valida cada item (produto ativo, quantidade > 0, apresentação, preço) e calcula subtotais.
/// Quantidades e preços saem já na escala gravada, então o total bate com a soma dos itens.
pub fn price_lines(
    catalog: &Catalog,
    lines: &[DocumentLine],
    direction: Direction,
    fallback: PriceFallback,
) -> AppResult<Vec<PricedLine>> {
    if lines.is_empty() {
        return Err(AppError::EmptyDocument);
    }

    lines
        .iter()
        .map(|line| {
            let ctx = active_context(catalog, line.product_id)?;
            let resolved =
                ctx.resolve_quantity(line.quantity, line.presentation.as_deref(), direction)?;
            let unit_price = resolve_unit_price(ctx, line.unit_price, fallback)?;

            let subtotal = resolved
                .quantity
                .checked_mul(unit_price)
                .map(round_money)
                .filter(|s| *s <= MAX_MONEY)
                .ok_or_else(|| money_out_of_range(ctx, unit_price))?;

            Ok(PricedLine {
                product_id: line.product_id,
                quantity: resolved.quantity,
                unit_price,
                presentation_name: resolved.presentation_name,
                conversion_id: resolved.conversion_id,
                units_per_presentation: resolved.factor,
                subtotal,
                base_quantity: resolved.base_quantity,
            })
        })
        .collect()
}

pub fn document_total(lines: &[PricedLine]) -> AppResult<Decimal> {
    let out_of_range = |value| AppError::AmountOutOfRange {
        context: "total do documento".to_string(),
        value,
    };

    let mut total = Decimal::ZERO;
    for line in lines {
        total = total
            .checked_add(line.subtotal)
            .filter(|t| *t <= MAX_MONEY)
            .ok_or_else(|| out_of_range(line.subtotal))?;
    }
    Ok(total)
}

fn add_to_total(
    catalog: &Catalog,
    totals: &mut BTreeMap<i64, Decimal>,
    product_id: i64,
    base_quantity: Decimal,
) -> AppResult<()> {
    let ctx = context(catalog, product_id)?;
    let entry = totals.entry(product_id).or_insert(Decimal::ZERO);
    *entry = entry
        .checked_add(base_quantity)
        .filter(|t| *t <= MAX_QUANTITY)
        .ok_or_else(|| ctx.invalid_quantity(base_quantity))?;
    Ok(())
}

/// Soma em unidade base por produto, aplicando a regra de unidade inteira sobre cada soma.
pub fn base_totals(catalog: &Catalog, lines: &[PricedLine]) -> AppResult<BTreeMap<i64, Decimal>> {
    let mut totals = BTreeMap::new();
    for line in lines {
        add_to_total(catalog, &mut totals, line.product_id, line.base_quantity)?;
    }
    for (product_id, total) in &totals {
        context(catalog, *product_id)?.ensure_whole_units(*total)?;
    }
    Ok(totals)
}

/// Soma as quantidades base gravadas nos itens, por produto.
pub fn recorded_totals(
    catalog: &Catalog,
    lines: impl IntoIterator<Item = RecordedLine>,
) -> AppResult<BTreeMap<i64, Decimal>> {
    let mut totals = BTreeMap::new();
    for line in lines {
        add_to_total(catalog, &mut totals, line.product_id, line.base_quantity)?;
    }
    Ok(totals)
}

/// Diferença líquida (novo - antigo) por produto; produtos sem variação ficam de fora.
pub fn net_deltas(
    old: &BTreeMap<i64, Decimal>,
    new: &BTreeMap<i64, Decimal>,
) -> BTreeMap<i64, Decimal> {
    let ids: BTreeSet<i64> = old.keys().chain(new.keys()).copied().collect();
    ids.into_iter()
        .filter_map(|id| {
            let before = old.get(&id).copied().unwrap_or(Decimal::ZERO);
            let after = new.get(&id).copied().unwrap_or(Decimal::ZERO);
            let delta = after - before;
            (!delta.is_zero()).then_some((id, delta))
        })
        .collect()
}

pub fn negate(totals: &BTreeMap<i64, Decimal>) -> BTreeMap<i64, Decimal> {
    totals.iter().map(|(id, qty)| (*id, -*qty)).collect()
}

/// Valida todas as variações contra o estoque atual antes de qualquer escrita.
pub fn plan_stock_changes(
    catalog: &Catalog,
    deltas: &BTreeMap<i64, Decimal>,
    policy: NegativeStock,
) -> AppResult<Vec<StockChange>> {
    deltas
        .iter()
        .map(|(product_id, delta)| {
            let ctx = context(catalog, *product_id)?;
            apply_delta(&ctx.product, *delta, policy)
        })
        .collect()
}

// ---
// Estados dos documentos
// ---

const PURCHASE: &str = "Compra";
const SALE: &str = "Venda";

/// Operações sobre uma compra já gravada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseAction {
    Edit,
    Complete,
    Void,
}

impl PurchaseAction {
    pub fn verb(&self) -> &'static str {
        match self {
            PurchaseAction::Edit => "editar",
            PurchaseAction::Complete => "concluir",
            PurchaseAction::Void => "anular",
        }
    }

    fn allowed_from(&self, status: PurchaseStatus) -> bool {
        match self {
            PurchaseAction::Edit => status.is_editable(),
            PurchaseAction::Complete => status.can_transition_to(PurchaseStatus::Completed),
            PurchaseAction::Void => status.can_transition_to(PurchaseStatus::Voided),
        }
    }
}

pub fn check_purchase_action(id: i64, status: PurchaseStatus, action: PurchaseAction) -> AppResult<()> {
    if action.allowed_from(status) {
        return Ok(());
    }
    Err(AppError::InvalidDocumentState {
        document: PURCHASE,
        id,
        state: status.as_str().to_string(),
        action: action.verb(),
    })
}

/// Compras nascem pendentes ou concluídas; nunca anuladas.
pub fn check_new_purchase_status(status: PurchaseStatus) -> AppResult<()> {
    if status == PurchaseStatus::Voided {
        return Err(AppError::InvalidDocumentState {
            document: PURCHASE,
            id: 0,
            state: status.as_str().to_string(),
            action: "criar",
        });
    }
    Ok(())
}

/// Regras de cabeçalho da venda, verificadas antes de tocar no banco.
pub fn check_sale_request(
    customer_id: Option<i64>,
    issue_invoice: bool,
    lines: &[DocumentLine],
) -> AppResult<()> {
    if issue_invoice && customer_id.is_none() {
        return Err(AppError::InvoiceRequiresCustomer);
    }
    if lines.is_empty() {
        return Err(AppError::EmptyDocument);
    }
    Ok(())
}

pub fn check_sale_void(id: i64, status: SaleStatus) -> AppResult<()> {
    if status == SaleStatus::Voided {
        return Err(AppError::InvalidDocumentState {
            document: SALE,
            id,
            state: status.as_str().to_string(),
            action: "anular",
        });
    }
    Ok(())
}
