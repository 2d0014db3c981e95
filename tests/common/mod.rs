//! Dados compartilhados pelos testes de integração.
//!
//! Produtos e conversões são montados em memória; o motor nunca acessa o banco.

#![allow(dead_code)]

use std::str::FromStr;

use backoffice::{
    engine::{
        conversion::ProductContext,
        documents::Catalog,
        ledger::StockChange,
    },
    models::inventory::{Conversion, MarginType, Product},
};
use chrono::Utc;
use rust_decimal::Decimal;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn product(id: i64, base_unit: &str, stock: &str) -> Product {
    let now = Utc::now();
    Product {
        id,
        code: format!("P{id:03}"),
        name: format!("Produto {id}"),
        unit_id: 1,
        base_unit_name: base_unit.to_string(),
        stock: dec(stock),
        min_stock: Decimal::ZERO,
        purchase_price: Decimal::ZERO,
        sale_price: Decimal::ZERO,
        margin_type: MarginType::Percentage,
        margin_value: Decimal::ZERO,
        manual_price_active: false,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn conversion(id: i64, product_id: i64, name: &str, factor: &str) -> Conversion {
    let now = Utc::now();
    Conversion {
        id,
        product_id,
        presentation_name: name.to_string(),
        units_per_presentation: dec(factor),
        for_purchase: true,
        for_sale: true,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn catalog(contexts: Vec<ProductContext>) -> Catalog {
    contexts.into_iter().map(|ctx| (ctx.product.id, ctx)).collect()
}

/// Grava as alterações planejadas no catálogo, como o repositório faria.
pub fn commit(catalog: &mut Catalog, changes: &[StockChange]) {
    for change in changes {
        let ctx = catalog.get_mut(&change.product_id).unwrap();
        assert_eq!(ctx.product.stock, change.before, "plano calculado sobre estoque desatualizado");
        ctx.product.stock = change.after;
    }
}

pub fn stock(catalog: &Catalog, product_id: i64) -> Decimal {
    catalog[&product_id].product.stock
}
