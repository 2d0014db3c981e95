//! Custo médio ponderado e preço de venda derivado da margem.

mod common;

use backoffice::{
    common::error::AppError,
    engine::pricing::{
        cost_lines, derive_sale_price, reprice, round_money, weighted_average_cost, CostLine, PricingPolicy,
        MAX_MONEY,
    },
    models::{
        inventory::{MarginType, Product},
        purchases::PurchaseDetail,
    },
};
use common::{dec, product};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn line(quantity: &str, unit_price: &str, factor: &str) -> CostLine {
    CostLine {
        quantity: dec(quantity),
        unit_price: dec(unit_price),
        factor: dec(factor),
    }
}

fn policy(margin_type: MarginType, margin_value: &str) -> PricingPolicy {
    PricingPolicy {
        margin_type,
        margin_value: dec(margin_value),
        manual_price_active: false,
    }
}

fn detail(id: i64, product_id: i64, quantity: &str, unit_price: &str, presentation: Option<(&str, &str)>) -> PurchaseDetail {
    let factor = presentation.map_or(Decimal::ONE, |(_, f)| dec(f));
    PurchaseDetail {
        id,
        purchase_id: 1,
        product_id,
        quantity: dec(quantity),
        unit_price: dec(unit_price),
        presentation_name: presentation.map(|(name, _)| name.to_string()),
        subtotal: dec(quantity) * dec(unit_price),
        conversion_id: presentation.map(|_| 10),
        units_per_presentation: factor,
        base_quantity: dec(quantity) * factor,
    }
}

fn metro() -> Product {
    product(1, "Metro", "0")
}

fn average(lines: &[CostLine]) -> Option<Decimal> {
    weighted_average_cost(&metro(), lines).unwrap()
}

#[test]
fn weighted_average_of_two_purchases() {
    let cost = average(&[line("2", "100", "1"), line("3", "50", "1")]);
    assert_eq!(cost, Some(dec("70.00")));
}

#[test]
fn weighted_average_uses_base_units_of_each_presentation() {
    // 1 rolo (50 m) a 200 + 10 m a 5 = 250 / 60 m
    let cost = average(&[line("1", "200", "50"), line("10", "5", "1")]);
    assert_eq!(cost, Some(dec("4.17")));
}

#[test]
fn no_received_units_means_no_cost() {
    assert_eq!(average(&[]), None);
}

#[test]
fn overflowing_cost_is_an_error_not_a_panic() {
    let huge = CostLine {
        quantity: dec("2"),
        unit_price: Decimal::MAX,
        factor: Decimal::ONE,
    };
    let err = weighted_average_cost(&metro(), &[huge]).unwrap_err();
    assert!(matches!(err, AppError::AmountOutOfRange { .. }));
}

#[test]
fn money_rounds_half_away_from_zero() {
    assert_eq!(round_money(dec("1.005")), dec("1.01"));
    assert_eq!(round_money(dec("1.004")), dec("1.00"));
}

#[test]
fn fixed_margin_adds_to_cost() {
    let price = derive_sale_price(dec("50"), dec("0"), &policy(MarginType::Fixed, "10"));
    assert_eq!(price, dec("60"));
}

#[test]
fn percentage_margin_multiplies_cost() {
    let price = derive_sale_price(dec("70"), dec("0"), &policy(MarginType::Percentage, "30"));
    assert_eq!(price, dec("91.00"));
}

#[test]
fn sale_price_never_drops_below_cost() {
    // Margem negativa só é possível fora da API; o piso ainda vale.
    let price = derive_sale_price(dec("50"), dec("0"), &policy(MarginType::Percentage, "-50"));
    assert_eq!(price, dec("50"));
}

#[test]
fn absurd_margins_saturate_at_the_money_limit() {
    let price = derive_sale_price(dec("100"), dec("0"), &policy(MarginType::Percentage, "79228162514264337593543950"));
    assert_eq!(price, MAX_MONEY);
    let price = derive_sale_price(dec("100"), dec("0"), &policy(MarginType::Fixed, "79228162514264337593543950335"));
    assert_eq!(price, MAX_MONEY);
}

#[test]
fn manual_price_is_kept_but_floored_at_cost() {
    let manual = PricingPolicy {
        margin_type: MarginType::Percentage,
        margin_value: dec("30"),
        manual_price_active: true,
    };
    assert_eq!(derive_sale_price(dec("50"), dec("80"), &manual), dec("80"));
    assert_eq!(derive_sale_price(dec("90"), dec("80"), &manual), dec("90"));
}

#[test]
fn reprice_keeps_current_cost_without_completed_purchases() {
    let mut p = product(1, "Metro", "0");
    p.purchase_price = dec("12.50");
    p.margin_type = MarginType::Fixed;
    p.margin_value = dec("2.50");

    let pricing = reprice(&p, &[]).unwrap();
    assert_eq!(pricing.purchase_price, dec("12.50"));
    assert_eq!(pricing.sale_price, dec("15.00"));
}

#[test]
fn cost_lines_use_the_factor_recorded_with_each_item() {
    // O rolo valia 50 m quando a compra foi gravada; a tabela atual não importa
    let details = vec![
        detail(1, 1, "1", "200", Some(("Rollo", "50"))),
        detail(2, 1, "10", "5", None),
        // Item de outro produto na mesma compra
        detail(3, 2, "99", "1", None),
    ];

    let lines = cost_lines(1, &details);
    assert_eq!(lines, vec![line("1", "200", "50"), line("10", "5", "1")]);
    assert_eq!(average(&lines), Some(dec("4.17")));
}

#[test]
fn recompute_is_idempotent() {
    let mut p = product(1, "Metro", "0");
    p.margin_type = MarginType::Percentage;
    p.margin_value = dec("25");
    let lines = [line("2", "100", "1"), line("3", "50", "1")];

    let first = reprice(&p, &lines).unwrap();
    p.purchase_price = first.purchase_price;
    p.sale_price = first.sale_price;
    let second = reprice(&p, &lines).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.purchase_price, dec("70.00"));
    assert_eq!(first.sale_price, dec("87.50"));
}

proptest! {
    #[test]
    fn derived_price_is_at_least_cost(
        cost in 0i64..1_000_000,
        margin in -10_000i64..10_000,
        fixed in any::<bool>(),
        manual in any::<bool>(),
        current in 0i64..1_000_000,
    ) {
        let purchase_price = Decimal::new(cost, 2);
        let policy = PricingPolicy {
            margin_type: if fixed { MarginType::Fixed } else { MarginType::Percentage },
            margin_value: Decimal::new(margin, 2),
            manual_price_active: manual,
        };
        let price = derive_sale_price(purchase_price, Decimal::new(current, 2), &policy);
        prop_assert!(price >= purchase_price);
    }

    #[test]
    fn average_cost_lies_between_cheapest_and_dearest_base_price(
        prices in prop::collection::vec((1i64..100, 1i64..100_000), 1..8)
    ) {
        let lines: Vec<CostLine> = prices
            .iter()
            .map(|(qty, price)| CostLine {
                quantity: Decimal::from(*qty),
                unit_price: Decimal::new(*price, 2),
                factor: Decimal::ONE,
            })
            .collect();
        let cost = average(&lines).unwrap();
        let min = lines.iter().map(|l| l.unit_price).min().unwrap();
        let max = lines.iter().map(|l| l.unit_price).max().unwrap();
        prop_assert!(cost >= round_money(min) && cost <= round_money(max));
    }
}
