//! Estados de compra e venda: transições permitidas, anulada como estado final
//! e as regras de cabeçalho da venda.

mod common;

use backoffice::{
    common::error::AppError,
    engine::documents::{
        check_new_purchase_status, check_purchase_action, check_sale_request, check_sale_void, DocumentLine,
        PurchaseAction,
    },
    models::{purchases::PurchaseStatus, sales::SaleStatus},
};
use common::dec;

const ALL: [PurchaseStatus; 3] = [PurchaseStatus::Pending, PurchaseStatus::Completed, PurchaseStatus::Voided];

fn line() -> DocumentLine {
    DocumentLine {
        product_id: 1,
        quantity: dec("1"),
        unit_price: None,
        presentation: None,
    }
}

#[test]
fn transition_table_is_exactly_the_allowed_pairs() {
    use PurchaseStatus::*;
    let allowed = [(Pending, Completed), (Pending, Voided), (Completed, Voided)];

    for from in ALL {
        for to in ALL {
            assert_eq!(
                from.can_transition_to(to),
                allowed.contains(&(from, to)),
                "{} -> {}",
                from.as_str(),
                to.as_str()
            );
        }
    }
}

#[test]
fn voided_purchase_is_terminal() {
    for to in ALL {
        assert!(!PurchaseStatus::Voided.can_transition_to(to));
    }
    for action in [PurchaseAction::Edit, PurchaseAction::Complete, PurchaseAction::Void] {
        assert!(check_purchase_action(7, PurchaseStatus::Voided, action).is_err());
    }
}

#[test]
fn only_pending_purchases_are_editable() {
    assert!(PurchaseStatus::Pending.is_editable());
    assert!(!PurchaseStatus::Completed.is_editable());
    assert!(!PurchaseStatus::Voided.is_editable());

    assert!(check_purchase_action(1, PurchaseStatus::Pending, PurchaseAction::Edit).is_ok());
    let err = check_purchase_action(4, PurchaseStatus::Completed, PurchaseAction::Edit).unwrap_err();
    match err {
        AppError::InvalidDocumentState { document, id, state, action } => {
            assert_eq!(document, "Compra");
            assert_eq!(id, 4);
            assert_eq!(state, "completed");
            assert_eq!(action, "editar");
        }
        other => panic!("erro inesperado: {other:?}"),
    }
}

#[test]
fn completing_requires_a_pending_purchase() {
    assert!(check_purchase_action(1, PurchaseStatus::Pending, PurchaseAction::Complete).is_ok());
    for status in [PurchaseStatus::Completed, PurchaseStatus::Voided] {
        assert!(matches!(
            check_purchase_action(1, status, PurchaseAction::Complete),
            Err(AppError::InvalidDocumentState { action: "concluir", .. })
        ));
    }
}

#[test]
fn pending_and_completed_purchases_can_be_voided() {
    assert!(check_purchase_action(1, PurchaseStatus::Pending, PurchaseAction::Void).is_ok());
    assert!(check_purchase_action(1, PurchaseStatus::Completed, PurchaseAction::Void).is_ok());
    assert!(matches!(
        check_purchase_action(1, PurchaseStatus::Voided, PurchaseAction::Void),
        Err(AppError::InvalidDocumentState { action: "anular", .. })
    ));
}

#[test]
fn purchases_cannot_be_created_already_voided() {
    assert!(check_new_purchase_status(PurchaseStatus::Pending).is_ok());
    assert!(check_new_purchase_status(PurchaseStatus::Completed).is_ok());
    assert!(matches!(
        check_new_purchase_status(PurchaseStatus::Voided),
        Err(AppError::InvalidDocumentState { action: "criar", .. })
    ));
}

#[test]
fn invoice_requires_a_customer() {
    assert!(matches!(
        check_sale_request(None, true, &[line()]),
        Err(AppError::InvoiceRequiresCustomer)
    ));
    assert!(check_sale_request(Some(3), true, &[line()]).is_ok());
    assert!(check_sale_request(None, false, &[line()]).is_ok());
}

#[test]
fn sale_without_lines_is_rejected() {
    assert!(matches!(check_sale_request(Some(3), false, &[]), Err(AppError::EmptyDocument)));
    // Falta de cliente é reportada antes da lista vazia
    assert!(matches!(check_sale_request(None, true, &[]), Err(AppError::InvoiceRequiresCustomer)));
}

#[test]
fn voided_sale_cannot_be_voided_again() {
    assert!(check_sale_void(9, SaleStatus::Active).is_ok());
    match check_sale_void(9, SaleStatus::Voided).unwrap_err() {
        AppError::InvalidDocumentState { document, id, state, action } => {
            assert_eq!(document, "Venda");
            assert_eq!(id, 9);
            assert_eq!(state, "voided");
            assert_eq!(action, "anular");
        }
        other => panic!("erro inesperado: {other:?}"),
    }
}
