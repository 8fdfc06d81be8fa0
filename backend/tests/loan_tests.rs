//! Tool loan tests
//!
//! Covers the loan overlay on owned stock and rented batches:
//! - Availability = quantity minus open loans, floored at zero
//! - Loans never move a balance
//! - OPEN → RETURNED is the only transition
//! - Concurrent loans never over-commit an item

mod common;

use common::{date, dec, loan_of, movement, rented_batch, storekeeper, Site};
use rust_decimal::Decimal;
use shared::{ItemOrigin, LoanStatus, MovementType, ToolFlag};
use site_stock_backend::error::AppError;
use site_stock_backend::services::loan::ReturnLoanInput;
use uuid::Uuid;

// ============================================================================
// Availability
// ============================================================================

#[tokio::test]
async fn test_loan_reduces_availability_not_quantity() {
    let site = Site::new();
    let drills = site
        .stock_item("Furadeira de impacto", "Ferramentas elétricas", "20", "0")
        .await;

    site.loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, drills.balance.id, "Carlos", "6"),
        )
        .await
        .unwrap();

    let view = site
        .stock
        .get_item(site.site_id, drills.balance.id)
        .await
        .unwrap();
    assert_eq!(view.balance.quantity, dec("20"));
    assert_eq!(view.committed, dec("6"));
    assert_eq!(view.available, dec("14"));

    let err = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, drills.balance.id, "Ana", "15"),
        )
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock {
            requested,
            available,
        } => {
            assert_eq!(requested, dec("15"));
            assert_eq!(available, dec("14"));
        }
        other => panic!("expected insufficient stock, got {:?}", other),
    }

    let open = site
        .loans
        .list_loans(site.site_id, Some(LoanStatus::Open))
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn test_availability_is_floored_at_zero() {
    let site = Site::new();
    let hammers = site
        .stock_item("Martelo unha", "Ferramentas manuais", "5", "0")
        .await;

    site.loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, hammers.balance.id, "Pedro", "4"),
        )
        .await
        .unwrap();

    // Stock can still leave the site while tools are out on loan
    site.stock
        .apply_movement(
            site.site_id,
            hammers.balance.id,
            storekeeper(),
            movement(MovementType::Out, "3"),
        )
        .await
        .unwrap();

    let view = site
        .stock
        .get_item(site.site_id, hammers.balance.id)
        .await
        .unwrap();
    assert_eq!(view.balance.quantity, dec("2"));
    assert_eq!(view.available, Decimal::ZERO);
}

#[tokio::test]
async fn test_loan_of_unknown_item_is_not_found() {
    let site = Site::new();
    let result = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, Uuid::new_v4(), "Carlos", "1"),
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_loan_requires_positive_quantity_and_borrower() {
    let site = Site::new();
    let saws = site
        .stock_item("Serrote", "Ferramentas manuais", "3", "0")
        .await;

    let zero = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, saws.balance.id, "Carlos", "0"),
        )
        .await;
    assert!(matches!(zero, Err(AppError::Validation { .. })));

    let nameless = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, saws.balance.id, "", "1"),
        )
        .await;
    assert!(matches!(
        nameless,
        Err(AppError::ValidationError(_)) | Err(AppError::Validation { .. })
    ));
}

// ============================================================================
// Returns
// ============================================================================

#[tokio::test]
async fn test_return_restores_availability_once() {
    let site = Site::new();
    let levels = site
        .stock_item("Nível de bolha", "Ferramentas manuais", "4", "0")
        .await;

    let loan = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, levels.balance.id, "Lucas", "4"),
        )
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Open);
    assert_eq!(loan.item_name, "Nível de bolha");

    let returned = site
        .loans
        .return_loan(
            site.site_id,
            loan.id,
            ReturnLoanInput {
                return_date: Some(date(2024, 3, 8)),
                return_notes: Some("Devolvido sem avarias".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(returned.status, LoanStatus::Returned);
    assert_eq!(returned.return_date, Some(date(2024, 3, 8)));

    let view = site
        .stock
        .get_item(site.site_id, levels.balance.id)
        .await
        .unwrap();
    assert_eq!(view.available, dec("4"));

    let again = site
        .loans
        .return_loan(site.site_id, loan.id, ReturnLoanInput::default())
        .await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn test_return_before_loan_date_is_rejected() {
    let site = Site::new();
    let trowels = site
        .stock_item("Colher de pedreiro", "Ferramentas manuais", "2", "0")
        .await;
    let loan = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, trowels.balance.id, "Rita", "1"),
        )
        .await
        .unwrap();

    let result = site
        .loans
        .return_loan(
            site.site_id,
            loan.id,
            ReturnLoanInput {
                return_date: Some(date(2024, 3, 1)),
                return_notes: None,
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation { .. })));
    let still_open = site.loans.get_loan(site.site_id, loan.id).await.unwrap();
    assert_eq!(still_open.status, LoanStatus::Open);
}

#[tokio::test]
async fn test_detach_with_open_loans_is_refused() {
    let site = Site::new();
    let grinder = site
        .stock_item("Esmerilhadeira", "Ferramentas elétricas", "2", "0")
        .await;
    let loan = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Owned, grinder.balance.id, "Bruno", "1"),
        )
        .await
        .unwrap();

    let refused = site.stock.detach(site.site_id, grinder.balance.id).await;
    assert!(matches!(refused, Err(AppError::InvalidStateTransition(_))));

    site.loans
        .return_loan(site.site_id, loan.id, ReturnLoanInput::default())
        .await
        .unwrap();
    site.stock
        .detach(site.site_id, grinder.balance.id)
        .await
        .unwrap();
}

// ============================================================================
// Rented batches
// ============================================================================

#[tokio::test]
async fn test_loan_against_rented_batch() {
    let site = Site::new();
    let batch = site
        .equipment
        .register_entry(
            site.site_id,
            rented_batch("Betoneira 400L", "Máquinas", "2", ToolFlag::Inferred),
        )
        .await
        .unwrap();

    let loan = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Rented, batch.record.id, "Equipe B", "2"),
        )
        .await
        .unwrap();
    assert_eq!(loan.item_origin, ItemOrigin::Rented);

    let view = site.equipment.get(site.site_id, batch.record.id).await.unwrap();
    assert_eq!(view.committed, dec("2"));
    assert_eq!(view.available, Decimal::ZERO);

    let exhausted = site
        .loans
        .create_loan(
            site.site_id,
            loan_of(ItemOrigin::Rented, batch.record.id, "Equipe C", "1"),
        )
        .await;
    assert!(matches!(exhausted, Err(AppError::InsufficientStock { .. })));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loans_never_over_commit() {
    let site = Site::new();
    let ladders = site
        .stock_item("Escada extensível", "Ferramentas", "5", "0")
        .await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let loans = site.loans.clone();
        let site_id = site.site_id;
        let item_id = ladders.balance.id;
        handles.push(tokio::spawn(async move {
            loans
                .create_loan(
                    site_id,
                    loan_of(ItemOrigin::Owned, item_id, &format!("Operário {}", i), "1"),
                )
                .await
        }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(AppError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(opened, 5);
    let view = site
        .stock
        .get_item(site.site_id, ladders.balance.id)
        .await
        .unwrap();
    assert_eq!(view.committed, dec("5"));
    assert_eq!(view.available, Decimal::ZERO);
}
