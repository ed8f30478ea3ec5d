use std::sync::Arc;

use chrono::NaiveDate;
use raffle_ledger::{
    Amount, LedgerConfig, LedgerError, NumberStatus, PaymentInstructions, RaffleDraft,
    ReservationLedger, ReservationStatus, StatusFilter, TicketNumber,
};
use raffle_service::{AdminConsole, AuthService, LocalAuth, PurchaseFlow, ServiceError};

struct Harness {
    auth: Arc<LocalAuth>,
    admin: AdminConsole,
    buyer: PurchaseFlow,
}

fn harness() -> Harness {
    let ledger = Arc::new(ReservationLedger::bootstrap(LedgerConfig::in_memory()).unwrap());
    let auth = Arc::new(LocalAuth::new("admin", "admin123", None));
    Harness {
        admin: AdminConsole::new(Arc::clone(&ledger), auth.clone()),
        buyer: PurchaseFlow::new(ledger),
        auth,
    }
}

fn n(value: u8) -> TicketNumber {
    TicketNumber::new(value).unwrap()
}

fn draft() -> RaffleDraft {
    RaffleDraft::new(
        "Rifa de fin de año",
        NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        Amount::from_units(2),
    )
}

#[test]
fn every_operation_requires_a_session() {
    let h = harness();
    let token = h.auth.sign_in("admin", "admin123").unwrap().token;
    h.admin.create_raffle(&token, draft()).unwrap();
    h.auth.sign_out(&token);

    let denied = [
        h.admin.raffle(&token).map(drop),
        h.admin.set_price(&token, Amount::from_units(9)).map(drop),
        h.admin.toggle_on_sale(&token, n(1)).map(drop),
        h.admin.clear_all(&token).map(drop),
        h.admin.purchases(&token, StatusFilter::Any).map(drop),
        h.admin.confirm(&token, 1).map(drop),
        h.admin.unblock(&token, 1).map(drop),
        h.admin.sweep_now(&token).map(drop),
        h.admin.reset_raffle(&token).map(drop),
        h.admin.create_raffle("forged", draft()).map(drop),
    ];
    for result in denied {
        assert!(matches!(result, Err(ServiceError::Unauthorized)));
    }
    assert_eq!(
        h.buyer.board().unwrap().raffle.unwrap().ticket_price,
        Amount::from_units(2)
    );
}

#[test]
fn curation_shapes_the_buyer_board() {
    let h = harness();
    let token = h.auth.sign_in("admin", "admin123").unwrap().token;
    h.admin.create_raffle(&token, draft()).unwrap();

    h.admin.clear_all(&token).unwrap();
    assert!(h.admin.toggle_on_sale(&token, n(7)).unwrap());
    assert!(h.admin.toggle_on_sale(&token, n(8)).unwrap());
    assert!(!h.admin.toggle_on_sale(&token, n(8)).unwrap());
    h.admin
        .update_details(
            &token,
            " Rifa navideña ",
            NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
            "Moto",
        )
        .unwrap();
    let raffle = h
        .admin
        .set_payment_instructions(
            &token,
            PaymentInstructions {
                bank: "Banco de Venezuela".to_string(),
                account_id: "V-12345678".to_string(),
                phone: "0414-5550000".to_string(),
                payee_name: "Organizadora".to_string(),
            },
        )
        .unwrap();
    assert_eq!(raffle.name, "Rifa navideña");
    assert_eq!(raffle.on_sale.len(), 1);

    let board = h.buyer.board().unwrap().board;
    assert_eq!(board.numbers_with(NumberStatus::Available), vec![n(7)]);
    assert_eq!(board.summary().unavailable, 99);

    assert!(matches!(
        h.admin.set_price(&token, Amount::ZERO),
        Err(ServiceError::Ledger(LedgerError::InvalidRequest { .. }))
    ));
    h.admin.select_all(&token).unwrap();
    assert_eq!(
        h.admin.board(&token).unwrap().summary().available,
        100
    );
}

#[test]
fn buyer_purchase_is_approved_by_admin() {
    let h = harness();
    let token = h.auth.sign_in("admin", "admin123").unwrap().token;
    h.admin.create_raffle(&token, draft()).unwrap();

    let view = h.buyer.board().unwrap();
    let mut selection = h.buyer.start_selection().unwrap();
    selection.toggle(n(3), &view.board).unwrap();
    selection.toggle(n(4), &view.board).unwrap();
    let receipt = h.buyer.checkout(&mut selection).unwrap();
    let id = receipt.reservation.id;

    // a later price change does not touch the fixed total
    h.admin.set_price(&token, Amount::from_units(5)).unwrap();
    h.buyer
        .submit_proof(id, "Ana", "0414-5550000", Some("1234"))
        .unwrap();

    let pending = h
        .admin
        .purchases(&token, StatusFilter::Only(ReservationStatus::PendingConfirmation))
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].total_amount, Amount::from_units(4));

    h.admin.confirm(&token, id).unwrap();
    let err = h.admin.cancel(&token, id).unwrap_err();
    assert!(err.user_message().contains("confirmed"));
    let board = h.admin.board(&token).unwrap();
    assert_eq!(board.status(n(3)), NumberStatus::Sold);
    assert_eq!(board.status(n(4)), NumberStatus::Sold);

    assert!(h.admin.unblock(&token, id).unwrap());
    assert!(!h.admin.unblock(&token, id).unwrap());
    assert_eq!(h.admin.board(&token).unwrap().status(n(3)), NumberStatus::Available);
}

#[test]
fn reset_clears_every_claim() {
    let h = harness();
    let token = h.auth.sign_in("admin", "admin123").unwrap().token;
    h.admin.create_raffle(&token, draft()).unwrap();

    let view = h.buyer.board().unwrap();
    for numbers in [[n(10), n(11)], [n(20), n(21)]] {
        let mut selection = h.buyer.start_selection().unwrap();
        for number in numbers {
            selection.toggle(number, &view.board).unwrap();
        }
        let receipt = h.buyer.checkout(&mut selection).unwrap();
        h.buyer
            .submit_proof(receipt.reservation.id, "Luis", "0412-0000000", None)
            .unwrap();
    }
    let first = h.admin.purchases(&token, StatusFilter::Any).unwrap()[0].id;
    h.admin.confirm(&token, first).unwrap();

    assert_eq!(h.admin.reset_raffle(&token).unwrap(), 2);
    assert!(h.admin.purchases(&token, StatusFilter::Any).unwrap().is_empty());
    assert!(matches!(
        h.admin.reset_raffle(&token),
        Err(ServiceError::NoActiveRaffle)
    ));
    let view = h.buyer.board().unwrap();
    assert!(view.raffle.is_none());
    assert!(view
        .board
        .entries
        .iter()
        .all(|entry| matches!(entry.status, NumberStatus::Available | NumberStatus::Unavailable)));
    assert!(matches!(
        h.buyer.start_selection(),
        Err(ServiceError::NoActiveRaffle)
    ));
}
