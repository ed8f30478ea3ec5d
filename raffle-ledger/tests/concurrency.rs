// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    collections::BTreeSet,
    sync::{Arc, Barrier},
    thread,
};

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use raffle_ledger::{
    Amount, Clock, JsonFileStore, LedgerConfig, LedgerError, ManualClock, MemoryStore, NumberStatus,
    RaffleConfig, RaffleDraft, ReservationLedger, ReservationStatus, ReservationStore,
    StatusFilter, TicketNumber,
};
use tempfile::tempdir;

fn n(value: u8) -> TicketNumber {
    TicketNumber::new(value).unwrap()
}

fn ledger_with(store: Arc<dyn ReservationStore>) -> (Arc<ReservationLedger>, Arc<ManualClock>, RaffleConfig) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 11, 20, 12, 0, 0).unwrap(),
    ));
    let ledger = ReservationLedger::new(LedgerConfig::in_memory(), store, clock.clone());
    let raffle = ledger
        .create_raffle(RaffleDraft::new(
            "Gran rifa",
            NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
            Amount::from_units(5),
        ))
        .unwrap();
    (Arc::new(ledger), clock, raffle)
}

#[test]
fn exactly_one_overlapping_hold_wins() {
    let (ledger, _clock, raffle) = ledger_with(Arc::new(MemoryStore::new()));
    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));

    let handles: Vec<_> = (0..contenders)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let price = raffle.ticket_price;
            let raffle_id = raffle.id;
            thread::spawn(move || {
                // every request contains 42 plus one private number
                let numbers = [n(42), n(i as u8)];
                barrier.wait();
                ledger.create_hold(raffle_id, &numbers, price)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in &results {
        if let Err(err) = result {
            match err {
                LedgerError::Conflict { numbers } => assert_eq!(numbers, &vec![n(42)]),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
    let live = ledger.active_reservations(raffle.id).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(ledger.status_of(n(42)).unwrap(), NumberStatus::Locked);
}

#[test]
fn live_reservations_stay_disjoint_under_contention() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonFileStore::load_or_init(dir.path().join("reservations.json")).unwrap());
    let (ledger, _clock, raffle) = ledger_with(store);
    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let raffle = raffle.clone();
            thread::spawn(move || {
                barrier.wait();
                for start in (0..100u8).step_by(3) {
                    let numbers: Vec<_> = (start..start + 3)
                        .filter_map(TicketNumber::new)
                        .collect();
                    if let Ok(held) = ledger.create_hold(raffle.id, &numbers, raffle.ticket_price) {
                        if (start as usize + t) % 2 == 0 {
                            let _ = ledger.cancel(held.id);
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let live = ledger.active_reservations(raffle.id).unwrap();
    let mut seen = BTreeSet::new();
    for reservation in &live {
        for number in &reservation.numbers {
            assert!(seen.insert(*number), "{number} claimed twice");
        }
    }
    assert!(!live.is_empty());
}

#[test]
fn confirmation_and_sweep_never_both_apply() {
    let (ledger, clock, raffle) = ledger_with(Arc::new(MemoryStore::new()));
    let held = ledger
        .create_hold(raffle.id, &[n(7)], raffle.ticket_price)
        .unwrap();
    ledger
        .submit_payment_proof(held.id, "Ana", "0414-5550000", Some("ref-77"))
        .unwrap();
    clock.advance(Duration::minutes(30));

    let barrier = Arc::new(Barrier::new(2));
    let confirm = {
        let ledger = Arc::clone(&ledger);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            ledger.confirm(held.id)
        })
    };
    let sweep = {
        let ledger = Arc::clone(&ledger);
        let barrier = Arc::clone(&barrier);
        let now = clock.now();
        thread::spawn(move || {
            barrier.wait();
            ledger.sweep_expired(now)
        })
    };
    confirm.join().unwrap().unwrap();
    assert_eq!(sweep.join().unwrap().unwrap(), 0);
    assert_eq!(
        ledger.reservation(held.id).unwrap().status,
        ReservationStatus::Confirmed
    );
}

#[test]
fn racing_sweeps_expire_each_hold_once() {
    let (ledger, clock, raffle) = ledger_with(Arc::new(MemoryStore::new()));
    for value in 0..20 {
        ledger
            .create_hold(raffle.id, &[n(value)], raffle.ticket_price)
            .unwrap();
    }
    clock.advance(Duration::minutes(11));
    let now = clock.now();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.sweep_expired(now).unwrap()
            })
        })
        .collect();
    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 20);
    let expired = ledger
        .reservations(
            Some(raffle.id),
            StatusFilter::Only(ReservationStatus::Expired),
        )
        .unwrap();
    assert_eq!(expired.len(), 20);
    assert!(expired.iter().all(|r| r.version == 2));
}

#[test]
fn cancel_racing_sweep_lands_in_one_terminal_state() {
    let (ledger, clock, raffle) = ledger_with(Arc::new(MemoryStore::new()));
    let held = ledger
        .create_hold(raffle.id, &[n(13)], raffle.ticket_price)
        .unwrap();
    clock.advance(Duration::minutes(15));
    let now = clock.now();

    let barrier = Arc::new(Barrier::new(2));
    let cancel = {
        let ledger = Arc::clone(&ledger);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            ledger.cancel(held.id)
        })
    };
    let sweep = {
        let ledger = Arc::clone(&ledger);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            ledger.sweep_expired(now)
        })
    };
    let cancelled = cancel.join().unwrap();
    let swept = sweep.join().unwrap().unwrap();

    let stored = ledger.reservation(held.id).unwrap();
    assert_eq!(stored.version, 2);
    match stored.status {
        ReservationStatus::Cancelled => {
            assert!(cancelled.is_ok());
            assert_eq!(swept, 0);
        }
        ReservationStatus::Expired => {
            assert!(matches!(cancelled, Err(LedgerError::InvalidState { .. })));
            assert_eq!(swept, 1);
        }
        other => panic!("unexpected status {other}"),
    }
    assert_eq!(ledger.status_of(n(13)).unwrap(), NumberStatus::Available);
}
