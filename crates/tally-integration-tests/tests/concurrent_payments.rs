//! Integration test: two connections racing payments against one debt.
//!
//! Bob owes Alice 100.00 and two clients each try to record 60.00 at the
//! same moment, over separate connections to the same on-disk database.
//! Exactly one must win; the loser sees the reduced balance and is refused.

use std::sync::{Arc, Barrier};
use std::thread;

use tally_core::{debts, payments, Error};
use tally_integration_tests::{identity, register, BASE_TIME};
use tally_types::debt::{DebtStatus, NewDebt};
use tally_types::payment::NewPayment;
use tally_types::Money;

#[test]
fn concurrent_payments_cannot_overpay() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tally.db");

    let setup = tally_db::open(&path).expect("open setup connection");
    let identity = identity().expect("identity");
    let alice = register(&identity, &setup, "Alice").expect("alice");
    let bob = register(&identity, &setup, "Bob").expect("bob");
    let debt = debts::create(
        &setup,
        &alice,
        NewDebt {
            debtor_id: bob.user_id,
            amount: Money::from_cents(10_000),
            description: Some("rent share".into()),
            due_date: None,
        },
        BASE_TIME,
    )
    .expect("create debt");

    // Open both writers up front so migrations are not part of the race.
    let writers = [
        tally_db::open(&path).expect("open writer"),
        tally_db::open(&path).expect("open writer"),
    ];
    let barrier = Arc::new(Barrier::new(writers.len()));

    let handles: Vec<_> = writers
        .into_iter()
        .enumerate()
        .map(|(i, mut conn)| {
            let barrier = Arc::clone(&barrier);
            let bob = bob.clone();
            let debt_id = debt.debt_id;
            thread::spawn(move || {
                barrier.wait();
                payments::create(
                    &mut conn,
                    &bob,
                    NewPayment {
                        debt_id,
                        amount: Money::from_cents(6_000),
                        payment_method: Some(format!("client {i}")),
                        notes: None,
                    },
                    BASE_TIME + 1,
                )
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("writer thread"))
        .collect();

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1, "{results:?}");
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::InvalidArgument(_)))));

    let details = debts::get(&setup, &alice, debt.debt_id, BASE_TIME).expect("details");
    assert_eq!(details.summary.total_paid, Money::from_cents(6_000));
    assert_eq!(details.summary.remaining, Money::from_cents(4_000));
    assert_eq!(details.summary.debt.status, DebtStatus::Pending);
    assert_eq!(details.payments.len(), 1);
}
