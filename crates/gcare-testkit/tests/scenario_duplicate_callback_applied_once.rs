//! Scenario: duplicate gateway callbacks are applied once.
//!
//! # Invariant under test
//! The gateway delivers at least once: the browser return and the IPN both
//! arrive, and the IPN is retried. Whatever the number or interleaving of
//! deliveries for one `txn_ref`, the attempt is settled exactly once and the
//! order is advanced exactly once. Every later delivery reports
//! "already processed" without writing.
//!
//! All tests are pure in-process; no DB or network required.

use std::sync::Arc;

use gcare_payment::{process_payment_result, ReconcileOutcome, ALREADY_PROCESSED_MESSAGE};
use gcare_schemas::{OrderStatus, PaymentRecordStatus, PaymentStatus};
use gcare_testkit::{callback_params, test_tz, MemoryStore};

#[tokio::test]
async fn second_delivery_is_already_processed() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-1", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &format!("{}_1", order.order_id));
    let params = callback_params(&record, "00");

    let first = process_payment_result(&store, &record.txn_ref, "00", &params, test_tz())
        .await
        .unwrap();
    assert!(matches!(first, ReconcileOutcome::Settled { .. }));
    let after_first = store.payment(&record.txn_ref).unwrap();

    let second = process_payment_result(&store, &record.txn_ref, "00", &params, test_tz())
        .await
        .unwrap();
    assert!(matches!(second, ReconcileOutcome::AlreadyProcessed { .. }));
    assert!(second.message().contains("đã được xử lý"));
    assert_eq!(second.message(), ALREADY_PROCESSED_MESSAGE);
    assert!(second.is_paid());
    assert_eq!(second.order().unwrap().payment_status, PaymentStatus::Paid);

    assert_eq!(store.payment(&record.txn_ref).unwrap(), after_first, "no second write");
    assert_eq!(store.settles_applied(), 1);
    assert_eq!(store.order_updates_applied(), 1);
}

#[tokio::test]
async fn late_failure_cannot_overwrite_success() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-1", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &format!("{}_2", order.order_id));

    process_payment_result(&store, &record.txn_ref, "00", &callback_params(&record, "00"), test_tz())
        .await
        .unwrap();
    let late = process_payment_result(
        &store,
        &record.txn_ref,
        "24",
        &callback_params(&record, "24"),
        test_tz(),
    )
    .await
    .unwrap();

    assert!(matches!(late, ReconcileOutcome::AlreadyProcessed { .. }));
    let stored = store.payment(&record.txn_ref).unwrap();
    assert_eq!(stored.status, PaymentRecordStatus::Success);
    assert_eq!(stored.response_code.as_deref(), Some("00"));
}

#[tokio::test]
async fn failed_attempt_stays_failed_on_redelivery() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-1", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &format!("{}_3", order.order_id));
    let params = callback_params(&record, "51");

    process_payment_result(&store, &record.txn_ref, "51", &params, test_tz())
        .await
        .unwrap();
    let again = process_payment_result(&store, &record.txn_ref, "51", &params, test_tz())
        .await
        .unwrap();

    assert!(!again.is_paid());
    assert_eq!(again.payment().status, PaymentRecordStatus::Failed);
    assert_eq!(store.settles_applied(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_settle_once() {
    const DELIVERIES: usize = 16;

    let store = Arc::new(MemoryStore::new());
    let order = store.seed_order("cust-9", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &format!("{}_4", order.order_id));
    let params = callback_params(&record, "00");

    let mut handles = Vec::with_capacity(DELIVERIES);
    for _ in 0..DELIVERIES {
        let store = Arc::clone(&store);
        let params = params.clone();
        let txn_ref = record.txn_ref.clone();
        handles.push(tokio::spawn(async move {
            process_payment_result(store.as_ref(), &txn_ref, "00", &params, test_tz()).await
        }));
    }

    let mut settled = 0;
    let mut already = 0;
    for h in handles {
        match h.await.unwrap().unwrap() {
            ReconcileOutcome::Settled { .. } => settled += 1,
            ReconcileOutcome::AlreadyProcessed { .. } => already += 1,
        }
    }

    assert_eq!(settled, 1, "exactly one delivery settles");
    assert_eq!(already, DELIVERIES - 1);
    assert_eq!(store.settles_applied(), 1);
    assert_eq!(store.order_updates_applied(), 1);

    let final_order = store.order(order.order_id).unwrap();
    assert_eq!(final_order.order_status, OrderStatus::Accepted);
    assert_eq!(final_order.payment_status, PaymentStatus::Paid);
}
