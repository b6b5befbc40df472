//! Scenario: a successful gateway result settles the attempt and pays the order.
//!
//! # Invariant under test
//! A verified `00` result for a `Pending` attempt on an `Accepted/Pending`
//! order leaves the attempt `Success` and the order `Accepted/Paid`. A
//! non-success result settles the attempt `Failed` and leaves the order alone.
//!
//! All tests are pure in-process; no DB or network required.

use gcare_payment::{process_payment_result, ReconcileError, ReconcileOutcome};
use gcare_schemas::{OrderStatus, PaymentRecordStatus, PaymentStatus};
use gcare_status::is_valid_status_pair;
use gcare_testkit::{callback_params, callback_params_with_amount, test_tz, MemoryStore};

fn txn_ref_for(order_id: uuid::Uuid) -> String {
    format!("{order_id}_1751412600000")
}

#[tokio::test]
async fn success_code_settles_record_and_marks_order_paid() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-1", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &txn_ref_for(order.order_id));
    let params = callback_params(&record, "00");

    let outcome = process_payment_result(&store, &record.txn_ref, "00", &params, test_tz())
        .await
        .unwrap();

    let (payment, settled_order, message) = match outcome {
        ReconcileOutcome::Settled {
            payment,
            order,
            message,
        } => (payment, order, message),
        other => panic!("expected Settled, got {other:?}"),
    };
    assert_eq!(payment.status, PaymentRecordStatus::Success);
    assert_eq!(payment.response_code.as_deref(), Some("00"));
    assert_eq!(payment.gateway_txn_no.as_deref(), Some("14226112"));
    assert_eq!(payment.bank_code.as_deref(), Some("NCB"));
    assert_eq!(message, "Giao dịch thành công");

    let settled_order = settled_order.expect("order returned");
    assert_eq!(settled_order.order_status, OrderStatus::Accepted);
    assert_eq!(settled_order.payment_status, PaymentStatus::Paid);
    assert!(is_valid_status_pair(settled_order.order_status, settled_order.payment_status));

    let stored = store.order(order.order_id).unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert_eq!(store.settles_applied(), 1);
    assert_eq!(store.order_updates_applied(), 1);
}

#[tokio::test]
async fn pay_date_is_read_in_gateway_zone() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-1", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &txn_ref_for(order.order_id));

    process_payment_result(&store, &record.txn_ref, "00", &callback_params(&record, "00"), test_tz())
        .await
        .unwrap();

    // 2025-07-02 06:30:00 in UTC+7.
    let paid_at = store.payment(&record.txn_ref).unwrap().pay_date_utc.unwrap();
    assert_eq!(paid_at.to_rfc3339(), "2025-07-01T23:30:00+00:00");
}

#[tokio::test]
async fn raw_callback_is_stored_verbatim() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-1", OrderStatus::Accepted, PaymentStatus::Pending, 90_000);
    let record = store.seed_pending_payment(&order, &txn_ref_for(order.order_id));
    let params = callback_params(&record, "00");

    process_payment_result(&store, &record.txn_ref, "00", &params, test_tz())
        .await
        .unwrap();

    let raw = store.payment(&record.txn_ref).unwrap().raw_callback.unwrap();
    assert_eq!(raw["vnp_TxnRef"], record.txn_ref.as_str());
    assert_eq!(raw["vnp_Amount"], "9000000");
}

#[tokio::test]
async fn cancelled_by_customer_fails_record_and_leaves_order() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-2", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &txn_ref_for(order.order_id));

    let outcome = process_payment_result(
        &store,
        &record.txn_ref,
        "24",
        &callback_params(&record, "24"),
        test_tz(),
    )
    .await
    .unwrap();

    assert!(!outcome.is_paid());
    assert_eq!(outcome.payment().status, PaymentRecordStatus::Failed);
    assert_eq!(outcome.message(), "Giao dịch không thành công do: Khách hàng hủy giao dịch");
    assert_eq!(store.order(order.order_id).unwrap(), order, "order untouched");
    assert_eq!(store.order_updates_applied(), 0);
}

#[tokio::test]
async fn unknown_response_code_is_a_failure_with_fallback_message() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-2", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &txn_ref_for(order.order_id));

    let outcome = process_payment_result(
        &store,
        &record.txn_ref,
        "42",
        &callback_params(&record, "42"),
        test_tz(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.payment().status, PaymentRecordStatus::Failed);
    assert_eq!(outcome.message(), "Lỗi không xác định");
}

#[tokio::test]
async fn amount_mismatch_changes_nothing() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-3", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &txn_ref_for(order.order_id));

    // Whole VND instead of minor units.
    let params = callback_params_with_amount(&record, "00", 150_000);
    let err = process_payment_result(&store, &record.txn_ref, "00", &params, test_tz())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::AmountMismatch { expected_minor: 15_000_000, .. }
    ));
    assert_eq!(store.payment(&record.txn_ref).unwrap().status, PaymentRecordStatus::Pending);
    assert_eq!(store.settles_applied(), 0);
}

#[tokio::test]
async fn unknown_txn_ref_is_not_found() {
    let store = MemoryStore::new();
    let order = store.seed_order("cust-4", OrderStatus::Accepted, PaymentStatus::Pending, 150_000);
    let record = store.seed_pending_payment(&order, &txn_ref_for(order.order_id));

    let err = process_payment_result(
        &store,
        "no-such-ref",
        "00",
        &callback_params(&record, "00"),
        test_tz(),
    )
    .await
    .unwrap_err();

    assert_eq!(
        err,
        ReconcileError::NotFound {
            txn_ref: "no-such-ref".to_string()
        }
    );
}
