//! Payment reconciliation.
//!
//! Applies one verified gateway result to its payment record, at most once,
//! and on success advances the linked order's payment status to `Paid`.
//!
//! Gateways deliver at-least-once (return URL and IPN both arrive, and the
//! IPN is retried), so a second delivery for the same `txn_ref` never writes
//! the record again. The guard is the store's conditional settle, not the
//! read in step 2: two callers can both read `Pending`, only one settles.
//!
//! The order advance is a separate conditional write. If it fails after the
//! record settled, the next delivery finds a `Success` record on an unpaid
//! order and finishes the advance; the gateway keeps retrying until it does.

use std::collections::BTreeMap;

use chrono::Utc;
use chrono_tz::Tz;
use gcare_db::{Store, StoreError};
use gcare_schemas::{Order, PaymentRecord, PaymentRecordStatus, PaymentStatus, Settlement, StatusPair};
use gcare_status::{validate_payment_transition, Rule, Validation};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gateway::parse_gateway_time;
use crate::response_codes;

pub const ALREADY_PROCESSED_MESSAGE: &str = "Giao dịch đã được xử lý trước đó";

/// Attempts at the order CAS before giving up on a contended order.
const ORDER_ADVANCE_ATTEMPTS: usize = 3;

// ---------------------------------------------------------------------------
// Outcome / error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// This call moved the record out of `Pending`.
    Settled {
        payment: PaymentRecord,
        /// The linked order after any advance.
        order: Option<Order>,
        message: String,
    },
    /// The record had already left `Pending` and was not written. A
    /// successful record whose order was not yet `Paid` has had that advance
    /// completed.
    AlreadyProcessed {
        payment: PaymentRecord,
        order: Option<Order>,
        /// This delivery found a successful attempt on an unpaid order and saw
        /// the order through to `Paid`.
        order_advanced: bool,
    },
}

impl ReconcileOutcome {
    pub fn payment(&self) -> &PaymentRecord {
        match self {
            ReconcileOutcome::Settled { payment, .. }
            | ReconcileOutcome::AlreadyProcessed { payment, .. } => payment,
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            ReconcileOutcome::Settled { order, .. }
            | ReconcileOutcome::AlreadyProcessed { order, .. } => order.as_ref(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ReconcileOutcome::Settled { message, .. } => message,
            ReconcileOutcome::AlreadyProcessed { .. } => ALREADY_PROCESSED_MESSAGE,
        }
    }

    /// True when the stored attempt (now or earlier) is a successful payment.
    pub fn is_paid(&self) -> bool {
        self.payment().status == PaymentRecordStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// No payment record carries this transaction reference.
    NotFound { txn_ref: String },
    /// `vnp_Amount` disagrees with the stored amount (minor units compared).
    AmountMismatch { txn_ref: String, expected_minor: i64, received: String },
    Store(StoreError),
    /// The record settled as `Success` but the order could not be marked
    /// `Paid`. The record stays settled; an operator must intervene.
    OrderAdvance { order_id: Uuid, reason: String },
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::NotFound { txn_ref } => {
                write!(f, "no payment record for txn_ref {txn_ref}")
            }
            ReconcileError::AmountMismatch {
                txn_ref,
                expected_minor,
                received,
            } => write!(
                f,
                "amount mismatch for txn_ref {txn_ref}: expected {expected_minor}, received {received}"
            ),
            ReconcileError::Store(e) => write!(f, "{e}"),
            ReconcileError::OrderAdvance { order_id, reason } => {
                write!(f, "could not mark order {order_id} paid: {reason}")
            }
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ReconcileError {
    fn from(e: StoreError) -> Self {
        ReconcileError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Apply a verified callback. Callers must only pass callbacks whose
/// signature checked out.
///
/// `raw_params` is the full callback query; it is stored verbatim and its
/// `vnp_Amount`, `vnp_TransactionNo`, `vnp_BankCode` and `vnp_PayDate` are
/// read. `tz` is the zone `vnp_PayDate` is expressed in.
pub async fn process_payment_result<S>(
    store: &S,
    txn_ref: &str,
    response_code: &str,
    raw_params: &BTreeMap<String, String>,
    tz: Tz,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: Store + ?Sized,
{
    let result = reconcile(store, txn_ref, response_code, raw_params, tz).await;
    if let Err(e) = &result {
        match e {
            ReconcileError::Store(_) | ReconcileError::OrderAdvance { .. } => {
                error!(%txn_ref, response_code, error = %e, "payment reconciliation failed");
            }
            ReconcileError::NotFound { .. } | ReconcileError::AmountMismatch { .. } => {
                warn!(%txn_ref, response_code, error = %e, "payment callback rejected");
            }
        }
    }
    result
}

async fn reconcile<S>(
    store: &S,
    txn_ref: &str,
    response_code: &str,
    raw_params: &BTreeMap<String, String>,
    tz: Tz,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: Store + ?Sized,
{
    // 1. Lookup.
    let record = store
        .fetch_payment_by_txn_ref(txn_ref)
        .await?
        .ok_or_else(|| ReconcileError::NotFound {
            txn_ref: txn_ref.to_string(),
        })?;

    // 2. Fast-path idempotence.
    if !record.status.is_pending() {
        return already_processed(store, record).await;
    }

    // 3. Amount.
    let expected_minor = record.amount.saturating_mul(100);
    if let Some(received) = raw_params.get("vnp_Amount") {
        if received.trim().parse::<i64>().ok() != Some(expected_minor) {
            return Err(ReconcileError::AmountMismatch {
                txn_ref: txn_ref.to_string(),
                expected_minor,
                received: received.clone(),
            });
        }
    }

    // 4. Result mapping.
    let status = if response_codes::is_success(response_code) {
        PaymentRecordStatus::Success
    } else {
        PaymentRecordStatus::Failed
    };

    // 5. Conditional settle.
    let settlement = Settlement {
        status,
        response_code: response_code.to_string(),
        gateway_txn_no: non_empty(raw_params.get("vnp_TransactionNo")),
        bank_code: non_empty(raw_params.get("vnp_BankCode")),
        pay_date_utc: raw_params
            .get("vnp_PayDate")
            .and_then(|raw| parse_gateway_time(raw, tz))
            .unwrap_or_else(Utc::now),
        raw_callback: params_to_json(raw_params),
    };

    let Some(settled) = store.settle_payment(txn_ref, &settlement).await? else {
        // A concurrent delivery settled it between our read and our write.
        let current = store
            .fetch_payment_by_txn_ref(txn_ref)
            .await?
            .ok_or_else(|| ReconcileError::NotFound {
                txn_ref: txn_ref.to_string(),
            })?;
        return already_processed(store, current).await;
    };

    info!(
        %txn_ref,
        order_id = %settled.order_id,
        status = %settled.status,
        response_code,
        "payment record settled"
    );

    // 6. Order advance on success only.
    let order = if status == PaymentRecordStatus::Success {
        Some(advance_order_to_paid(store, settled.order_id).await?)
    } else {
        store.fetch_order(settled.order_id).await?
    };

    Ok(ReconcileOutcome::Settled {
        message: response_codes::message(response_code).to_string(),
        payment: settled,
        order,
    })
}

async fn already_processed<S>(
    store: &S,
    payment: PaymentRecord,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: Store + ?Sized,
{
    info!(
        txn_ref = %payment.txn_ref,
        status = %payment.status,
        "payment callback already processed"
    );
    let mut order_advanced = false;
    let order = match store.fetch_order(payment.order_id).await? {
        Some(order)
            if payment.status == PaymentRecordStatus::Success
                && order.payment_status != PaymentStatus::Paid =>
        {
            warn!(
                txn_ref = %payment.txn_ref,
                order_id = %order.order_id,
                pair = %order.status_pair(),
                "settled payment not reflected on order; completing advance"
            );
            let advanced = advance_order_to_paid(store, order.order_id).await?;
            order_advanced = true;
            Some(advanced)
        }
        other => other,
    };
    Ok(ReconcileOutcome::AlreadyProcessed {
        payment,
        order,
        order_advanced,
    })
}

/// Whether `order` may take a payment: it is not in a final status and `Paid`
/// is a legal next payment status for it.
pub fn check_payable(order: &Order) -> Validation {
    if order.order_status.is_terminal() {
        return Validation::rejected(
            Rule::OrderEdge,
            format!(
                "Order status {} is final; it cannot take a payment",
                order.order_status
            ),
        );
    }
    validate_payment_transition(order.payment_status, PaymentStatus::Paid, order.order_status)
}

/// Move the order's payment status to `Paid` through the validator and a
/// compare-and-swap. A concurrent writer causes a re-read, not a lost update.
async fn advance_order_to_paid<S>(store: &S, order_id: Uuid) -> Result<Order, ReconcileError>
where
    S: Store + ?Sized,
{
    for _ in 0..ORDER_ADVANCE_ATTEMPTS {
        let order = store
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| ReconcileError::OrderAdvance {
                order_id,
                reason: "linked order not found".to_string(),
            })?;

        if order.payment_status == PaymentStatus::Paid {
            return Ok(order);
        }

        let payable = check_payable(&order);
        if !payable.valid {
            return Err(ReconcileError::OrderAdvance {
                order_id,
                reason: payable.reason.unwrap_or_default(),
            });
        }

        let next = StatusPair::new(order.order_status, PaymentStatus::Paid);
        if let Some(updated) = store
            .update_order_status(order_id, order.status_pair(), next)
            .await?
        {
            info!(%order_id, pair = %next, "order marked paid");
            return Ok(updated);
        }
    }

    Err(ReconcileError::OrderAdvance {
        order_id,
        reason: "order kept changing under concurrent updates".to_string(),
    })
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn params_to_json(params: &BTreeMap<String, String>) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}
