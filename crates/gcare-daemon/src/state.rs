//! Shared runtime state for gcare-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The store and the
//! gateway are the only collaborators; everything else is per request.

use std::sync::Arc;
use std::time::Duration;

use gcare_db::Store;
use gcare_payment::{ReconcileOutcome, VnpayGateway};
use gcare_schemas::{Order, OrderStatus, PaymentRecordStatus, PaymentStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg — SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
/// A notifier (email, dashboard) subscribes through `/v1/stream`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    PaymentSettled {
        txn_ref: String,
        order_id: Uuid,
        status: PaymentRecordStatus,
        response_code: Option<String>,
        amount: i64,
    },
    OrderStatus {
        order_id: Uuid,
        order_status: OrderStatus,
        payment_status: PaymentStatus,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::PaymentSettled { .. } => "payment_settled",
            BusMsg::OrderStatus { .. } => "order_status",
        }
    }

    pub fn order_status(order: &Order) -> Self {
        BusMsg::OrderStatus {
            order_id: order.order_id,
            order_status: order.order_status,
            payment_status: order.payment_status,
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub store: Arc<dyn Store>,
    pub gateway: Arc<VnpayGateway>,
    /// Base URL of the customer-facing frontend; return-URL redirects land here.
    pub frontend_url: String,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, gateway: VnpayGateway, frontend_url: impl Into<String>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "gcare-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store,
            gateway: Arc::new(gateway),
            frontend_url: frontend_url.into(),
        }
    }

    /// Publish what a reconciliation changed. An already-processed delivery
    /// publishes only the order advance it completed, if any.
    pub fn publish_settlement(&self, outcome: &ReconcileOutcome) {
        let (payment, order) = match outcome {
            ReconcileOutcome::Settled { payment, order, .. } => (payment, order),
            ReconcileOutcome::AlreadyProcessed {
                order: Some(order),
                order_advanced: true,
                ..
            } => {
                let _ = self.bus.send(BusMsg::order_status(order));
                return;
            }
            ReconcileOutcome::AlreadyProcessed { .. } => return,
        };
        let _ = self.bus.send(BusMsg::PaymentSettled {
            txn_ref: payment.txn_ref.clone(),
            order_id: payment.order_id,
            status: payment.status,
            response_code: payment.response_code.clone(),
            amount: payment.amount,
        });
        if payment.status == PaymentRecordStatus::Success {
            if let Some(order) = order {
                let _ = self.bus.send(BusMsg::order_status(order));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
