//! Request and response types for all gcare-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use gcare_schemas::{Order, OrderStatus, PaymentRecord, PaymentStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx JSON response. `errors` carries one message per
/// violated status rule on 422.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// /v1/orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    /// Whole VND.
    pub total_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetailResponse {
    pub order: Order,
    /// Payment attempts, newest first.
    pub payments: Vec<PaymentRecord>,
}

/// `POST /v1/orders/:id/status`. An absent field means "unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub order_status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

// ---------------------------------------------------------------------------
// /v1/status/validate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateStatusRequest {
    pub current_order_status: OrderStatus,
    pub current_payment_status: PaymentStatus,
    #[serde(default)]
    pub proposed_order_status: Option<OrderStatus>,
    #[serde(default)]
    pub proposed_payment_status: Option<PaymentStatus>,
}

// ---------------------------------------------------------------------------
// /v1/payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    #[serde(default)]
    pub bank_code: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub txn_ref: String,
    pub amount: i64,
    pub payment_url: String,
}
