//! Axum router and all HTTP handlers for gcare-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are thin: status rules come from
//! `gcare-status`, gateway signing and reconciliation from `gcare-payment`.

use std::{collections::BTreeMap, convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Redirect, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use gcare_db::StoreError;
use gcare_payment::gateway::normalize_client_ip;
use gcare_payment::{
    check_payable, process_payment_result, IpnAck, PaymentRequest, ReturnRedirect,
};
use gcare_schemas::{NewOrder, NewPaymentRecord, Order, Role, StatusPair};
use gcare_status::{
    available_actions, can_manage_payments, may_request_order_status, validate_status_update,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        CreateOrderRequest, CreatePaymentRequest, CreatePaymentResponse, ErrorResponse,
        HealthResponse, OrderDetailResponse, StatusUpdateRequest, ValidateStatusRequest,
    },
    state::{AppState, BusMsg},
};

/// Role resolved by the upstream auth layer. Absent means `customer`.
pub const ROLE_HEADER: &str = "x-gencare-role";
/// Caller's customer reference, set by the upstream auth layer.
pub const USER_HEADER: &str = "x-gencare-user";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/:id", get(get_order))
        .route("/v1/orders/:id/actions", get(order_actions))
        .route("/v1/orders/:id/status", post(update_order_status))
        .route("/v1/status/validate", post(validate_status))
        .route("/v1/payments", post(create_payment))
        .route("/v1/payments/vnpay/return", get(vnpay_return))
        .route("/v1/payments/vnpay/ipn", get(vnpay_ipn))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            errors: Vec::new(),
        }),
    )
        .into_response()
}

fn rejected(error: impl Into<String>, errors: Vec<String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: error.into(),
            errors,
        }),
    )
        .into_response()
}

fn order_not_found(order_id: Uuid) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("order {order_id} not found"))
}

fn store_failure(op: &'static str, err: &StoreError) -> Response {
    error!(op, error = %err, "store operation failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable")
}

// ---------------------------------------------------------------------------
// Caller identity
// ---------------------------------------------------------------------------

fn caller_role(headers: &HeaderMap) -> Result<Role, Response> {
    let Some(raw) = headers.get(ROLE_HEADER) else {
        return Ok(Role::Customer);
    };
    raw.to_str()
        .ok()
        .and_then(|s| Role::parse(s).ok())
        .ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("unrecognised {ROLE_HEADER} header"),
            )
        })
}

fn caller_user(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Customers only see and act on their own orders; staff-side roles see all.
fn ensure_owner(role: Role, headers: &HeaderMap, customer_id: &str) -> Result<(), Response> {
    if role != Role::Customer || caller_user(headers) == Some(customer_id) {
        return Ok(());
    }
    Err(error_response(
        StatusCode::FORBIDDEN,
        "customers may only act on their own orders",
    ))
}

/// First `x-forwarded-for` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

async fn load_order(st: &AppState, order_id: Uuid) -> Result<Order, Response> {
    match st.store.fetch_order(order_id).await {
        Ok(Some(order)) => Ok(order),
        Ok(None) => Err(order_not_found(order_id)),
        Err(e) => Err(store_failure("fetch_order", &e)),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    let role = match caller_role(&headers) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let customer_id = req.customer_id.trim();
    if customer_id.is_empty() {
        return rejected("customer_id is required", Vec::new());
    }
    if req.total_amount < 0 {
        return rejected("total_amount must not be negative", Vec::new());
    }
    if let Err(resp) = ensure_owner(role, &headers, customer_id) {
        return resp;
    }

    let new = NewOrder {
        order_id: Uuid::new_v4(),
        customer_id: customer_id.to_string(),
        total_amount: req.total_amount,
    };
    match st.store.insert_order(&new).await {
        Ok(order) => {
            info!(order_id = %order.order_id, customer_id = %order.customer_id, "order booked");
            let _ = st.bus.send(BusMsg::order_status(&order));
            (StatusCode::CREATED, Json(order)).into_response()
        }
        Err(StoreError::Duplicate(what)) => error_response(StatusCode::CONFLICT, what),
        Err(e) => store_failure("insert_order", &e),
    }
}

pub(crate) async fn get_order(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let role = match caller_role(&headers) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let order = match load_order(&st, order_id).await {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    if let Err(resp) = ensure_owner(role, &headers, &order.customer_id) {
        return resp;
    }
    match st.store.list_payments_for_order(order_id).await {
        Ok(payments) => (StatusCode::OK, Json(OrderDetailResponse { order, payments })).into_response(),
        Err(e) => store_failure("list_payments_for_order", &e),
    }
}

pub(crate) async fn order_actions(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let role = match caller_role(&headers) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let order = match load_order(&st, order_id).await {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    if let Err(resp) = ensure_owner(role, &headers, &order.customer_id) {
        return resp;
    }
    let actions = available_actions(order.order_status, order.payment_status, role);
    (StatusCode::OK, Json(actions)).into_response()
}

/// Apply a manual status change.
///
/// 403 when the role may not request the move, 422 with every violated rule
/// when the move is illegal, 409 when the order changed since it was read.
pub(crate) async fn update_order_status(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<StatusUpdateRequest>,
) -> Response {
    let role = match caller_role(&headers) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let order = match load_order(&st, order_id).await {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let new_order = req.order_status.filter(|s| *s != order.order_status);
    let new_payment = req.payment_status.filter(|s| *s != order.payment_status);
    if new_order.is_none() && new_payment.is_none() {
        return (StatusCode::OK, Json(order)).into_response();
    }

    if let Err(resp) = ensure_owner(role, &headers, &order.customer_id) {
        return resp;
    }
    if let Some(target) = new_order {
        if !may_request_order_status(role, target) {
            return error_response(
                StatusCode::FORBIDDEN,
                format!("role {role} may not move an order to {target}"),
            );
        }
    }
    if new_payment.is_some() && !can_manage_payments(role) {
        return error_response(
            StatusCode::FORBIDDEN,
            format!("role {role} may not change payment status"),
        );
    }

    let check = validate_status_update(
        order.order_status,
        order.payment_status,
        new_order,
        new_payment,
    );
    if !check.valid {
        info!(%order_id, from = %order.status_pair(), errors = ?check.errors, "status update rejected");
        return rejected("status update not allowed", check.errors);
    }

    let expected = order.status_pair();
    let next = StatusPair::new(
        new_order.unwrap_or(order.order_status),
        new_payment.unwrap_or(order.payment_status),
    );
    match st.store.update_order_status(order_id, expected, next).await {
        Ok(Some(updated)) => {
            info!(%order_id, from = %expected, to = %next, %role, "order status updated");
            let _ = st.bus.send(BusMsg::order_status(&updated));
            (StatusCode::OK, Json(updated)).into_response()
        }
        Ok(None) => {
            warn!(%order_id, from = %expected, to = %next, "order changed concurrently");
            error_response(
                StatusCode::CONFLICT,
                "order was modified concurrently; reload and retry",
            )
        }
        Err(e) => store_failure("update_order_status", &e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/status/validate
// ---------------------------------------------------------------------------

pub(crate) async fn validate_status(Json(req): Json<ValidateStatusRequest>) -> impl IntoResponse {
    let check = validate_status_update(
        req.current_order_status,
        req.current_payment_status,
        req.proposed_order_status,
        req.proposed_payment_status,
    );
    (StatusCode::OK, Json(check))
}

// ---------------------------------------------------------------------------
// POST /v1/payments
// ---------------------------------------------------------------------------

/// Open a payment attempt for the order's total and hand back the signed
/// gateway URL.
pub(crate) async fn create_payment(
    State(st): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<CreatePaymentRequest>,
) -> Response {
    let role = match caller_role(&headers) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let order = match load_order(&st, req.order_id).await {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    if let Err(resp) = ensure_owner(role, &headers, &order.customer_id) {
        return resp;
    }

    let payable = check_payable(&order);
    if !payable.valid {
        return rejected(
            format!("order {} cannot be paid now", order.order_id),
            payable.reason.into_iter().collect(),
        );
    }

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let built = match st.gateway.build_payment_url(
        &PaymentRequest {
            order_id: order.order_id,
            amount: order.total_amount,
            client_ip: ip.clone(),
            bank_code: req.bank_code,
            locale: req.locale,
        },
        Utc::now(),
    ) {
        Ok(b) => b,
        Err(e) => return rejected(e.to_string(), Vec::new()),
    };

    let new = NewPaymentRecord {
        payment_id: Uuid::new_v4(),
        order_id: order.order_id,
        txn_ref: built.txn_ref.clone(),
        amount: order.total_amount,
        client_ip: normalize_client_ip(&ip),
    };
    match st.store.insert_payment(&new).await {
        Ok(record) => {
            info!(
                order_id = %record.order_id,
                txn_ref = %record.txn_ref,
                amount = record.amount,
                "payment attempt opened"
            );
            (
                StatusCode::CREATED,
                Json(CreatePaymentResponse {
                    payment_id: record.payment_id,
                    order_id: record.order_id,
                    txn_ref: record.txn_ref,
                    amount: record.amount,
                    payment_url: built.url,
                }),
            )
                .into_response()
        }
        Err(StoreError::Duplicate(what)) => error_response(StatusCode::CONFLICT, what),
        Err(e) => store_failure("insert_payment", &e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/payments/vnpay/return
// ---------------------------------------------------------------------------

/// Browser leg. Always a 303 to the frontend; internal errors are reduced to
/// a code in the failure URL.
pub(crate) async fn vnpay_return(
    State(st): State<Arc<AppState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let callback = st.gateway.verify_callback(&params);
    let target = if !callback.is_valid {
        warn!(txn_ref = %callback.txn_ref, "return url signature invalid");
        ReturnRedirect::checksum_failed()
    } else {
        let result = process_payment_result(
            st.store.as_ref(),
            &callback.txn_ref,
            &callback.response_code,
            &params,
            st.gateway.timezone(),
        )
        .await;
        if let Ok(outcome) = &result {
            st.publish_settlement(outcome);
        }
        ReturnRedirect::for_result(&callback, &result)
    };
    Redirect::to(&target.to_url(&st.frontend_url)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/payments/vnpay/ipn
// ---------------------------------------------------------------------------

/// Server-to-server leg. Always HTTP 200; the outcome is in `RspCode`.
pub(crate) async fn vnpay_ipn(
    State(st): State<Arc<AppState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let callback = st.gateway.verify_callback(&params);
    let ack = if !callback.is_valid {
        warn!(txn_ref = %callback.txn_ref, "ipn signature invalid");
        IpnAck::CHECKSUM_FAILED
    } else {
        let result = process_payment_result(
            st.store.as_ref(),
            &callback.txn_ref,
            &callback.response_code,
            &params,
            st.gateway.timezone(),
        )
        .await;
        if let Ok(outcome) = &result {
            st.publish_settlement(outcome);
        }
        IpnAck::for_result(&result)
    };
    info!(txn_ref = %callback.txn_ref, rsp_code = ack.rsp_code, "ipn acknowledged");
    (StatusCode::OK, Json(ack)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
