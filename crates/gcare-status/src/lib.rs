//! gcare-status
//!
//! Order status / payment status transition engine for STI test orders.
//!
//! - `table`: the constraint table (graphs, pair whitelist, special rules)
//! - `validator`: pure transition checks returning `Validation` values
//! - `actions`: UI-facing action flags per role
//! - `policy`: role capability checks
//!
//! Deterministic, pure logic. No IO.

mod actions;
mod policy;
mod table;
mod validator;

pub use actions::{
    available_actions, available_order_statuses, available_payment_statuses, AvailableActions,
};
pub use policy::{can_manage_orders, can_manage_payments, may_request_order_status};
pub use table::{
    allowed_order_statuses, allowed_order_transitions, allowed_payment_statuses,
    allowed_payment_transitions, cancel_blocked_by_payment, is_valid_status_pair, payment_locked,
};
pub use validator::{
    can_transition_order_status, can_transition_payment_status, validate_order_transition,
    validate_payment_transition, validate_status_update, Rule, StatusUpdateCheck, Validation,
};
