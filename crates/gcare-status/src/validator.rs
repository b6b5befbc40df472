//! Transition validator.
//!
//! Pure, synchronous and total over the 7 × 3 status domain. Single-axis
//! checks return a [`Validation`] naming the first violated rule; the combined
//! [`validate_status_update`] collects every violated rule so a caller can
//! show all of them at once. Nothing here returns `Err` or panics.

use gcare_schemas::{OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};

use crate::table::{
    allowed_order_transitions, allowed_payment_statuses, allowed_payment_transitions,
    cancel_blocked_by_payment, describe, is_valid_status_pair, payment_locked,
};

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Which constraint a proposed change violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Target is not a direct edge in the order graph.
    OrderEdge,
    /// Target is not a direct edge in the payment graph.
    PaymentEdge,
    /// Resulting (order, payment) pair is not whitelisted.
    StatusPair,
    PaidOrderCannotCancel,
    CompletedLocksPayment,
}

/// Outcome of a single-axis check: `{ "valid": bool, "reason"?, "rule"? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
            rule: None,
        }
    }

    pub fn rejected(rule: Rule, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            rule: Some(rule),
        }
    }
}

/// One violated constraint, collected before the caller picks a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Violation {
    rule: Rule,
    reason: String,
}

impl Violation {
    fn new(rule: Rule, reason: String) -> Self {
        Self { rule, reason }
    }
}

// ---------------------------------------------------------------------------
// Rule evaluation (collects every violation)
// ---------------------------------------------------------------------------

fn order_violations(
    current_order: OrderStatus,
    proposed_order: OrderStatus,
    current_payment: PaymentStatus,
    proposed_payment: Option<PaymentStatus>,
) -> Vec<Violation> {
    let mut out = Vec::new();

    let edges = allowed_order_transitions(current_order);
    if !edges.contains(&proposed_order) {
        let reason = if edges.is_empty() {
            format!(
                "Order status {current_order} is final; it cannot change to {proposed_order}"
            )
        } else {
            format!(
                "Cannot change order status from {current_order} to {proposed_order}; allowed: {}",
                describe(edges)
            )
        };
        out.push(Violation::new(Rule::OrderEdge, reason));
    }

    let effective_payment = proposed_payment.unwrap_or(current_payment);
    let required = allowed_payment_statuses(proposed_order);
    if !required.contains(&effective_payment) {
        out.push(Violation::new(
            Rule::StatusPair,
            format!(
                "Order status {proposed_order} requires payment status {} (got {effective_payment})",
                describe(required)
            ),
        ));
    }

    if proposed_order == OrderStatus::Canceled && cancel_blocked_by_payment(current_payment) {
        out.push(Violation::new(
            Rule::PaidOrderCannotCancel,
            "An order that has been paid cannot be canceled".to_string(),
        ));
    }

    out
}

fn payment_violations(
    current_payment: PaymentStatus,
    proposed_payment: PaymentStatus,
    order_status: OrderStatus,
) -> Vec<Violation> {
    let mut out = Vec::new();

    let edges = allowed_payment_transitions(current_payment);
    if !edges.contains(&proposed_payment) {
        let reason = if edges.is_empty() {
            format!(
                "Payment status {current_payment} is final; it cannot change to {proposed_payment}"
            )
        } else {
            format!(
                "Cannot change payment status from {current_payment} to {proposed_payment}; allowed: {}",
                describe(edges)
            )
        };
        out.push(Violation::new(Rule::PaymentEdge, reason));
    }

    if !is_valid_status_pair(order_status, proposed_payment) {
        out.push(Violation::new(
            Rule::StatusPair,
            format!(
                "Payment status {proposed_payment} is not allowed while the order is {order_status} (allowed: {})",
                describe(allowed_payment_statuses(order_status))
            ),
        ));
    }

    if payment_locked(order_status) {
        out.push(Violation::new(
            Rule::CompletedLocksPayment,
            "Payment status of a completed order cannot change".to_string(),
        ));
    }

    out
}

fn first(violations: Vec<Violation>) -> Validation {
    match violations.into_iter().next() {
        Some(v) => Validation::rejected(v.rule, v.reason),
        None => Validation::ok(),
    }
}

// ---------------------------------------------------------------------------
// Public checks
// ---------------------------------------------------------------------------

/// Check an order-status move.
///
/// `proposed_payment` is the payment status that will hold after the move when
/// the same request also changes payment; `None` keeps `current_payment`.
pub fn validate_order_transition(
    current_order: OrderStatus,
    proposed_order: OrderStatus,
    current_payment: PaymentStatus,
    proposed_payment: Option<PaymentStatus>,
) -> Validation {
    first(order_violations(
        current_order,
        proposed_order,
        current_payment,
        proposed_payment,
    ))
}

/// Check a payment-status move for an order currently in `order_status`.
pub fn validate_payment_transition(
    current_payment: PaymentStatus,
    proposed_payment: PaymentStatus,
    order_status: OrderStatus,
) -> Validation {
    first(payment_violations(
        current_payment,
        proposed_payment,
        order_status,
    ))
}

/// Boolean shorthand: order move that keeps the current payment status.
pub fn can_transition_order_status(
    current_order: OrderStatus,
    proposed_order: OrderStatus,
    payment: PaymentStatus,
) -> bool {
    validate_order_transition(current_order, proposed_order, payment, None).valid
}

pub fn can_transition_payment_status(
    current_payment: PaymentStatus,
    proposed_payment: PaymentStatus,
    order_status: OrderStatus,
) -> bool {
    validate_payment_transition(current_payment, proposed_payment, order_status).valid
}

// ---------------------------------------------------------------------------
// Combined update
// ---------------------------------------------------------------------------

/// Result of [`validate_status_update`]: one message per violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validate a request that may change order status, payment status, or both.
///
/// A proposed value equal to the current one is treated as "no change". The
/// payment axis is checked against the order status that results from the
/// same request, and the final pair is re-checked against the whitelist.
pub fn validate_status_update(
    current_order: OrderStatus,
    current_payment: PaymentStatus,
    proposed_order: Option<OrderStatus>,
    proposed_payment: Option<PaymentStatus>,
) -> StatusUpdateCheck {
    let new_order = proposed_order.filter(|o| *o != current_order);
    let new_payment = proposed_payment.filter(|p| *p != current_payment);

    let mut violations = Vec::new();

    if let Some(o) = new_order {
        violations.extend(order_violations(current_order, o, current_payment, new_payment));
    }

    let resulting_order = new_order.unwrap_or(current_order);
    if let Some(p) = new_payment {
        violations.extend(payment_violations(current_payment, p, resulting_order));
        // The lock follows the order as it is now, not where the request moves it.
        if payment_locked(current_order) && !payment_locked(resulting_order) {
            violations.push(Violation::new(
                Rule::CompletedLocksPayment,
                "Payment status of a completed order cannot change".to_string(),
            ));
        }
    }

    let resulting_payment = new_payment.unwrap_or(current_payment);
    if !is_valid_status_pair(resulting_order, resulting_payment) {
        violations.push(Violation::new(
            Rule::StatusPair,
            format!(
                "Status combination {resulting_order}/{resulting_payment} is not allowed"
            ),
        ));
    }

    let mut errors: Vec<String> = Vec::with_capacity(violations.len());
    for v in violations {
        if !errors.contains(&v.reason) {
            errors.push(v.reason);
        }
    }

    StatusUpdateCheck {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus as O;
    use PaymentStatus as P;

    #[test]
    fn booked_to_processing_requires_paid() {
        let v = validate_order_transition(O::Booked, O::Processing, P::Pending, None);
        // Graph edge fails first; the combined check reports the payment rule too.
        assert!(!v.valid);
        assert_eq!(v.rule, Some(Rule::OrderEdge));

        let check = validate_status_update(O::Booked, P::Pending, Some(O::Processing), None);
        assert!(!check.valid);
        assert!(
            check
                .errors
                .iter()
                .any(|e| e.contains("Processing requires payment status Paid")),
            "errors: {:?}",
            check.errors
        );
    }

    #[test]
    fn accepted_to_processing_needs_payment() {
        let v = validate_order_transition(O::Accepted, O::Processing, P::Pending, None);
        assert_eq!(v.rule, Some(Rule::StatusPair));
        assert_eq!(
            v.reason.as_deref(),
            Some("Order status Processing requires payment status Paid (got Pending)")
        );

        assert!(validate_order_transition(O::Accepted, O::Processing, P::Paid, None).valid);
        assert!(
            validate_order_transition(O::Accepted, O::Processing, P::Pending, Some(P::Paid)).valid,
            "paying in the same request satisfies the pair rule"
        );
    }

    #[test]
    fn paid_order_cannot_be_canceled() {
        let v = validate_order_transition(O::Accepted, O::Canceled, P::Paid, None);
        assert_eq!(v.rule, Some(Rule::PaidOrderCannotCancel));
        assert!(!can_transition_order_status(O::Booked, O::Canceled, P::Paid));
    }

    #[test]
    fn completed_locks_payment() {
        let check = validate_status_update(O::Completed, P::Paid, None, Some(P::Failed));
        assert!(!check.valid);
        assert!(check
            .errors
            .contains(&"Payment status of a completed order cannot change".to_string()));
    }

    #[test]
    fn failed_payment_can_retry() {
        assert!(validate_payment_transition(P::Failed, P::Pending, O::Canceled).valid);
        let v = validate_payment_transition(P::Pending, P::Failed, O::Accepted);
        assert!(!v.valid);
        assert_eq!(v.rule, Some(Rule::StatusPair));
    }

    #[test]
    fn status_update_collects_every_violation() {
        // Terminal order, terminal payment, bad pair: three distinct problems.
        let check = validate_status_update(O::Completed, P::Paid, Some(O::Booked), Some(P::Failed));
        assert!(!check.valid);
        assert!(check.errors.len() >= 3, "errors: {:?}", check.errors);
        let mut dedup = check.errors.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), check.errors.len(), "messages are de-duplicated");
    }

    #[test]
    fn no_change_is_valid() {
        let check = validate_status_update(O::Testing, P::Paid, Some(O::Testing), Some(P::Paid));
        assert_eq!(
            check,
            StatusUpdateCheck {
                valid: true,
                errors: vec![]
            }
        );
    }

    #[test]
    fn validation_wire_shape() {
        let ok = validate_payment_transition(P::Pending, P::Paid, O::Accepted);
        assert_eq!(ok, Validation::ok());
        assert_eq!(serde_json::to_value(&ok).unwrap(), serde_json::json!({"valid": true}));

        let bad = validate_order_transition(O::Canceled, O::Booked, P::Pending, None);
        assert!(!bad.valid);
        assert!(bad.reason.as_deref().unwrap_or("").contains("final"));
        let json = serde_json::to_value(&bad).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["rule"], "order_edge");
    }
}
