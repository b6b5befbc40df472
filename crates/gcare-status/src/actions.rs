//! Action-availability resolver.
//!
//! Derives the flags a dashboard needs from the validator and the role
//! policy. Stateless: every call is independent.

use gcare_schemas::{OrderStatus, PaymentStatus, Role};
use serde::{Deserialize, Serialize};

use crate::policy::{can_manage_payments, may_request_order_status};
use crate::table::{allowed_order_transitions, allowed_payment_transitions};
use crate::validator::{can_transition_order_status, can_transition_payment_status};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableActions {
    pub can_edit: bool,
    pub can_cancel: bool,
    pub can_confirm: bool,
    pub can_process: bool,
    pub can_complete: bool,
    pub can_update_payment: bool,
    pub available_order_transitions: Vec<OrderStatus>,
    pub available_payment_transitions: Vec<PaymentStatus>,
}

/// Graph neighbours of `order` that also satisfy the whitelist with the
/// current payment status.
pub fn available_order_statuses(order: OrderStatus, payment: PaymentStatus) -> Vec<OrderStatus> {
    allowed_order_transitions(order)
        .iter()
        .copied()
        .filter(|next| can_transition_order_status(order, *next, payment))
        .collect()
}

/// Payment-graph neighbours of `payment` that are legal for `order`.
pub fn available_payment_statuses(
    payment: PaymentStatus,
    order: OrderStatus,
) -> Vec<PaymentStatus> {
    allowed_payment_transitions(payment)
        .iter()
        .copied()
        .filter(|next| can_transition_payment_status(payment, *next, order))
        .collect()
}

pub fn available_actions(order: OrderStatus, payment: PaymentStatus, role: Role) -> AvailableActions {
    let order_moves = available_order_statuses(order, payment);
    let payment_moves = available_payment_statuses(payment, order);

    let offers = |target: OrderStatus| {
        order_moves.contains(&target) && may_request_order_status(role, target)
    };

    AvailableActions {
        can_edit: !order.is_terminal(),
        can_cancel: offers(OrderStatus::Canceled),
        can_confirm: offers(OrderStatus::Accepted),
        can_process: offers(OrderStatus::Processing),
        can_complete: offers(OrderStatus::Completed),
        can_update_payment: !payment_moves.is_empty() && can_manage_payments(role),
        available_order_transitions: order_moves,
        available_payment_transitions: payment_moves,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus as O;
    use PaymentStatus as P;

    #[test]
    fn booked_order_for_staff() {
        let a = available_actions(O::Booked, P::Pending, Role::Staff);
        assert!(a.can_edit);
        assert!(a.can_confirm);
        assert!(a.can_cancel);
        assert!(!a.can_process);
        assert_eq!(a.available_order_transitions, vec![O::Accepted, O::Canceled]);
        // Booked only allows Pending, so Pending -> Paid/Failed is not offered.
        assert!(a.available_payment_transitions.is_empty());
        assert!(!a.can_update_payment);
    }

    #[test]
    fn accepted_pending_offers_payment_to_staff_only() {
        let staff = available_actions(O::Accepted, P::Pending, Role::Staff);
        assert_eq!(staff.available_payment_transitions, vec![P::Paid]);
        assert!(staff.can_update_payment);
        // Processing needs Paid.
        assert!(!staff.can_process);

        let customer = available_actions(O::Accepted, P::Pending, Role::Customer);
        assert!(!customer.can_update_payment);
        assert!(customer.can_cancel);
        assert!(!customer.can_confirm);
    }

    #[test]
    fn paid_accepted_order_can_process_but_not_cancel() {
        let a = available_actions(O::Accepted, P::Paid, Role::Manager);
        assert!(a.can_process);
        assert!(!a.can_cancel);
        assert_eq!(a.available_order_transitions, vec![O::Processing]);
    }

    #[test]
    fn completed_order_has_no_actions() {
        let a = available_actions(O::Completed, P::Paid, Role::Admin);
        assert!(!a.can_edit);
        assert!(!a.can_complete);
        assert!(!a.can_update_payment);
        assert!(a.available_order_transitions.is_empty());
        assert!(a.available_payment_transitions.is_empty());
    }

    #[test]
    fn testing_order_can_complete() {
        let a = available_actions(O::Testing, P::Paid, Role::Staff);
        assert!(a.can_complete);
        assert!(a.can_edit);
    }
}
