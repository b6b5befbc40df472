//! Role capability checks.
//!
//! Every role-based branch in the service goes through these functions; no
//! caller compares role strings directly.

use gcare_schemas::{OrderStatus, Role};

/// Staff-side roles may move payment status by hand.
pub fn can_manage_payments(role: Role) -> bool {
    !matches!(role, Role::Customer)
}

/// Staff-side roles may drive the order through its clinical lifecycle.
pub fn can_manage_orders(role: Role) -> bool {
    !matches!(role, Role::Customer)
}

/// Whether `role` may request a move to `target` at all. Legality of the
/// move itself is the validator's job.
///
/// Customers may only cancel.
pub fn may_request_order_status(role: Role, target: OrderStatus) -> bool {
    can_manage_orders(role) || target == OrderStatus::Canceled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_customer_is_refused_payment_management() {
        for role in Role::ALL {
            assert_eq!(can_manage_payments(role), role != Role::Customer, "{role}");
        }
    }

    #[test]
    fn customer_may_only_request_cancel() {
        for target in OrderStatus::ALL {
            assert_eq!(
                may_request_order_status(Role::Customer, target),
                target == OrderStatus::Canceled
            );
            assert!(may_request_order_status(Role::Staff, target));
        }
    }
}
