//! Status constraint table.
//!
//! Pure data: every answer is a `&'static` slice produced by an exhaustive
//! `match`, so the table is immutable for the life of the process and can be
//! read from any thread without locking.
//!
//! ```text
//!  Booked ──► Accepted ──► Processing ──► SpecimenCollected ──► Testing ──► Completed (term.)
//!    │           │
//!    └───────────┴──► Canceled (term.)
//!
//!  Pending ──► Paid (term.)        Failed ──► Pending | Paid
//!     └──────► Failed
//! ```

use gcare_schemas::{OrderStatus, PaymentStatus};

// ---------------------------------------------------------------------------
// Transition graphs
// ---------------------------------------------------------------------------

/// Order statuses reachable in one step from `from`.
pub fn allowed_order_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Booked => &[Accepted, Canceled],
        Accepted => &[Processing, Canceled],
        Processing => &[SpecimenCollected],
        SpecimenCollected => &[Testing],
        Testing => &[Completed],
        Completed | Canceled => &[],
    }
}

/// Payment statuses reachable in one step from `from`.
pub fn allowed_payment_transitions(from: PaymentStatus) -> &'static [PaymentStatus] {
    use PaymentStatus::*;
    match from {
        Pending => &[Paid, Failed],
        Paid => &[],
        Failed => &[Pending, Paid],
    }
}

// ---------------------------------------------------------------------------
// Pair whitelist
// ---------------------------------------------------------------------------

/// Payment statuses an order in `order` may carry.
pub fn allowed_payment_statuses(order: OrderStatus) -> &'static [PaymentStatus] {
    use OrderStatus as O;
    use PaymentStatus as P;
    match order {
        O::Booked => &[P::Pending],
        O::Accepted => &[P::Pending, P::Paid],
        O::Processing | O::SpecimenCollected | O::Testing | O::Completed => &[P::Paid],
        O::Canceled => &[P::Pending, P::Paid, P::Failed],
    }
}

/// Inverse view of the whitelist: order statuses compatible with `payment`.
pub fn allowed_order_statuses(payment: PaymentStatus) -> Vec<OrderStatus> {
    OrderStatus::ALL
        .into_iter()
        .filter(|o| allowed_payment_statuses(*o).contains(&payment))
        .collect()
}

pub fn is_valid_status_pair(order: OrderStatus, payment: PaymentStatus) -> bool {
    allowed_payment_statuses(order).contains(&payment)
}

// ---------------------------------------------------------------------------
// Special rules
// ---------------------------------------------------------------------------

/// A paid order can never be canceled, whatever the graph says.
pub fn cancel_blocked_by_payment(payment: PaymentStatus) -> bool {
    payment == PaymentStatus::Paid
}

/// Payment status of a completed order is frozen.
pub fn payment_locked(order: OrderStatus) -> bool {
    order == OrderStatus::Completed
}

/// Render a status set for human-readable messages ("Pending, Paid").
pub(crate) fn describe<T: std::fmt::Display>(set: &[T]) -> String {
    if set.is_empty() {
        return "none".to_string();
    }
    set.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
