//! Status-table queries for operators: what a proposed change would violate,
//! and what a role would be offered for an order in a given pair.

use anyhow::{bail, Context, Result};
use gcare_schemas::{OrderStatus, PaymentStatus, Role};
use gcare_status::{available_actions, validate_status_update};

pub fn validate(
    order_status: &str,
    payment_status: &str,
    to_order: Option<&str>,
    to_payment: Option<&str>,
) -> Result<()> {
    let current_order = OrderStatus::parse(order_status).context("invalid --order-status")?;
    let current_payment = PaymentStatus::parse(payment_status).context("invalid --payment-status")?;
    let proposed_order = to_order
        .map(OrderStatus::parse)
        .transpose()
        .context("invalid --to-order")?;
    let proposed_payment = to_payment
        .map(PaymentStatus::parse)
        .transpose()
        .context("invalid --to-payment")?;

    let check = validate_status_update(
        current_order,
        current_payment,
        proposed_order,
        proposed_payment,
    );
    println!("valid={}", check.valid);
    for e in &check.errors {
        println!("error={e}");
    }
    if !check.valid {
        bail!("TRANSITION_REJECTED: {} rule(s) violated", check.errors.len());
    }
    Ok(())
}

pub fn actions(order_status: &str, payment_status: &str, role: &str) -> Result<()> {
    let order = OrderStatus::parse(order_status).context("invalid --order-status")?;
    let payment = PaymentStatus::parse(payment_status).context("invalid --payment-status")?;
    let role = Role::parse(role).context("invalid --role")?;

    let a = available_actions(order, payment, role);
    let json = serde_json::to_string_pretty(&a).context("serialize actions failed")?;
    println!("{json}");
    Ok(())
}
