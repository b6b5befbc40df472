//! Scenario: operator queries that need neither DB nor secrets.

use assert_cmd::Command;
use predicates::prelude::*;

fn gcare() -> Command {
    Command::cargo_bin("gcare").expect("gcare binary")
}

#[test]
fn config_hash_is_printed_with_canonical_json() {
    let base = format!("{}/../../config/base.yaml", env!("CARGO_MANIFEST_DIR"));
    gcare()
        .args(["config-hash", &base])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^config_hash=[0-9a-f]{64}\n").unwrap())
        .stdout(predicate::str::contains("\"keys_env\""));
}

#[test]
fn booked_to_processing_is_rejected_with_reason() {
    gcare()
        .args([
            "status",
            "validate",
            "--order-status",
            "Booked",
            "--payment-status",
            "Pending",
            "--to-order",
            "Processing",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("valid=false"))
        .stdout(predicate::str::contains("Processing requires payment status Paid"))
        .stderr(predicate::str::contains("TRANSITION_REJECTED"));
}

#[test]
fn accepted_paid_to_processing_is_valid() {
    gcare()
        .args([
            "status",
            "validate",
            "--order-status",
            "Accepted",
            "--payment-status",
            "Paid",
            "--to-order",
            "Processing",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid=true"));
}

#[test]
fn actions_for_customer() {
    gcare()
        .args([
            "status",
            "actions",
            "--order-status",
            "Booked",
            "--payment-status",
            "Pending",
            "--role",
            "customer",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"can_cancel\": true"))
        .stdout(predicate::str::contains("\"can_confirm\": false"));
}

#[test]
fn unknown_status_is_an_error() {
    gcare()
        .args(["status", "validate", "--order-status", "Shipped", "--payment-status", "Pending"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--order-status"));
}
