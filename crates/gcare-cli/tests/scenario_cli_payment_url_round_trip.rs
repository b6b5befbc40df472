//! Scenario: a URL signed by `gcare payment url` verifies with
//! `gcare payment verify`, and a tampered copy does not.
//!
//! Secrets come from env vars named in `config/base.yaml`; no DB required.

use assert_cmd::Command;
use predicates::prelude::*;

const TMN: &str = "GCARECLI";
const SECRET: &str = "GCARECLITESTHASHSECRET0000000001";

fn base_config() -> String {
    format!("{}/../../config/base.yaml", env!("CARGO_MANIFEST_DIR"))
}

fn gcare() -> Command {
    let mut cmd = Command::cargo_bin("gcare").expect("gcare binary");
    cmd.env("VNP_TMN_CODE", TMN).env("VNP_HASH_SECRET", SECRET);
    cmd
}

fn build_url() -> String {
    let out = gcare()
        .args([
            "payment",
            "url",
            "--config",
            &base_config(),
            "--order",
            "3f2c1d9e-8a4b-4c6d-9e1f-2a3b4c5d6e7f",
            "--amount",
            "150000",
            "--ip",
            "::1",
        ])
        .output()
        .expect("run gcare payment url");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("url="))
        .expect("url= line")
        .to_string()
}

#[test]
fn signed_url_verifies() {
    let url = build_url();
    assert!(url.contains("vnp_Amount=15000000"));
    assert!(url.contains("vnp_TmnCode=GCARECLI"));
    assert!(url.contains("vnp_IpAddr=127.0.0.1"));

    gcare()
        .args(["payment", "verify", "--config", &base_config(), &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid=true"))
        .stdout(predicate::str::contains("amount=150000"))
        .stdout(predicate::str::contains(
            "order_id=3f2c1d9e-8a4b-4c6d-9e1f-2a3b4c5d6e7f",
        ));
}

#[test]
fn tampered_url_fails() {
    let url = build_url().replace("vnp_Amount=15000000", "vnp_Amount=100");

    gcare()
        .args(["payment", "verify", "--config", &base_config(), &url])
        .assert()
        .failure()
        .stdout(predicate::str::contains("valid=false"))
        .stderr(predicate::str::contains("SIGNATURE_INVALID"));
}

#[test]
fn missing_secret_names_the_variable() {
    Command::cargo_bin("gcare")
        .expect("gcare binary")
        .env_remove("VNP_TMN_CODE")
        .env_remove("VNP_HASH_SECRET")
        .args([
            "payment",
            "url",
            "--config",
            &base_config(),
            "--order",
            "3f2c1d9e-8a4b-4c6d-9e1f-2a3b4c5d6e7f",
            "--amount",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains("VNP_TMN_CODE"));
}
