//! Offline gateway tooling: build a signed payment URL, or check the
//! signature of a callback query copied from logs.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use gcare_config::secrets::resolve_gateway_secrets;
use gcare_payment::{PaymentRequest, VnpayGateway};
use uuid::Uuid;

use super::{load_config, opt_str};

fn gateway_from_config(config_paths: &[String]) -> Result<VnpayGateway> {
    let loaded = load_config(config_paths)?;
    let settings = loaded.settings()?;
    let secrets = resolve_gateway_secrets(&loaded.config_json)?;
    VnpayGateway::new(settings.gateway, secrets).context("gateway configuration rejected")
}

pub fn build_url(
    config_paths: &[String],
    order_id: &str,
    amount: i64,
    client_ip: &str,
    bank_code: Option<String>,
    locale: Option<String>,
) -> Result<()> {
    let order_id = Uuid::parse_str(order_id).context("invalid --order uuid")?;
    let gateway = gateway_from_config(config_paths)?;

    let built = gateway
        .build_payment_url(
            &PaymentRequest {
                order_id,
                amount,
                client_ip: client_ip.to_string(),
                bank_code,
                locale,
            },
            Utc::now(),
        )
        .context("build payment url failed")?;

    println!("txn_ref={}", built.txn_ref);
    println!("secure_hash={}", built.secure_hash);
    println!("url={}", built.url);
    Ok(())
}

/// Exits non-zero when the signature does not verify.
pub fn verify(config_paths: &[String], query: &str) -> Result<()> {
    let gateway = gateway_from_config(config_paths)?;
    let params = parse_query(query)?;
    let v = gateway.verify_callback(&params);

    println!("valid={}", v.is_valid);
    println!("txn_ref={}", v.txn_ref);
    println!(
        "order_id={}",
        v.order_id.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string())
    );
    println!(
        "amount={}",
        v.amount.map(|a| a.to_string()).unwrap_or_else(|| "none".to_string())
    );
    println!("response_code={}", v.response_code);
    println!("bank_code={}", opt_str(v.bank_code.as_deref()));
    println!("message={}", v.message);

    if !v.is_valid {
        bail!("SIGNATURE_INVALID: callback signature does not verify with the configured key");
    }
    Ok(())
}

/// Accepts a bare query string or a full URL. Decoded with the same
/// form-urlencoded rules as the daemon's `Query` extractor, so `+` is a space
/// and a repeated key keeps its last value.
pub fn parse_query(raw: &str) -> Result<BTreeMap<String, String>> {
    let query = raw.trim();
    let query = query.split_once('?').map(|(_, q)| q).unwrap_or(query);
    serde_urlencoded::from_str(query).context("callback query is not form-encoded")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_decodes_plus_and_percent() {
        let p = parse_query("https://x.test/ret?vnp_OrderInfo=Thanh+toan%3A+1&vnp_Amount=100").unwrap();
        assert_eq!(p["vnp_OrderInfo"], "Thanh toan: 1");
        assert_eq!(p["vnp_Amount"], "100");
    }

    #[test]
    fn parse_query_tolerates_bare_keys_and_empty_pairs() {
        let p = parse_query("a=1&&b").unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p["b"], "");
    }

    #[test]
    fn parse_query_keeps_encoded_plus_and_last_duplicate() {
        let p = parse_query("vnp_OrderInfo=a%2Bb&vnp_BankCode=NCB&vnp_BankCode=VCB").unwrap();
        assert_eq!(p["vnp_OrderInfo"], "a+b");
        assert_eq!(p["vnp_BankCode"], "VCB");
    }
}
