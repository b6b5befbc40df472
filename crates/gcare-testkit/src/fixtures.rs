//! Gateway fixtures: a sandbox-shaped configuration and callbacks signed the
//! way the gateway signs them.

use std::collections::BTreeMap;

use gcare_config::secrets::GatewaySecrets;
use gcare_config::GatewaySettings;
use gcare_payment::canonical::canonical_query;
use gcare_payment::signer::Signer;
use gcare_payment::{GatewayError, VnpayGateway};
use gcare_schemas::PaymentRecord;

pub const TEST_TMN_CODE: &str = "GCARETST";
pub const TEST_HASH_SECRET: &str = "GCARETESTKITHASHSECRET000000001";
pub const TEST_TIMEZONE: &str = "Asia/Ho_Chi_Minh";

pub fn test_gateway_settings() -> GatewaySettings {
    GatewaySettings {
        pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        return_url: "http://localhost:8080/v1/payments/vnpay/return".to_string(),
        version: "2.1.0".to_string(),
        locale: "vn".to_string(),
        currency: "VND".to_string(),
        order_type: "other".to_string(),
        expire_minutes: 15,
        timezone: TEST_TIMEZONE.to_string(),
    }
}

pub fn test_gateway() -> Result<VnpayGateway, GatewayError> {
    VnpayGateway::new(
        test_gateway_settings(),
        GatewaySecrets {
            tmn_code: TEST_TMN_CODE.to_string(),
            hash_secret: TEST_HASH_SECRET.to_string(),
        },
    )
}

/// Callback parameters for `record` with the given response code, at the
/// record's amount.
pub fn callback_params(record: &PaymentRecord, response_code: &str) -> BTreeMap<String, String> {
    callback_params_with_amount(record, response_code, record.amount.saturating_mul(100))
}

/// Same as [`callback_params`] with an explicit `vnp_Amount` in minor units.
pub fn callback_params_with_amount(
    record: &PaymentRecord,
    response_code: &str,
    amount_minor: i64,
) -> BTreeMap<String, String> {
    let mut p = BTreeMap::new();
    p.insert("vnp_Amount".to_string(), amount_minor.to_string());
    p.insert("vnp_BankCode".to_string(), "NCB".to_string());
    p.insert(
        "vnp_OrderInfo".to_string(),
        format!("Thanh toan don hang {}", record.order_id),
    );
    p.insert("vnp_PayDate".to_string(), "20250702063000".to_string());
    p.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    p.insert("vnp_TmnCode".to_string(), TEST_TMN_CODE.to_string());
    p.insert("vnp_TransactionNo".to_string(), "14226112".to_string());
    p.insert("vnp_TransactionStatus".to_string(), response_code.to_string());
    p.insert("vnp_TxnRef".to_string(), record.txn_ref.clone());
    p
}

/// Add `vnp_SecureHash` (and its type) computed with `secret`.
pub fn sign_params(mut params: BTreeMap<String, String>, secret: &str) -> BTreeMap<String, String> {
    params.remove("vnp_SecureHash");
    params.remove("vnp_SecureHashType");
    let canonical = canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if let Some(signer) = Signer::new(secret) {
        params.insert("vnp_SecureHash".to_string(), signer.sign(&canonical));
    }
    params.insert("vnp_SecureHashType".to_string(), "HmacSHA512".to_string());
    params
}

/// Signed callback for `record` under the test secret.
pub fn signed_callback(record: &PaymentRecord, response_code: &str) -> BTreeMap<String, String> {
    sign_params(callback_params(record, response_code), TEST_HASH_SECRET)
}

/// Render params as a query string, for driving the HTTP endpoints.
pub fn to_query_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                gcare_payment::canonical::encode_component(k),
                gcare_payment::canonical::encode_component(v)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
