//! VNPay adapter: signed payment-initiation URLs and callback verification.
//!
//! Pure and synchronous. The adapter never touches storage; callers hand a
//! [`VerifiedCallback`] to the reconciliation handler only when `is_valid`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use gcare_config::secrets::GatewaySecrets;
use gcare_config::GatewaySettings;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canonical::canonical_query;
use crate::response_codes;
use crate::signer::Signer;

pub const PARAM_SECURE_HASH: &str = "vnp_SecureHash";
pub const PARAM_SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// Wall-clock format of `vnp_CreateDate`, `vnp_ExpireDate` and `vnp_PayDate`.
pub const GATEWAY_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// The gateway counts in hundredths of a dong.
const MINOR_UNITS: i64 = 100;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The configured zone name is not a known IANA zone.
    InvalidTimezone(String),
    /// The hashing key is empty.
    InvalidKey,
    /// Amount must be positive and small enough to express in minor units.
    InvalidAmount(i64),
    InvalidLocale(String),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::InvalidTimezone(tz) => write!(f, "unknown gateway timezone: {tz}"),
            GatewayError::InvalidKey => write!(f, "gateway hash secret is empty"),
            GatewayError::InvalidAmount(a) => write!(f, "invalid payment amount: {a}"),
            GatewayError::InvalidLocale(l) => write!(f, "unsupported gateway locale: {l}"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub order_id: Uuid,
    /// Whole VND.
    pub amount: i64,
    pub client_ip: String,
    pub bank_code: Option<String>,
    /// `vn` or `en`; the configured default when absent.
    pub locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUrl {
    pub url: String,
    pub txn_ref: String,
    pub secure_hash: String,
    /// Parameters as signed (without `vnp_SecureHash`).
    pub params: BTreeMap<String, String>,
}

/// Result of checking an inbound callback. Built for every callback, valid
/// or not, so handlers can log and acknowledge uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCallback {
    pub is_valid: bool,
    pub response_code: String,
    pub transaction_status: Option<String>,
    pub txn_ref: String,
    /// Parsed from the `{order_id}_{millis}` transaction reference.
    pub order_id: Option<Uuid>,
    /// Whole VND (`vnp_Amount / 100`).
    pub amount: Option<i64>,
    pub bank_code: Option<String>,
    pub gateway_txn_no: Option<String>,
    pub pay_date: Option<String>,
    pub message: String,
}

impl VerifiedCallback {
    pub fn is_success(&self) -> bool {
        self.is_valid && response_codes::is_success(&self.response_code)
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VnpayGateway {
    settings: GatewaySettings,
    tmn_code: String,
    signer: Signer,
    tz: Tz,
}

impl VnpayGateway {
    pub fn new(settings: GatewaySettings, secrets: GatewaySecrets) -> Result<Self, GatewayError> {
        let tz: Tz = settings
            .timezone
            .parse()
            .map_err(|_| GatewayError::InvalidTimezone(settings.timezone.clone()))?;
        let signer = Signer::new(&secrets.hash_secret).ok_or(GatewayError::InvalidKey)?;
        Ok(Self {
            settings,
            tmn_code: secrets.tmn_code,
            signer,
            tz,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Assemble, sign and render the redirect URL for one payment attempt.
    /// `now` fixes the transaction reference and the create/expire dates.
    pub fn build_payment_url(
        &self,
        req: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentUrl, GatewayError> {
        if req.amount <= 0 {
            return Err(GatewayError::InvalidAmount(req.amount));
        }
        let minor = req
            .amount
            .checked_mul(MINOR_UNITS)
            .ok_or(GatewayError::InvalidAmount(req.amount))?;

        let locale = req
            .locale
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.settings.locale.as_str());
        if !matches!(locale, "vn" | "en") {
            return Err(GatewayError::InvalidLocale(locale.to_string()));
        }

        let txn_ref = make_txn_ref(req.order_id, now);
        let local_now = now.with_timezone(&self.tz);
        let expire = local_now + Duration::minutes(self.settings.expire_minutes);

        let mut params: BTreeMap<String, String> = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            params.insert(k.to_string(), v);
        };
        put("vnp_Version", self.settings.version.clone());
        put("vnp_Command", "pay".to_string());
        put("vnp_TmnCode", self.tmn_code.clone());
        put("vnp_Locale", locale.to_string());
        put("vnp_CurrCode", self.settings.currency.clone());
        put("vnp_TxnRef", txn_ref.clone());
        put("vnp_OrderInfo", format!("Thanh toan don hang {}", req.order_id));
        put("vnp_OrderType", self.settings.order_type.clone());
        put("vnp_Amount", minor.to_string());
        put("vnp_ReturnUrl", self.settings.return_url.clone());
        put("vnp_IpAddr", normalize_client_ip(&req.client_ip));
        put("vnp_CreateDate", local_now.format(GATEWAY_TIME_FORMAT).to_string());
        put("vnp_ExpireDate", expire.format(GATEWAY_TIME_FORMAT).to_string());
        if let Some(bank) = req.bank_code.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            put("vnp_BankCode", bank.to_string());
        }

        let signed = canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let secure_hash = self.signer.sign(&signed);
        let url = format!(
            "{}?{}&{}={}",
            self.settings.pay_url, signed, PARAM_SECURE_HASH, secure_hash
        );

        Ok(PaymentUrl {
            url,
            txn_ref,
            secure_hash,
            params,
        })
    }

    /// Re-derive the signed input from `params` minus the signature fields and
    /// compare. Missing or malformed signatures are invalid, never an error.
    pub fn verify_callback(&self, params: &BTreeMap<String, String>) -> VerifiedCallback {
        let provided = params.get(PARAM_SECURE_HASH).map(String::as_str).unwrap_or("");

        let signed = canonical_query(
            params
                .iter()
                .filter(|(k, _)| k.as_str() != PARAM_SECURE_HASH && k.as_str() != PARAM_SECURE_HASH_TYPE)
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        let is_valid = !provided.is_empty() && self.signer.verify(&signed, provided);

        let get = |k: &str| params.get(k).cloned().filter(|v| !v.is_empty());
        let response_code = get("vnp_ResponseCode").unwrap_or_default();
        let txn_ref = get("vnp_TxnRef").unwrap_or_default();
        let amount = get("vnp_Amount")
            .and_then(|a| a.parse::<i64>().ok())
            .map(|minor| minor / MINOR_UNITS);

        let message = if is_valid {
            response_codes::message(&response_code).to_string()
        } else {
            "Chữ ký không hợp lệ".to_string()
        };

        VerifiedCallback {
            is_valid,
            order_id: order_id_from_txn_ref(&txn_ref),
            transaction_status: get("vnp_TransactionStatus"),
            bank_code: get("vnp_BankCode"),
            gateway_txn_no: get("vnp_TransactionNo"),
            pay_date: get("vnp_PayDate"),
            response_code,
            txn_ref,
            amount,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `{order_id}_{epoch_millis}`: unique per attempt, and the order id is
/// recoverable from the gateway's echo.
pub fn make_txn_ref(order_id: Uuid, now: DateTime<Utc>) -> String {
    format!("{}_{}", order_id, now.timestamp_millis())
}

pub fn order_id_from_txn_ref(txn_ref: &str) -> Option<Uuid> {
    let (id, millis) = txn_ref.rsplit_once('_')?;
    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Uuid::parse_str(id).ok()
}

/// The gateway rejects IPv6 loopback and v4-mapped forms.
pub fn normalize_client_ip(ip: &str) -> String {
    let ip = ip.trim();
    if ip == "::1" {
        return "127.0.0.1".to_string();
    }
    ip.strip_prefix("::ffff:").unwrap_or(ip).to_string()
}

/// Parse a `yyyyMMddHHmmss` wall-clock timestamp in `tz`.
pub fn parse_gateway_time(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), GATEWAY_TIME_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}
