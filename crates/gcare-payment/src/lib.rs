//! gcare-payment
//!
//! VNPay integration for STI test orders.
//!
//! - `canonical` + `signer`: the signed query-string format (HMAC-SHA512)
//! - `gateway`: payment URL building and callback verification
//! - `response_codes`: customer-facing messages per gateway response code
//! - `reconcile`: idempotent application of a verified callback to storage
//! - `ack`: IPN acknowledgement body and return-URL redirect target
//!
//! Only `reconcile` performs IO, and only through the `gcare-db` store traits.

pub mod ack;
pub mod canonical;
pub mod gateway;
pub mod reconcile;
pub mod response_codes;
pub mod signer;

pub use ack::{IpnAck, ReturnRedirect};
pub use gateway::{GatewayError, PaymentRequest, PaymentUrl, VerifiedCallback, VnpayGateway};
pub use reconcile::{
    check_payable, process_payment_result, ReconcileError, ReconcileOutcome,
    ALREADY_PROCESSED_MESSAGE,
};
