//! What the gateway and the customer's browser are told.
//!
//! The IPN caller always gets HTTP 200 with `{RspCode, Message}` in the
//! gateway's own vocabulary. The browser coming back through the return URL
//! is redirected to a frontend page; internal errors are reduced to a code.

use serde::Serialize;

use crate::gateway::VerifiedCallback;
use crate::reconcile::{ReconcileError, ReconcileOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IpnAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnAck {
    pub const CONFIRM_SUCCESS: IpnAck = IpnAck {
        rsp_code: "00",
        message: "Confirm Success",
    };
    pub const ORDER_NOT_FOUND: IpnAck = IpnAck {
        rsp_code: "01",
        message: "Order not found",
    };
    pub const INVALID_AMOUNT: IpnAck = IpnAck {
        rsp_code: "04",
        message: "Invalid amount",
    };
    pub const CHECKSUM_FAILED: IpnAck = IpnAck {
        rsp_code: "97",
        message: "Checksum failed",
    };
    pub const UNKNOWN_ERROR: IpnAck = IpnAck {
        rsp_code: "99",
        message: "Unknown error",
    };

    /// Acknowledgement for a callback that passed signature verification.
    /// A settled failure (customer cancelled, card declined) is still a
    /// successfully recorded notification.
    pub fn for_result(result: &Result<ReconcileOutcome, ReconcileError>) -> IpnAck {
        match result {
            Ok(_) => IpnAck::CONFIRM_SUCCESS,
            Err(e) => IpnAck::for_error(e),
        }
    }

    pub fn for_error(err: &ReconcileError) -> IpnAck {
        match err {
            ReconcileError::NotFound { .. } => IpnAck::ORDER_NOT_FOUND,
            ReconcileError::AmountMismatch { .. } => IpnAck::INVALID_AMOUNT,
            ReconcileError::Store(_) | ReconcileError::OrderAdvance { .. } => {
                IpnAck::UNKNOWN_ERROR
            }
        }
    }
}

/// Frontend page the return URL redirects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnRedirect {
    Success { order_id: String, amount: i64 },
    Failure { code: String },
}

impl ReturnRedirect {
    pub fn checksum_failed() -> Self {
        ReturnRedirect::Failure {
            code: "97".to_string(),
        }
    }

    pub fn for_result(
        callback: &VerifiedCallback,
        result: &Result<ReconcileOutcome, ReconcileError>,
    ) -> Self {
        match result {
            Ok(outcome) if outcome.is_paid() => {
                let payment = outcome.payment();
                ReturnRedirect::Success {
                    order_id: payment.order_id.to_string(),
                    amount: payment.amount,
                }
            }
            Ok(outcome) => ReturnRedirect::Failure {
                code: outcome
                    .payment()
                    .response_code
                    .clone()
                    .unwrap_or_else(|| callback.response_code.clone()),
            },
            Err(e) => ReturnRedirect::Failure {
                code: IpnAck::for_error(e).rsp_code.to_string(),
            },
        }
    }

    /// Absolute URL under `frontend_url`.
    pub fn to_url(&self, frontend_url: &str) -> String {
        let base = frontend_url.trim_end_matches('/');
        match self {
            ReturnRedirect::Success { order_id, amount } => {
                format!("{base}/payment/success?orderId={order_id}&amount={amount}")
            }
            ReturnRedirect::Failure { code } => {
                format!(
                    "{base}/payment/failure?code={}",
                    crate::canonical::encode_component(code)
                )
            }
        }
    }
}
