//! gcare-schemas
//!
//! Shared domain types for STI orders and gateway payment records.
//!
//! Every status enum has a stable string form (`as_str` / `parse`) that is
//! used verbatim in Postgres columns and JSON bodies. No business rules live
//! here; the legal (order, payment) combinations are owned by `gcare-status`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

/// Returned when a stored or submitted status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Which enum was being parsed ("order_status", "payment_status", ...).
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle stage of an STI test order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Customer placed the order. Initial state.
    Booked,
    /// Staff accepted the order; payment may now be collected.
    Accepted,
    Processing,
    SpecimenCollected,
    Testing,
    /// Results delivered. **Terminal.**
    Completed,
    /// **Terminal.**
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Booked,
        OrderStatus::Accepted,
        OrderStatus::Processing,
        OrderStatus::SpecimenCollected,
        OrderStatus::Testing,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Booked => "Booked",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::Processing => "Processing",
            OrderStatus::SpecimenCollected => "SpecimenCollected",
            OrderStatus::Testing => "Testing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Canceled => "Canceled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseError {
                kind: "order_status",
                value: s.to_string(),
            })
    }

    /// Returns `true` if no further order transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

// ---------------------------------------------------------------------------
// PaymentStatus (order axis)
// ---------------------------------------------------------------------------

/// Payment stage as tracked on the order itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    /// **Terminal.**
    Paid,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseError {
                kind: "payment_status",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// PaymentRecordStatus (gateway attempt axis)
// ---------------------------------------------------------------------------

/// Status of a single gateway payment attempt.
///
/// A record leaves `Pending` at most once; every other value is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentRecordStatus {
    Pending,
    Success,
    Failed,
    /// Set only by operator tooling, never by the reconciliation path.
    Cancelled,
}

impl PaymentRecordStatus {
    pub const ALL: [PaymentRecordStatus; 4] = [
        PaymentRecordStatus::Pending,
        PaymentRecordStatus::Success,
        PaymentRecordStatus::Failed,
        PaymentRecordStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordStatus::Pending => "Pending",
            PaymentRecordStatus::Success => "Success",
            PaymentRecordStatus::Failed => "Failed",
            PaymentRecordStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseError {
                kind: "payment_record_status",
                value: s.to_string(),
            })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Actor role as resolved by the upstream authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Consultant,
    Staff,
    Manager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Customer,
        Role::Consultant,
        Role::Staff,
        Role::Manager,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Consultant => "consultant",
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let t = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == t)
            .ok_or_else(|| ParseError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

macro_rules! string_forms {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $ty {
                type Err = ParseError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::parse(s)
                }
            }
        )+
    };
}

string_forms!(OrderStatus, PaymentStatus, PaymentRecordStatus, Role);

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// The joint status of an order. Writes compare-and-swap on this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusPair {
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl StatusPair {
    pub fn new(order_status: OrderStatus, payment_status: PaymentStatus) -> Self {
        Self {
            order_status,
            payment_status,
        }
    }
}

impl fmt::Display for StatusPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.order_status, self.payment_status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub customer_id: String,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Whole VND. The gateway minor-unit conversion happens at the adapter.
    pub total_amount: i64,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl Order {
    pub fn status_pair(&self) -> StatusPair {
        StatusPair::new(self.order_status, self.payment_status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: Uuid,
    pub customer_id: String,
    pub total_amount: i64,
}

// ---------------------------------------------------------------------------
// PaymentRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    /// `{order_id}_{epoch_millis}`; unique per attempt.
    pub txn_ref: String,
    /// Whole VND.
    pub amount: i64,
    pub status: PaymentRecordStatus,
    pub response_code: Option<String>,
    pub gateway_txn_no: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date_utc: Option<DateTime<Utc>>,
    pub client_ip: String,
    /// Verbatim callback parameters from the settling callback.
    pub raw_callback: Option<Value>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub txn_ref: String,
    pub amount: i64,
    pub client_ip: String,
}

/// Gateway-provided result applied to a `Pending` record when it settles.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// `Success` or `Failed`.
    pub status: PaymentRecordStatus,
    pub response_code: String,
    pub gateway_txn_no: Option<String>,
    pub bank_code: Option<String>,
    pub pay_date_utc: DateTime<Utc>,
    pub raw_callback: Value,
}
