//! Store traits.
//!
//! The reconciliation handler and the daemon talk to storage only through
//! these traits. `PgStore` is the production implementation; the testkit
//! provides an in-memory one with the same compare-and-swap semantics.
//!
//! Every mutating method is conditional: it names the state it expects to
//! replace and returns `Ok(None)` when that state no longer holds.

use async_trait::async_trait;
use gcare_schemas::{NewOrder, NewPaymentRecord, Order, PaymentRecord, Settlement, StatusPair};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique key (order id, txn_ref) already exists.
    Duplicate(String),
    /// Connection, query, constraint or decode failure.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Duplicate(what) => write!(f, "duplicate key: {what}"),
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order in `Booked`/`Pending`.
    async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Move the order from `expected` to `next`.
    ///
    /// `Ok(None)` when the order is missing or no longer holds `expected`.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: StatusPair,
        next: StatusPair,
    ) -> Result<Option<Order>, StoreError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment(&self, new: &NewPaymentRecord) -> Result<PaymentRecord, StoreError>;

    async fn fetch_payment_by_txn_ref(
        &self,
        txn_ref: &str,
    ) -> Result<Option<PaymentRecord>, StoreError>;

    /// Newest first.
    async fn list_payments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentRecord>, StoreError>;

    /// Apply a gateway result to a `Pending` record.
    ///
    /// `Ok(None)` when the record is missing or has already left `Pending`;
    /// exactly one of any number of concurrent callers gets `Some`.
    async fn settle_payment(
        &self,
        txn_ref: &str,
        settlement: &Settlement,
    ) -> Result<Option<PaymentRecord>, StoreError>;
}

/// Everything the service needs from storage.
pub trait Store: OrderStore + PaymentStore {}

impl<T: OrderStore + PaymentStore> Store for T {}
