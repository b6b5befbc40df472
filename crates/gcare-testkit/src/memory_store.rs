//! In-memory store with the same conditional-write semantics as `PgStore`.
//!
//! One mutex guards both tables, so every trait call is atomic, which is what
//! the single-statement SQL gives the Postgres implementation. Counters and
//! fault switches let scenarios assert "exactly once" and exercise the error
//! paths without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use gcare_db::{OrderStore, PaymentStore, StoreError};
use gcare_schemas::{
    NewOrder, NewPaymentRecord, Order, OrderStatus, PaymentRecord, PaymentRecordStatus,
    PaymentStatus, Settlement, StatusPair,
};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    /// Keyed by txn_ref.
    payments: HashMap<String, PaymentRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,

    settles_applied: AtomicUsize,
    order_updates_applied: AtomicUsize,

    fail_reads: AtomicBool,
    fail_settle: AtomicBool,
    fail_order_updates: AtomicBool,
    /// Number of upcoming order CAS calls that report a concurrent change.
    order_conflicts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- seeding -------------------------------------------------------------

    /// Insert an order in any status pair, bypassing the `Booked` default.
    pub fn seed_order(
        &self,
        customer_id: &str,
        order_status: OrderStatus,
        payment_status: PaymentStatus,
        total_amount: i64,
    ) -> Order {
        let now = Utc::now();
        let order = Order {
            order_id: Uuid::new_v4(),
            customer_id: customer_id.to_string(),
            order_status,
            payment_status,
            total_amount,
            created_at_utc: now,
            updated_at_utc: now,
        };
        self.tables().orders.insert(order.order_id, order.clone());
        order
    }

    /// Insert a `Pending` payment record for `order` at the order total.
    pub fn seed_pending_payment(&self, order: &Order, txn_ref: &str) -> PaymentRecord {
        let record = new_payment_record(&NewPaymentRecord {
            payment_id: Uuid::new_v4(),
            order_id: order.order_id,
            txn_ref: txn_ref.to_string(),
            amount: order.total_amount,
            client_ip: "127.0.0.1".to_string(),
        });
        self.tables()
            .payments
            .insert(record.txn_ref.clone(), record.clone());
        record
    }

    // -- inspection ----------------------------------------------------------

    pub fn order(&self, order_id: Uuid) -> Option<Order> {
        self.tables().orders.get(&order_id).cloned()
    }

    pub fn payment(&self, txn_ref: &str) -> Option<PaymentRecord> {
        self.tables().payments.get(txn_ref).cloned()
    }

    /// Successful `settle_payment` calls so far.
    pub fn settles_applied(&self) -> usize {
        self.settles_applied.load(Ordering::SeqCst)
    }

    /// Successful `update_order_status` calls so far.
    pub fn order_updates_applied(&self) -> usize {
        self.order_updates_applied.load(Ordering::SeqCst)
    }

    // -- fault injection -----------------------------------------------------

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_settle(&self, on: bool) {
        self.fail_settle.store(on, Ordering::SeqCst);
    }

    pub fn fail_order_updates(&self, on: bool) {
        self.fail_order_updates.store(on, Ordering::SeqCst);
    }

    /// Make the next `n` order CAS calls miss as if another writer got there
    /// first.
    pub fn inject_order_conflicts(&self, n: usize) {
        self.order_conflicts.store(n, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".to_string()));
        }
        Ok(())
    }

    fn take_conflict(&self) -> bool {
        self.order_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn new_payment_record(new: &NewPaymentRecord) -> PaymentRecord {
    let now = Utc::now();
    PaymentRecord {
        payment_id: new.payment_id,
        order_id: new.order_id,
        txn_ref: new.txn_ref.clone(),
        amount: new.amount,
        status: PaymentRecordStatus::Pending,
        response_code: None,
        gateway_txn_no: None,
        bank_code: None,
        pay_date_utc: None,
        client_ip: new.client_ip.clone(),
        raw_callback: None,
        created_at_utc: now,
        updated_at_utc: now,
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError> {
        let mut t = self.tables();
        if t.orders.contains_key(&new.order_id) {
            return Err(StoreError::Duplicate(format!("order_id {}", new.order_id)));
        }
        let now = Utc::now();
        let order = Order {
            order_id: new.order_id,
            customer_id: new.customer_id.clone(),
            order_status: OrderStatus::Booked,
            payment_status: PaymentStatus::Pending,
            total_amount: new.total_amount,
            created_at_utc: now,
            updated_at_utc: now,
        };
        t.orders.insert(order.order_id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        self.check_reads()?;
        Ok(self.tables().orders.get(&order_id).cloned())
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: StatusPair,
        next: StatusPair,
    ) -> Result<Option<Order>, StoreError> {
        if self.fail_order_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected order update failure".to_string()));
        }
        if self.take_conflict() {
            return Ok(None);
        }

        let mut t = self.tables();
        let Some(order) = t.orders.get_mut(&order_id) else {
            return Ok(None);
        };
        if order.status_pair() != expected {
            return Ok(None);
        }
        order.order_status = next.order_status;
        order.payment_status = next.payment_status;
        order.updated_at_utc = Utc::now();
        self.order_updates_applied.fetch_add(1, Ordering::SeqCst);
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, new: &NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let mut t = self.tables();
        if t.payments.contains_key(&new.txn_ref) {
            return Err(StoreError::Duplicate(format!("txn_ref {}", new.txn_ref)));
        }
        if !t.orders.contains_key(&new.order_id) {
            return Err(StoreError::Backend(format!(
                "payments.order_id references missing order {}",
                new.order_id
            )));
        }
        let record = new_payment_record(new);
        t.payments.insert(record.txn_ref.clone(), record.clone());
        Ok(record)
    }

    async fn fetch_payment_by_txn_ref(
        &self,
        txn_ref: &str,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        self.check_reads()?;
        Ok(self.tables().payments.get(txn_ref).cloned())
    }

    async fn list_payments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        self.check_reads()?;
        let mut out: Vec<PaymentRecord> = self
            .tables()
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.created_at_utc
                .cmp(&a.created_at_utc)
                .then_with(|| b.txn_ref.cmp(&a.txn_ref))
        });
        Ok(out)
    }

    async fn settle_payment(
        &self,
        txn_ref: &str,
        settlement: &Settlement,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        if self.fail_settle.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected settle failure".to_string()));
        }

        let mut t = self.tables();
        let Some(record) = t.payments.get_mut(txn_ref) else {
            return Ok(None);
        };
        if !record.status.is_pending() {
            return Ok(None);
        }
        record.status = settlement.status;
        record.response_code = Some(settlement.response_code.clone());
        record.gateway_txn_no = settlement.gateway_txn_no.clone();
        record.bank_code = settlement.bank_code.clone();
        record.pay_date_utc = Some(settlement.pay_date_utc);
        record.raw_callback = Some(settlement.raw_callback.clone());
        record.updated_at_utc = Utc::now();
        self.settles_applied.fetch_add(1, Ordering::SeqCst);
        Ok(Some(record.clone()))
    }
}
