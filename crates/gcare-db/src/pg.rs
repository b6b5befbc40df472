//! sqlx implementation of the store traits.

use async_trait::async_trait;
use gcare_schemas::{
    NewOrder, NewPaymentRecord, Order, OrderStatus, PaymentRecord, PaymentRecordStatus,
    PaymentStatus, Settlement, StatusPair,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::is_unique_constraint_violation;
use crate::store::{OrderStore, PaymentStore, StoreError};

const ORDER_COLUMNS: &str = "order_id, customer_id, order_status, payment_status, total_amount, \
     created_at_utc, updated_at_utc";

const PAYMENT_COLUMNS: &str = "payment_id, order_id, txn_ref, amount, payment_status, \
     response_code, gateway_txn_no, bank_code, pay_date_utc, client_ip, raw_callback, \
     created_at_utc, updated_at_utc";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn backend(op: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| StoreError::Backend(format!("{op} failed: {e}"))
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        order_id: row.try_get("order_id")?,
        customer_id: row.try_get("customer_id")?,
        order_status: decode_enum(row, "order_status", OrderStatus::parse)?,
        payment_status: decode_enum(row, "payment_status", PaymentStatus::parse)?,
        total_amount: row.try_get("total_amount")?,
        created_at_utc: row.try_get("created_at_utc")?,
        updated_at_utc: row.try_get("updated_at_utc")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<PaymentRecord, sqlx::Error> {
    Ok(PaymentRecord {
        payment_id: row.try_get("payment_id")?,
        order_id: row.try_get("order_id")?,
        txn_ref: row.try_get("txn_ref")?,
        amount: row.try_get("amount")?,
        status: decode_enum(row, "payment_status", PaymentRecordStatus::parse)?,
        response_code: row.try_get("response_code")?,
        gateway_txn_no: row.try_get("gateway_txn_no")?,
        bank_code: row.try_get("bank_code")?,
        pay_date_utc: row.try_get("pay_date_utc")?,
        client_ip: row.try_get("client_ip")?,
        raw_callback: row.try_get("raw_callback")?,
        created_at_utc: row.try_get("created_at_utc")?,
        updated_at_utc: row.try_get("updated_at_utc")?,
    })
}

/// Status columns are text; an unknown value is a decode error, not a panic.
fn decode_enum<T, E>(row: &PgRow, column: &str, parse: fn(&str) -> Result<T, E>) -> Result<T, sqlx::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    parse(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, new: &NewOrder) -> Result<Order, StoreError> {
        let sql = format!(
            r#"
            insert into orders (order_id, customer_id, total_amount)
            values ($1, $2, $3)
            returning {ORDER_COLUMNS}
            "#
        );
        let res = sqlx::query(&sql)
            .bind(new.order_id)
            .bind(&new.customer_id)
            .bind(new.total_amount)
            .fetch_one(&self.pool)
            .await;

        match res {
            Ok(row) => order_from_row(&row).map_err(backend("insert_order decode")),
            Err(e) if is_unique_constraint_violation(&e, "orders_pkey") => {
                Err(StoreError::Duplicate(format!("order_id {}", new.order_id)))
            }
            Err(e) => Err(backend("insert_order")(e)),
        }
    }

    async fn fetch_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let sql = format!("select {ORDER_COLUMNS} from orders where order_id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend("fetch_order"))?;

        row.as_ref()
            .map(order_from_row)
            .transpose()
            .map_err(backend("fetch_order decode"))
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: StatusPair,
        next: StatusPair,
    ) -> Result<Option<Order>, StoreError> {
        let sql = format!(
            r#"
            update orders
            set order_status = $4,
                payment_status = $5,
                updated_at_utc = now()
            where order_id = $1
              and order_status = $2
              and payment_status = $3
            returning {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(order_id)
            .bind(expected.order_status.as_str())
            .bind(expected.payment_status.as_str())
            .bind(next.order_status.as_str())
            .bind(next.payment_status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend("update_order_status"))?;

        if row.is_none() {
            debug!(%order_id, %expected, %next, "order status CAS matched no row");
        }

        row.as_ref()
            .map(order_from_row)
            .transpose()
            .map_err(backend("update_order_status decode"))
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert_payment(&self, new: &NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let sql = format!(
            r#"
            insert into payments (payment_id, order_id, txn_ref, amount, client_ip)
            values ($1, $2, $3, $4, $5)
            returning {PAYMENT_COLUMNS}
            "#
        );
        let res = sqlx::query(&sql)
            .bind(new.payment_id)
            .bind(new.order_id)
            .bind(&new.txn_ref)
            .bind(new.amount)
            .bind(&new.client_ip)
            .fetch_one(&self.pool)
            .await;

        match res {
            Ok(row) => payment_from_row(&row).map_err(backend("insert_payment decode")),
            Err(e) if is_unique_constraint_violation(&e, "uq_payments_txn_ref") => {
                Err(StoreError::Duplicate(format!("txn_ref {}", new.txn_ref)))
            }
            Err(e) => Err(backend("insert_payment")(e)),
        }
    }

    async fn fetch_payment_by_txn_ref(
        &self,
        txn_ref: &str,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        let sql = format!("select {PAYMENT_COLUMNS} from payments where txn_ref = $1");
        let row = sqlx::query(&sql)
            .bind(txn_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend("fetch_payment_by_txn_ref"))?;

        row.as_ref()
            .map(payment_from_row)
            .transpose()
            .map_err(backend("fetch_payment_by_txn_ref decode"))
    }

    async fn list_payments_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentRecord>, StoreError> {
        let sql = format!(
            "select {PAYMENT_COLUMNS} from payments where order_id = $1 \
             order by created_at_utc desc, txn_ref desc"
        );
        let rows = sqlx::query(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend("list_payments_for_order"))?;

        rows.iter()
            .map(payment_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend("list_payments_for_order decode"))
    }

    async fn settle_payment(
        &self,
        txn_ref: &str,
        settlement: &Settlement,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        // Single statement: the `payment_status = 'Pending'` predicate is the
        // idempotence guard. Postgres row locking serialises concurrent callers
        // and the loser re-evaluates the predicate against the committed row.
        let sql = format!(
            r#"
            update payments
            set payment_status = $2,
                response_code = $3,
                gateway_txn_no = $4,
                bank_code = $5,
                pay_date_utc = $6,
                raw_callback = $7,
                updated_at_utc = now()
            where txn_ref = $1
              and payment_status = 'Pending'
            returning {PAYMENT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(txn_ref)
            .bind(settlement.status.as_str())
            .bind(&settlement.response_code)
            .bind(&settlement.gateway_txn_no)
            .bind(&settlement.bank_code)
            .bind(settlement.pay_date_utc)
            .bind(&settlement.raw_callback)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend("settle_payment"))?;

        row.as_ref()
            .map(payment_from_row)
            .transpose()
            .map_err(backend("settle_payment decode"))
    }
}
