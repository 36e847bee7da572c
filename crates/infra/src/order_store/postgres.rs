//! Postgres-backed order store.
//!
//! Orders, line items and refund records live in separate tables; `update`
//! writes the order row and any newly appended refund records in a single
//! transaction, guarded by `WHERE id = $1 AND version = $2`. Two requests
//! racing to transition the same order are serialized by that guard: the
//! loser's update matches zero rows and surfaces as a conflict.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use async_trait::async_trait;

use loja_core::{ExpectedVersion, Money, OrderId};
use loja_orders::{LineItem, OrderSnapshot, RefundRecord, RefundedItem};

use super::{OrderStore, OrderStoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id                  UUID PRIMARY KEY,
    customer_id         UUID NOT NULL,
    description         TEXT NOT NULL DEFAULT '',
    status              TEXT NOT NULL,
    total_price_cents   BIGINT NOT NULL CHECK (total_price_cents >= 0),
    created_at          TIMESTAMPTZ NOT NULL,
    updated_at          TIMESTAMPTZ NOT NULL,
    paid_at             TIMESTAMPTZ,
    payment_ref         TEXT,
    canceled_at         TIMESTAMPTZ,
    cancel_reason       TEXT,
    refund_reason_code  TEXT,
    refund_reason       TEXT,
    refunded_at         TIMESTAMPTZ,
    refund_amount_cents BIGINT NOT NULL DEFAULT 0,
    version             BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_items (
    id               UUID PRIMARY KEY,
    order_id         UUID NOT NULL REFERENCES orders(id),
    product_id       UUID NOT NULL,
    product_name     TEXT NOT NULL,
    quantity         INTEGER NOT NULL CHECK (quantity >= 1),
    unit_price_cents BIGINT NOT NULL CHECK (unit_price_cents >= 0),
    position         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS refund_records (
    id           UUID PRIMARY KEY,
    order_id     UUID NOT NULL REFERENCES orders(id),
    reason_code  TEXT NOT NULL,
    reason       TEXT,
    amount_cents BIGINT NOT NULL CHECK (amount_cents >= 0),
    refunded_at  TIMESTAMPTZ NOT NULL,
    position     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS refund_record_items (
    refund_id     UUID NOT NULL REFERENCES refund_records(id),
    order_item_id UUID NOT NULL,
    product_id    UUID NOT NULL,
    product_name  TEXT NOT NULL,
    quantity      INTEGER NOT NULL CHECK (quantity >= 1),
    amount_cents  BIGINT NOT NULL CHECK (amount_cents >= 0),
    position      INTEGER NOT NULL,
    PRIMARY KEY (refund_id, position)
);
"#;

/// Postgres-backed order store.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: Arc<PgPool>,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), OrderStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn cents(value: i64, column: &str) -> Result<Money, OrderStoreError> {
        u64::try_from(value)
            .map(Money::from_cents)
            .map_err(|_| OrderStoreError::Corrupt(format!("negative amount in {column}")))
    }

    fn quantity(value: i32, column: &str) -> Result<u32, OrderStoreError> {
        u32::try_from(value)
            .map_err(|_| OrderStoreError::Corrupt(format!("negative quantity in {column}")))
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn load(&self, id: OrderId) -> Result<OrderSnapshot, OrderStoreError> {
        let order_row = sqlx::query(
            r#"
            SELECT customer_id, description, status, total_price_cents,
                   created_at, updated_at, paid_at, payment_ref,
                   canceled_at, cancel_reason, refund_reason_code,
                   refund_reason, refunded_at, refund_amount_cents, version
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(OrderStoreError::NotFound)?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, product_id, product_name, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut items = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            items.push(LineItem {
                id: row.try_get::<Uuid, _>("id").map_err(corrupt)?.into(),
                product_id: row.try_get::<Uuid, _>("product_id").map_err(corrupt)?.into(),
                product_name: row.try_get("product_name").map_err(corrupt)?,
                quantity: Self::quantity(row.try_get("quantity").map_err(corrupt)?, "order_items")?,
                unit_price: Self::cents(
                    row.try_get("unit_price_cents").map_err(corrupt)?,
                    "order_items",
                )?,
            });
        }

        let refunded_item_rows = sqlx::query(
            r#"
            SELECT ri.refund_id, ri.order_item_id, ri.product_id,
                   ri.product_name, ri.quantity, ri.amount_cents
            FROM refund_record_items ri
            JOIN refund_records r ON r.id = ri.refund_id
            WHERE r.order_id = $1
            ORDER BY r.position ASC, ri.position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut items_by_refund: HashMap<Uuid, Vec<RefundedItem>> = HashMap::new();
        for row in refunded_item_rows {
            let refund_id: Uuid = row.try_get("refund_id").map_err(corrupt)?;
            items_by_refund.entry(refund_id).or_default().push(RefundedItem {
                order_item_id: row
                    .try_get::<Uuid, _>("order_item_id")
                    .map_err(corrupt)?
                    .into(),
                product_id: row.try_get::<Uuid, _>("product_id").map_err(corrupt)?.into(),
                product_name: row.try_get("product_name").map_err(corrupt)?,
                quantity: Self::quantity(
                    row.try_get("quantity").map_err(corrupt)?,
                    "refund_record_items",
                )?,
                amount: Self::cents(
                    row.try_get("amount_cents").map_err(corrupt)?,
                    "refund_record_items",
                )?,
            });
        }

        let refund_rows = sqlx::query(
            r#"
            SELECT id, reason_code, reason, amount_cents, refunded_at
            FROM refund_records
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut refunds = Vec::with_capacity(refund_rows.len());
        for row in refund_rows {
            let refund_id: Uuid = row.try_get("id").map_err(corrupt)?;
            refunds.push(RefundRecord {
                id: refund_id.into(),
                reason_code: row
                    .try_get::<String, _>("reason_code")
                    .map_err(corrupt)?
                    .parse()
                    .map_err(|e| OrderStoreError::Corrupt(format!("{e}")))?,
                reason: row.try_get("reason").map_err(corrupt)?,
                amount: Self::cents(
                    row.try_get("amount_cents").map_err(corrupt)?,
                    "refund_records",
                )?,
                items: items_by_refund.remove(&refund_id).unwrap_or_default(),
                refunded_at: row.try_get("refunded_at").map_err(corrupt)?,
            });
        }

        let version: i64 = order_row.try_get("version").map_err(corrupt)?;
        Ok(OrderSnapshot {
            id,
            customer_id: Some(
                order_row
                    .try_get::<Uuid, _>("customer_id")
                    .map_err(corrupt)?
                    .into(),
            ),
            description: order_row.try_get("description").map_err(corrupt)?,
            status: order_row
                .try_get::<String, _>("status")
                .map_err(corrupt)?
                .parse()
                .map_err(|e| OrderStoreError::Corrupt(format!("{e}")))?,
            items,
            total_price: Self::cents(
                order_row.try_get("total_price_cents").map_err(corrupt)?,
                "orders",
            )?,
            created_at: order_row.try_get("created_at").map_err(corrupt)?,
            updated_at: order_row.try_get("updated_at").map_err(corrupt)?,
            paid_at: order_row.try_get("paid_at").map_err(corrupt)?,
            payment_ref: order_row.try_get("payment_ref").map_err(corrupt)?,
            canceled_at: order_row.try_get("canceled_at").map_err(corrupt)?,
            cancel_reason: order_row.try_get("cancel_reason").map_err(corrupt)?,
            refund_reason_code: order_row
                .try_get::<Option<String>, _>("refund_reason_code")
                .map_err(corrupt)?
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| OrderStoreError::Corrupt(format!("{e}")))?,
            refund_reason: order_row.try_get("refund_reason").map_err(corrupt)?,
            refunded_at: order_row.try_get("refunded_at").map_err(corrupt)?,
            refund_amount: Self::cents(
                order_row.try_get("refund_amount_cents").map_err(corrupt)?,
                "orders",
            )?,
            refunds,
            version: u64::try_from(version)
                .map_err(|_| OrderStoreError::Corrupt("negative version".to_string()))?,
        })
    }

    #[instrument(skip(self, snapshot), fields(order_id = %snapshot.id), err)]
    async fn insert(&self, snapshot: &OrderSnapshot) -> Result<(), OrderStoreError> {
        let customer_id = snapshot
            .customer_id
            .ok_or_else(|| OrderStoreError::Corrupt("order snapshot missing customer".to_string()))?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, customer_id, description, status, total_price_cents,
                created_at, updated_at, paid_at, payment_ref,
                canceled_at, cancel_reason, refund_reason_code,
                refund_reason, refunded_at, refund_amount_cents, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(snapshot.id.as_uuid())
        .bind(customer_id.as_uuid())
        .bind(&snapshot.description)
        .bind(snapshot.status.as_str())
        .bind(snapshot.total_price.cents() as i64)
        .bind(snapshot.created_at)
        .bind(snapshot.updated_at)
        .bind(snapshot.paid_at)
        .bind(&snapshot.payment_ref)
        .bind(snapshot.canceled_at)
        .bind(&snapshot.cancel_reason)
        .bind(snapshot.refund_reason_code.map(|c| c.as_str()))
        .bind(&snapshot.refund_reason)
        .bind(snapshot.refunded_at)
        .bind(snapshot.refund_amount.cents() as i64)
        .bind(snapshot.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        for (position, item) in snapshot.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name,
                    quantity, unit_price_cents, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(snapshot.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents() as i64)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, snapshot), fields(order_id = %snapshot.id), err)]
    async fn update(
        &self,
        snapshot: &OrderSnapshot,
        expected: ExpectedVersion,
    ) -> Result<(), OrderStoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let update = r#"
            UPDATE orders SET
                status = $2, updated_at = $3, paid_at = $4, payment_ref = $5,
                canceled_at = $6, cancel_reason = $7, refund_reason_code = $8,
                refund_reason = $9, refunded_at = $10, refund_amount_cents = $11,
                version = $12
            WHERE id = $1
        "#;

        let result = match expected {
            ExpectedVersion::Exact(v) => {
                sqlx::query(&format!("{update} AND version = $13"))
                    .bind(snapshot.id.as_uuid())
                    .bind(snapshot.status.as_str())
                    .bind(snapshot.updated_at)
                    .bind(snapshot.paid_at)
                    .bind(&snapshot.payment_ref)
                    .bind(snapshot.canceled_at)
                    .bind(&snapshot.cancel_reason)
                    .bind(snapshot.refund_reason_code.map(|c| c.as_str()))
                    .bind(&snapshot.refund_reason)
                    .bind(snapshot.refunded_at)
                    .bind(snapshot.refund_amount.cents() as i64)
                    .bind(snapshot.version as i64)
                    .bind(v as i64)
                    .execute(&mut *tx)
                    .await
            }
            ExpectedVersion::Any => {
                sqlx::query(update)
                    .bind(snapshot.id.as_uuid())
                    .bind(snapshot.status.as_str())
                    .bind(snapshot.updated_at)
                    .bind(snapshot.paid_at)
                    .bind(&snapshot.payment_ref)
                    .bind(snapshot.canceled_at)
                    .bind(&snapshot.cancel_reason)
                    .bind(snapshot.refund_reason_code.map(|c| c.as_str()))
                    .bind(&snapshot.refund_reason)
                    .bind(snapshot.refunded_at)
                    .bind(snapshot.refund_amount.cents() as i64)
                    .bind(snapshot.version as i64)
                    .execute(&mut *tx)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            // Distinguish a missing order from a lost race.
            let exists = sqlx::query("SELECT 1 FROM orders WHERE id = $1")
                .bind(snapshot.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .is_some();
            return Err(if exists {
                OrderStoreError::Conflict(format!(
                    "expected {expected:?} for order {}",
                    snapshot.id
                ))
            } else {
                OrderStoreError::NotFound
            });
        }

        // Refund records are append-only; re-inserting already stored records
        // is a no-op.
        for (position, record) in snapshot.refunds.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO refund_records (
                    id, order_id, reason_code, reason,
                    amount_cents, refunded_at, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(snapshot.id.as_uuid())
            .bind(record.reason_code.as_str())
            .bind(&record.reason)
            .bind(record.amount.cents() as i64)
            .bind(record.refunded_at)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            for (item_position, item) in record.items.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO refund_record_items (
                        refund_id, order_item_id, product_id,
                        product_name, quantity, amount_cents, position
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (refund_id, position) DO NOTHING
                    "#,
                )
                .bind(record.id.as_uuid())
                .bind(item.order_item_id.as_uuid())
                .bind(item.product_id.as_uuid())
                .bind(&item.product_name)
                .bind(item.quantity as i32)
                .bind(item.amount.cents() as i64)
                .bind(item_position as i32)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn corrupt(e: sqlx::Error) -> OrderStoreError {
    OrderStoreError::Corrupt(e.to_string())
}

fn map_sqlx_error(e: sqlx::Error) -> OrderStoreError {
    if let Some(db) = e.as_database_error() {
        // 23505: unique violation (duplicate insert / lost race).
        if db.code().as_deref() == Some("23505") {
            return OrderStoreError::Conflict(db.message().to_string());
        }
    }
    OrderStoreError::Database(e.to_string())
}
