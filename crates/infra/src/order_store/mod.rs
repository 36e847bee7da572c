//! Order persistence seam.
//!
//! A store holds order snapshots (order row + line items + refund records).
//! Updates are compare-and-swap on the aggregate version: concurrent
//! transitions racing on the same order are serialized here, and the losing
//! writer gets [`OrderStoreError::Conflict`] instead of silently overwriting.

use async_trait::async_trait;
use thiserror::Error;

use loja_core::{ExpectedVersion, OrderId};
use loja_orders::OrderSnapshot;

mod in_memory;
mod postgres;

pub use in_memory::InMemoryOrderStore;
pub use postgres::PgOrderStore;

#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The order does not exist.
    #[error("order not found")]
    NotFound,

    /// Optimistic concurrency failure (stale version) or duplicate insert.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded into domain types.
    #[error("corrupt stored order: {0}")]
    Corrupt(String),

    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(String),
}

/// Persistence contract for orders.
///
/// Orders are never deleted; terminal statuses keep the row as an audit
/// record.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load an order with its line items and refund records.
    async fn load(&self, id: OrderId) -> Result<OrderSnapshot, OrderStoreError>;

    /// Persist a freshly created order. Fails with `Conflict` if the id
    /// already exists.
    async fn insert(&self, snapshot: &OrderSnapshot) -> Result<(), OrderStoreError>;

    /// Persist an updated order atomically (order row + any newly appended
    /// refund records in one transaction), guarded by `expected`.
    async fn update(
        &self,
        snapshot: &OrderSnapshot,
        expected: ExpectedVersion,
    ) -> Result<(), OrderStoreError>;
}
