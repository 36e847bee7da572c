use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use loja_core::{ExpectedVersion, OrderId};
use loja_orders::OrderSnapshot;

use super::{OrderStore, OrderStoreError};

/// In-memory order store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, OrderSnapshot>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load(&self, id: OrderId) -> Result<OrderSnapshot, OrderStoreError> {
        let orders = self
            .orders
            .read()
            .map_err(|_| OrderStoreError::Database("lock poisoned".to_string()))?;
        orders.get(&id).cloned().ok_or(OrderStoreError::NotFound)
    }

    async fn insert(&self, snapshot: &OrderSnapshot) -> Result<(), OrderStoreError> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| OrderStoreError::Database("lock poisoned".to_string()))?;
        if orders.contains_key(&snapshot.id) {
            return Err(OrderStoreError::Conflict(format!(
                "order {} already exists",
                snapshot.id
            )));
        }
        orders.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn update(
        &self,
        snapshot: &OrderSnapshot,
        expected: ExpectedVersion,
    ) -> Result<(), OrderStoreError> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| OrderStoreError::Database("lock poisoned".to_string()))?;
        let current = orders.get(&snapshot.id).ok_or(OrderStoreError::NotFound)?;

        if !expected.matches(current.version) {
            return Err(OrderStoreError::Conflict(format!(
                "expected {expected:?}, found {}",
                current.version
            )));
        }

        orders.insert(snapshot.id, snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loja_core::{CustomerId, Money};
    use loja_orders::OrderStatus;

    fn snapshot(version: u64) -> OrderSnapshot {
        OrderSnapshot {
            id: OrderId::new(),
            customer_id: Some(CustomerId::new()),
            description: String::new(),
            status: OrderStatus::Pending,
            items: Vec::new(),
            total_price: Money::from_cents(1000),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            paid_at: None,
            payment_ref: None,
            canceled_at: None,
            cancel_reason: None,
            refund_reason_code: None,
            refund_reason: None,
            refunded_at: None,
            refund_amount: Money::ZERO,
            refunds: Vec::new(),
            version,
        }
    }

    #[tokio::test]
    async fn insert_then_load_round_trips() {
        let store = InMemoryOrderStore::new();
        let snap = snapshot(1);
        store.insert(&snap).await.unwrap();
        let loaded = store.load(snap.id).await.unwrap();
        assert_eq!(loaded, snap);
    }

    #[tokio::test]
    async fn double_insert_conflicts() {
        let store = InMemoryOrderStore::new();
        let snap = snapshot(1);
        store.insert(&snap).await.unwrap();
        let err = store.insert(&snap).await.unwrap_err();
        assert!(matches!(err, OrderStoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_version_update_conflicts() {
        let store = InMemoryOrderStore::new();
        let snap = snapshot(1);
        store.insert(&snap).await.unwrap();

        let mut updated = snap.clone();
        updated.version = 2;
        store
            .update(&updated, ExpectedVersion::Exact(1))
            .await
            .unwrap();

        // A second writer still expecting version 1 must lose.
        let mut stale = snap.clone();
        stale.version = 2;
        let err = store
            .update(&stale, ExpectedVersion::Exact(1))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderStoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let store = InMemoryOrderStore::new();
        let err = store.load(OrderId::new()).await.unwrap_err();
        assert!(matches!(err, OrderStoreError::NotFound));
    }
}
