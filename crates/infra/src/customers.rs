//! Customer lookup seam for notification payloads.
//!
//! The customer catalog proper (registration, auth, addresses) lives outside
//! this core; all the order pipeline needs is a display name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use loja_core::CustomerId;

/// Resolve the display name used in customer-facing messages.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// `None` when the customer is unknown; callers fall back to a neutral
    /// salutation.
    async fn display_name(&self, id: CustomerId) -> Option<String>;
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCustomerDirectory {
    names: RwLock<HashMap<CustomerId, String>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: CustomerId, name: impl Into<String>) {
        if let Ok(mut names) = self.names.write() {
            names.insert(id, name.into());
        }
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn display_name(&self, id: CustomerId) -> Option<String> {
        self.names.read().ok()?.get(&id).cloned()
    }
}

/// Postgres-backed directory reading the customers table maintained by the
/// registration service.
#[derive(Debug, Clone)]
pub struct PgCustomerDirectory {
    pool: Arc<PgPool>,
}

impl PgCustomerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl CustomerDirectory for PgCustomerDirectory {
    async fn display_name(&self, id: CustomerId) -> Option<String> {
        let row = sqlx::query("SELECT name FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .ok()??;
        row.try_get("name").ok()
    }
}
