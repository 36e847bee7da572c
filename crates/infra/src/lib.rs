//! `loja-infra` — persistence and application orchestration.
//!
//! The domain crates stay pure; this crate owns the stores (in-memory and
//! Postgres) and the [`OrderService`] pipeline that loads an order, runs a
//! command, persists the outcome atomically and dispatches notifications
//! after commit.

pub mod customers;
pub mod order_service;
pub mod order_store;

pub use customers::{CustomerDirectory, InMemoryCustomerDirectory, PgCustomerDirectory};
pub use order_service::{OrderService, ServiceError};
pub use order_store::{InMemoryOrderStore, OrderStore, OrderStoreError, PgOrderStore};
