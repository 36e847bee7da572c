use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use loja_infra::{
    CustomerDirectory, InMemoryCustomerDirectory, InMemoryOrderStore, OrderService,
    PgCustomerDirectory, PgOrderStore,
};
use loja_notifications::TracingNotificationSender;
use loja_payments::PaymentStatusMap;

use crate::app::AppConfig;

pub struct AppServices {
    pub orders: OrderService,
}

/// Wire the order pipeline against Postgres when `DATABASE_URL` is set,
/// otherwise against the in-memory store (dev/tests).
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let sender = Arc::new(TracingNotificationSender::default());

    let orders = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url)
                .await
                .context("failed to connect to postgres")?;
            let store = PgOrderStore::new(pool.clone());
            store
                .ensure_schema()
                .await
                .context("failed to ensure the order schema")?;
            OrderService::new(
                Arc::new(store),
                Arc::new(PgCustomerDirectory::new(pool)),
                sender,
                PaymentStatusMap::default(),
                config.base_url.clone(),
            )
        }
        None => in_memory_order_service(
            Arc::new(InMemoryCustomerDirectory::new()),
            &config.base_url,
        ),
    };

    Ok(AppServices { orders })
}

/// In-memory wiring shared by dev mode and the black-box tests.
pub fn in_memory_order_service(
    customers: Arc<dyn CustomerDirectory>,
    base_url: &str,
) -> OrderService {
    OrderService::new(
        Arc::new(InMemoryOrderStore::new()),
        customers,
        Arc::new(TracingNotificationSender::default()),
        PaymentStatusMap::default(),
        base_url,
    )
}
