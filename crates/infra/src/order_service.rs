//! Order command execution pipeline (application-level orchestration).
//!
//! Every administrative action and webhook callback runs the same pipeline:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the order snapshot from the store
//!   ↓
//! 2. Rehydrate the aggregate and handle the command (pure decision logic)
//!   ↓
//! 3. Apply the resulting events in memory
//!   ↓
//! 4. Persist atomically, guarded by the pre-command version
//!   ↓
//! 5. Dispatch the notification (post-commit, best-effort)
//! ```
//!
//! Steps 1–4 are all-or-nothing; a concurrent transition that wins the race
//! makes step 4 fail with a conflict and nothing is published. Step 5 never
//! rolls anything back: a failed dispatch is logged and the transition
//! stands. A command that yields no events (idempotent webhook re-delivery)
//! skips steps 4 and 5 entirely.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use loja_core::{Aggregate, DomainError, DomainEvent, ExpectedVersion, Money, OrderId};
use loja_notifications::{NotificationPayload, NotificationSender};
use loja_orders::{
    ApplyPaymentStatus, CancelOrder, ChangeStatus, CreateOrder, FullRefund, NewLineItem, Order,
    OrderCommand, OrderSnapshot, OrderStatus, PartialRefund, RefundItemRequest, RefundReasonCode,
};
use loja_payments::{PaymentStatusMap, PaymentWebhookEvent};

use crate::customers::CustomerDirectory;
use crate::order_store::{OrderStore, OrderStoreError};

/// Fallback salutation when the customer directory has no entry.
const UNKNOWN_CUSTOMER: &str = "Cliente";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] OrderStoreError),
}

/// Application service driving the order lifecycle.
///
/// Collaborators are injected (store, customer directory, notification
/// sender) so the pipeline is testable with in-memory fakes.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    customers: Arc<dyn CustomerDirectory>,
    sender: Arc<dyn NotificationSender>,
    status_map: PaymentStatusMap,
    base_url: String,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        customers: Arc<dyn CustomerDirectory>,
        sender: Arc<dyn NotificationSender>,
        status_map: PaymentStatusMap,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            customers,
            sender,
            status_map,
            base_url: base_url.into(),
        }
    }

    pub async fn get_order(&self, id: OrderId) -> Result<OrderSnapshot, ServiceError> {
        Ok(self.store.load(id).await?)
    }

    /// Create an order at checkout and dispatch the "order received"
    /// notification.
    pub async fn create_order(
        &self,
        customer_id: loja_core::CustomerId,
        description: String,
        items: Vec<NewLineItem>,
        initial_status: OrderStatus,
    ) -> Result<OrderSnapshot, ServiceError> {
        let order_id = OrderId::new();
        let mut order = Order::empty(order_id);
        let events = order.handle(&OrderCommand::CreateOrder(CreateOrder {
            order_id,
            customer_id,
            description,
            items,
            initial_status,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            order.apply(event);
        }

        let snapshot = order.snapshot();
        self.store.insert(&snapshot).await?;
        self.notify(&snapshot).await;
        Ok(snapshot)
    }

    /// Administrative fulfillment step (`Separado`, `Embalado`, ...).
    pub async fn change_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
    ) -> Result<OrderSnapshot, ServiceError> {
        self.execute(
            order_id,
            OrderCommand::ChangeStatus(ChangeStatus {
                order_id,
                to,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn cancel(
        &self,
        order_id: OrderId,
        reason: String,
    ) -> Result<OrderSnapshot, ServiceError> {
        self.execute(
            order_id,
            OrderCommand::CancelOrder(CancelOrder {
                order_id,
                reason,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn full_refund(
        &self,
        order_id: OrderId,
        reason_code: RefundReasonCode,
        reason: Option<String>,
        amount: Option<Money>,
    ) -> Result<OrderSnapshot, ServiceError> {
        self.execute(
            order_id,
            OrderCommand::FullRefund(FullRefund {
                order_id,
                reason_code,
                reason,
                amount,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn partial_refund(
        &self,
        order_id: OrderId,
        items: Vec<RefundItemRequest>,
        reason_code: Option<RefundReasonCode>,
        notes: Option<String>,
    ) -> Result<OrderSnapshot, ServiceError> {
        self.execute(
            order_id,
            OrderCommand::PartialRefund(PartialRefund {
                order_id,
                items,
                reason_code,
                notes,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    /// Apply a verified payment-webhook event.
    ///
    /// The provider status is translated through the configured mapping
    /// table before it touches the aggregate; an unmapped status fails
    /// without any mutation.
    pub async fn handle_webhook(
        &self,
        event: PaymentWebhookEvent,
    ) -> Result<OrderSnapshot, ServiceError> {
        let to = self.status_map.resolve(&event.payment_status)?;
        self.execute(
            event.order_id,
            OrderCommand::ApplyPaymentStatus(ApplyPaymentStatus {
                order_id: event.order_id,
                to,
                payment_ref: event.payment_ref,
                occurred_at: event.occurred_at,
            }),
        )
        .await
    }

    async fn execute(
        &self,
        order_id: OrderId,
        command: OrderCommand,
    ) -> Result<OrderSnapshot, ServiceError> {
        let stored = self.store.load(order_id).await?;
        let expected = ExpectedVersion::Exact(stored.version);
        let mut order = Order::from_snapshot(stored);

        let events = order.handle(&command)?;
        if events.is_empty() {
            // Accepted no-op (e.g. webhook re-delivery): nothing to persist,
            // nothing to dispatch.
            return Ok(order.snapshot());
        }
        for event in &events {
            order.apply(event);
        }

        let snapshot = order.snapshot();
        self.store.update(&snapshot, expected).await?;
        for event in &events {
            tracing::debug!(order_id = %order_id, event = event.event_type(), "event applied");
        }
        self.notify(&snapshot).await;
        Ok(snapshot)
    }

    async fn notify(&self, snapshot: &OrderSnapshot) {
        let customer_name = match snapshot.customer_id {
            Some(id) => self
                .customers
                .display_name(id)
                .await
                .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string()),
            None => UNKNOWN_CUSTOMER.to_string(),
        };

        let payload = NotificationPayload::build(snapshot, &customer_name, &self.base_url);
        if let Err(e) = self.sender.send(&payload).await {
            tracing::warn!(
                order_id = %snapshot.id,
                status = %snapshot.status,
                error = %e,
                "notification dispatch failed; transition stands"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use loja_core::{CustomerId, ProductId};

    use crate::customers::InMemoryCustomerDirectory;
    use crate::order_store::InMemoryOrderStore;

    #[derive(Debug, Default)]
    struct RecordingSender {
        sent: Mutex<Vec<NotificationPayload>>,
    }

    impl RecordingSender {
        fn sent(&self) -> Vec<NotificationPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, payload: &NotificationPayload) -> Result<(), DomainError> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct FailingSender;

    #[async_trait]
    impl NotificationSender for FailingSender {
        async fn send(&self, _payload: &NotificationPayload) -> Result<(), DomainError> {
            Err(DomainError::external("smtp connection refused"))
        }
    }

    fn service_with(sender: Arc<dyn NotificationSender>) -> (OrderService, Arc<InMemoryOrderStore>) {
        let store = Arc::new(InMemoryOrderStore::new());
        let customers = Arc::new(InMemoryCustomerDirectory::new());
        let service = OrderService::new(
            store.clone(),
            customers,
            sender,
            PaymentStatusMap::default(),
            "https://loja.example.com",
        );
        (service, store)
    }

    fn items() -> Vec<NewLineItem> {
        vec![NewLineItem {
            product_id: ProductId::new(),
            product_name: "Caneca".to_string(),
            quantity: 2,
            unit_price: Money::from_cents(2000),
        }]
    }

    fn webhook(order_id: OrderId, status: &str) -> PaymentWebhookEvent {
        PaymentWebhookEvent {
            event_id: "evt-1".to_string(),
            order_id,
            payment_ref: Some("mp-123".to_string()),
            payment_status: status.to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn webhook_approval_transitions_and_notifies() {
        let sender = Arc::new(RecordingSender::default());
        let (service, _) = service_with(sender.clone());

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::Pending)
            .await
            .unwrap();

        let updated = service.handle_webhook(webhook(created.id, "approved")).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Approved);
        assert!(updated.paid_at.is_some());

        let sent = sender.sent();
        // One for creation, one for approval.
        assert_eq!(sent.len(), 2);
        assert!(sent[1].subject.contains(&created.id.to_string()));
        assert_eq!(sent[1].status, OrderStatus::Approved);
    }

    #[tokio::test]
    async fn webhook_redelivery_is_a_no_op_without_duplicate_notification() {
        let sender = Arc::new(RecordingSender::default());
        let (service, store) = service_with(sender.clone());

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::Pending)
            .await
            .unwrap();

        service.handle_webhook(webhook(created.id, "approved")).await.unwrap();
        let version = store.load(created.id).await.unwrap().version;

        service.handle_webhook(webhook(created.id, "approved")).await.unwrap();

        assert_eq!(store.load(created.id).await.unwrap().version, version);
        assert_eq!(sender.sent().len(), 2);
    }

    #[tokio::test]
    async fn notification_failure_does_not_roll_back_the_transition() {
        let (service, store) = service_with(Arc::new(FailingSender));

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::Pending)
            .await
            .unwrap();
        service.handle_webhook(webhook(created.id, "approved")).await.unwrap();

        let stored = store.load(created.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Approved);
    }

    #[tokio::test]
    async fn unmapped_provider_status_fails_without_mutation() {
        let sender = Arc::new(RecordingSender::default());
        let (service, store) = service_with(sender.clone());

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::Pending)
            .await
            .unwrap();

        let err = service
            .handle_webhook(webhook(created.id, "teleported"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert_eq!(store.load(created.id).await.unwrap().status, OrderStatus::Pending);
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn cancel_records_reason_and_notifies() {
        let sender = Arc::new(RecordingSender::default());
        let (service, _) = service_with(sender.clone());

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::AwaitingPayment)
            .await
            .unwrap();

        let canceled = service
            .cancel(created.id, "cliente desistiu".to_string())
            .await
            .unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(canceled.cancel_reason.as_deref(), Some("cliente desistiu"));
        assert!(canceled.canceled_at.is_some());

        let sent = sender.sent();
        assert_eq!(sent.last().unwrap().status, OrderStatus::Canceled);
    }

    #[tokio::test]
    async fn provider_cancellation_webhook_carries_a_reason() {
        let sender = Arc::new(RecordingSender::default());
        let (service, store) = service_with(sender.clone());

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::Pending)
            .await
            .unwrap();

        let canceled = service
            .handle_webhook(webhook(created.id, "cancelled"))
            .await
            .unwrap();
        assert_eq!(canceled.status, OrderStatus::Canceled);
        assert_eq!(
            canceled.cancel_reason.as_deref(),
            Some("canceled by payment provider")
        );
        assert!(canceled.canceled_at.is_some());

        let stored = store.load(created.id).await.unwrap();
        assert_eq!(stored.cancel_reason, canceled.cancel_reason);
    }

    #[tokio::test]
    async fn full_refund_through_the_pipeline() {
        let sender = Arc::new(RecordingSender::default());
        let (service, store) = service_with(sender.clone());

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::Pending)
            .await
            .unwrap();
        service.handle_webhook(webhook(created.id, "approved")).await.unwrap();

        let refunded = service
            .full_refund(created.id, RefundReasonCode::CustomerRequest, None, None)
            .await
            .unwrap();
        assert_eq!(refunded.status, OrderStatus::Refunded);
        assert_eq!(refunded.refund_amount, Money::from_cents(4000));

        let stored = store.load(created.id).await.unwrap();
        assert_eq!(stored.refunds.len(), 1);
    }

    #[tokio::test]
    async fn partial_refund_payload_carries_refunded_items() {
        let sender = Arc::new(RecordingSender::default());
        let (service, _) = service_with(sender.clone());

        let created = service
            .create_order(CustomerId::new(), String::new(), items(), OrderStatus::Pending)
            .await
            .unwrap();
        service.handle_webhook(webhook(created.id, "approved")).await.unwrap();

        let line = &created.items[0];
        service
            .partial_refund(
                created.id,
                vec![RefundItemRequest {
                    order_item_id: line.id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    quantity: 1,
                }],
                Some(RefundReasonCode::ProductDefect),
                None,
            )
            .await
            .unwrap();

        let sent = sender.sent();
        let payload = sent.last().unwrap();
        assert_eq!(payload.status, OrderStatus::PartiallyRefunded);
        assert_eq!(payload.refunded_amount.as_deref(), Some("R$ 20,00"));
        assert_eq!(payload.refunded_items.len(), 1);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (service, _) = service_with(Arc::new(RecordingSender::default()));
        let err = service
            .change_status(OrderId::new(), OrderStatus::Separated)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(OrderStoreError::NotFound)));
    }
}
