//! Outbound delivery seam.

use async_trait::async_trait;

use loja_core::DomainError;

use crate::payload::NotificationPayload;

/// Delivery collaborator (mail service, push gateway, ...).
///
/// Dispatch is best-effort, at-least-once: the caller invokes this after the
/// state transition has committed and logs failures instead of rolling back.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), DomainError>;
}

/// Sender that only logs the payload. Used in dev and tests.
#[derive(Debug, Default)]
pub struct TracingNotificationSender;

#[async_trait]
impl NotificationSender for TracingNotificationSender {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), DomainError> {
        tracing::info!(
            order_id = %payload.order_id,
            status = %payload.status,
            subject = %payload.subject,
            "notification dispatched"
        );
        Ok(())
    }
}
