//! `loja-payments` — inbound payment-webhook events and the provider
//! status mapping table.

pub mod webhook;

pub use webhook::{PaymentStatusMap, PaymentWebhookEvent};
