//! `loja-notifications` — data shaping for customer-facing status messages.
//!
//! This crate builds fully-populated message payloads; rendering templates
//! and actually delivering mail is an external collaborator behind
//! [`NotificationSender`].

pub mod payload;
pub mod sender;

pub use payload::{NotificationPayload, PayloadLine, RefundedLine, StatusCopy};
pub use sender::{NotificationSender, TracingNotificationSender};
