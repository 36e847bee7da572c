//! Domain event trait.

use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are **immutable facts**: once emitted by an accepted command they
/// describe what happened and feed the post-commit side effects
/// (notification dispatch).
pub trait DomainEvent: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "orders.status_changed").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
