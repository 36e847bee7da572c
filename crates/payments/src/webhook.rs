//! Payment-provider webhook events.
//!
//! The HTTP layer verifies the provider signature before anything here runs;
//! a failed verification must prevent all mutation. What arrives here is a
//! trusted event carrying the provider's payment status vocabulary, which is
//! translated to [`OrderStatus`] through a configuration table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loja_core::{DomainError, OrderId};
use loja_orders::OrderStatus;

/// A verified, provider-signed notification of a payment-state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentWebhookEvent {
    /// Provider-side event id (delivery is at-least-once).
    pub event_id: String,
    pub order_id: OrderId,
    /// Provider payment reference (e.g. the checkout's payment id).
    pub payment_ref: Option<String>,
    /// Provider status string, e.g. "approved", "in_process".
    pub payment_status: String,
    pub occurred_at: DateTime<Utc>,
}

/// Provider payment status → order status.
///
/// A table, not business logic: deployments override it via configuration
/// (it deserializes from a plain `{ "provider_status": "Status canônico" }`
/// JSON object).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentStatusMap {
    map: HashMap<String, OrderStatus>,
}

impl PaymentStatusMap {
    pub fn new(map: HashMap<String, OrderStatus>) -> Self {
        Self { map }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, OrderStatus)>,
        S: Into<String>,
    {
        Self {
            map: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Resolve a provider status; unknown statuses are a validation error,
    /// never a guess.
    pub fn resolve(&self, provider_status: &str) -> Result<OrderStatus, DomainError> {
        self.map.get(provider_status).copied().ok_or_else(|| {
            DomainError::validation(format!(
                "unmapped provider payment status: {provider_status}"
            ))
        })
    }

    pub fn contains(&self, provider_status: &str) -> bool {
        self.map.contains_key(provider_status)
    }
}

impl Default for PaymentStatusMap {
    /// The stock mapping for the checkout provider's vocabulary.
    fn default() -> Self {
        Self::from_pairs([
            ("pending", OrderStatus::Pending),
            ("in_process", OrderStatus::InAnalysis),
            ("in_mediation", OrderStatus::InAnalysis),
            ("approved", OrderStatus::Approved),
            ("authorized", OrderStatus::Approved),
            ("rejected", OrderStatus::Rejected),
            ("cancelled", OrderStatus::Canceled),
            ("refunded", OrderStatus::Refunded),
            ("charged_back", OrderStatus::Refunded),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_covers_the_provider_vocabulary() {
        let map = PaymentStatusMap::default();
        assert_eq!(map.resolve("approved").unwrap(), OrderStatus::Approved);
        assert_eq!(map.resolve("rejected").unwrap(), OrderStatus::Rejected);
        assert_eq!(map.resolve("in_process").unwrap(), OrderStatus::InAnalysis);
        assert_eq!(map.resolve("refunded").unwrap(), OrderStatus::Refunded);
    }

    #[test]
    fn unknown_provider_status_is_a_validation_error() {
        let map = PaymentStatusMap::default();
        let err = map.resolve("teleported").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn map_overrides_load_from_configuration() {
        let json = r#"{"approved": "Aprovado", "under_review": "Pagamento em análise"}"#;
        let map: PaymentStatusMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.resolve("under_review").unwrap(), OrderStatus::InAnalysis);
        assert!(!map.contains("rejected"));
    }
}
