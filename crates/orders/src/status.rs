//! Order status lifecycle and the legal-transition table.
//!
//! Serialized names are the canonical Portuguese strings persisted by the
//! store and exposed over the wire. Two historical spellings (`Em analise`,
//! `devolvido`) are accepted on input as aliases and never emitted.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use loja_core::DomainError;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Checkout completed, payment not yet started.
    #[serde(rename = "Aguardando pagamento")]
    AwaitingPayment,
    /// Payment started, provider has not yet answered.
    #[serde(rename = "Pendente")]
    Pending,
    /// Payment under provider review.
    #[serde(rename = "Pagamento em análise", alias = "Em analise")]
    InAnalysis,
    #[serde(rename = "Aprovado")]
    Approved,
    #[serde(rename = "Rejeitado")]
    Rejected,
    #[serde(rename = "Separado")]
    Separated,
    #[serde(rename = "Embalado")]
    Packed,
    #[serde(rename = "Em transporte")]
    InTransit,
    #[serde(rename = "Saiu para entrega")]
    OutForDelivery,
    #[serde(rename = "Entregue")]
    Delivered,
    #[serde(rename = "Aguardando retirada")]
    AwaitingPickup,
    #[serde(rename = "Cancelado")]
    Canceled,
    #[serde(rename = "Devolvido", alias = "devolvido")]
    Refunded,
    #[serde(rename = "Parcialmente devolvido")]
    PartiallyRefunded,
    #[serde(rename = "Extraviado")]
    Lost,
}

impl OrderStatus {
    /// Every status, for exhaustive graph checks.
    pub const ALL: [OrderStatus; 15] = [
        OrderStatus::AwaitingPayment,
        OrderStatus::Pending,
        OrderStatus::InAnalysis,
        OrderStatus::Approved,
        OrderStatus::Rejected,
        OrderStatus::Separated,
        OrderStatus::Packed,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::AwaitingPickup,
        OrderStatus::Canceled,
        OrderStatus::Refunded,
        OrderStatus::PartiallyRefunded,
        OrderStatus::Lost,
    ];

    /// Canonical serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "Aguardando pagamento",
            OrderStatus::Pending => "Pendente",
            OrderStatus::InAnalysis => "Pagamento em análise",
            OrderStatus::Approved => "Aprovado",
            OrderStatus::Rejected => "Rejeitado",
            OrderStatus::Separated => "Separado",
            OrderStatus::Packed => "Embalado",
            OrderStatus::InTransit => "Em transporte",
            OrderStatus::OutForDelivery => "Saiu para entrega",
            OrderStatus::Delivered => "Entregue",
            OrderStatus::AwaitingPickup => "Aguardando retirada",
            OrderStatus::Canceled => "Cancelado",
            OrderStatus::Refunded => "Devolvido",
            OrderStatus::PartiallyRefunded => "Parcialmente devolvido",
            OrderStatus::Lost => "Extraviado",
        }
    }

    /// Legal next states from this status.
    ///
    /// The graph is a table (not scattered conditionals) so it can be tested
    /// exhaustively. `PartiallyRefunded -> PartiallyRefunded` is the one
    /// legal self-transition: further partial refunds may apply.
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            AwaitingPayment => &[InAnalysis, Approved, Rejected, Canceled],
            Pending => &[InAnalysis, Approved, Rejected, Canceled],
            InAnalysis => &[Approved, Rejected, Canceled],
            // Non-terminal: the provider may re-evaluate a rejected payment.
            Rejected => &[InAnalysis, Approved, Canceled],
            Approved => &[Separated, Canceled, Refunded, PartiallyRefunded],
            Separated => &[Packed, Lost, Canceled, Refunded, PartiallyRefunded],
            Packed => &[InTransit, Lost, Canceled, Refunded, PartiallyRefunded],
            InTransit => &[
                OutForDelivery,
                AwaitingPickup,
                Lost,
                Canceled,
                Refunded,
                PartiallyRefunded,
            ],
            OutForDelivery => &[
                Delivered,
                AwaitingPickup,
                Lost,
                Canceled,
                Refunded,
                PartiallyRefunded,
            ],
            AwaitingPickup => &[Delivered, Lost, Canceled, Refunded, PartiallyRefunded],
            // Delivered is terminal for fulfillment; only money can still move.
            Delivered => &[Refunded, PartiallyRefunded],
            PartiallyRefunded => &[PartiallyRefunded, Refunded],
            Canceled => &[],
            Refunded => &[],
            Lost => &[],
        }
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// No outbound transitions at all.
    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Statuses an order may carry at creation time.
    pub fn is_initial(self) -> bool {
        matches!(self, OrderStatus::AwaitingPayment | OrderStatus::Pending)
    }

    /// Payment has been captured and not (fully) undone.
    pub fn is_post_payment(self) -> bool {
        self.can_transition_to(OrderStatus::Refunded)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| DomainError::validation(format!("unknown order status: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outbound_transitions() {
        for s in [OrderStatus::Canceled, OrderStatus::Refunded, OrderStatus::Lost] {
            assert!(s.is_terminal(), "{s} should be terminal");
        }
        assert!(!OrderStatus::Delivered.is_terminal(), "Delivered can still refund");
    }

    #[test]
    fn payment_flow_reaches_approval_and_rejection() {
        for from in [OrderStatus::AwaitingPayment, OrderStatus::Pending] {
            assert!(from.can_transition_to(OrderStatus::InAnalysis));
            assert!(from.can_transition_to(OrderStatus::Approved));
            assert!(from.can_transition_to(OrderStatus::Rejected));
            assert!(!from.can_transition_to(OrderStatus::Delivered));
        }
    }

    #[test]
    fn fulfillment_flow_is_sequential() {
        assert!(OrderStatus::Approved.can_transition_to(OrderStatus::Separated));
        assert!(OrderStatus::Separated.can_transition_to(OrderStatus::Packed));
        assert!(OrderStatus::Packed.can_transition_to(OrderStatus::InTransit));
        assert!(OrderStatus::InTransit.can_transition_to(OrderStatus::OutForDelivery));
        assert!(OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Delivered));

        // No skipping steps.
        assert!(!OrderStatus::Approved.can_transition_to(OrderStatus::InTransit));
        assert!(!OrderStatus::Separated.can_transition_to(OrderStatus::OutForDelivery));
    }

    #[test]
    fn loss_only_after_fulfillment_started() {
        assert!(!OrderStatus::Approved.can_transition_to(OrderStatus::Lost));
        for s in [
            OrderStatus::Separated,
            OrderStatus::Packed,
            OrderStatus::InTransit,
            OrderStatus::OutForDelivery,
            OrderStatus::AwaitingPickup,
        ] {
            assert!(s.can_transition_to(OrderStatus::Lost), "{s} can be lost");
        }
    }

    #[test]
    fn delivered_and_partially_refunded_cannot_cancel() {
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::PartiallyRefunded.can_transition_to(OrderStatus::Canceled));
    }

    #[test]
    fn partial_refund_can_repeat_or_complete() {
        assert!(OrderStatus::PartiallyRefunded.can_transition_to(OrderStatus::PartiallyRefunded));
        assert!(OrderStatus::PartiallyRefunded.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn allowed_transitions_stay_inside_the_graph() {
        // Every entry in the table is itself a known status and no terminal
        // status appears as a source.
        for from in OrderStatus::ALL {
            for to in from.allowed_transitions() {
                assert!(OrderStatus::ALL.contains(to));
                if from != OrderStatus::PartiallyRefunded {
                    assert_ne!(*to, from, "unexpected self-transition for {from}");
                }
            }
        }
        // The one deliberate exception:
        assert!(OrderStatus::PartiallyRefunded
            .allowed_transitions()
            .contains(&OrderStatus::PartiallyRefunded));
    }

    #[test]
    fn serializes_to_canonical_portuguese_names() {
        let json = serde_json::to_string(&OrderStatus::InAnalysis).unwrap();
        assert_eq!(json, "\"Pagamento em análise\"");
        let json = serde_json::to_string(&OrderStatus::Refunded).unwrap();
        assert_eq!(json, "\"Devolvido\"");
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"Saiu para entrega\"");
    }

    #[test]
    fn accepts_migration_artifact_aliases() {
        let s: OrderStatus = serde_json::from_str("\"Em analise\"").unwrap();
        assert_eq!(s, OrderStatus::InAnalysis);
        let s: OrderStatus = serde_json::from_str("\"devolvido\"").unwrap();
        assert_eq!(s, OrderStatus::Refunded);
    }

    #[test]
    fn round_trips_every_status_through_from_str() {
        for s in OrderStatus::ALL {
            let parsed: OrderStatus = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
        assert!("Perdido no limbo".parse::<OrderStatus>().is_err());
    }
}
