//! Notification payload building.
//!
//! Given an order snapshot after an accepted transition, produce everything a
//! template needs: customer name, formatted totals, itemized lines, a
//! status-specific copy tuple and the order-status page URL. Amounts render
//! in Brazilian format (`R$ 1.234,56`).

use serde::{Deserialize, Serialize};

use loja_core::OrderId;
use loja_orders::{OrderSnapshot, OrderStatus, RefundRecord};

/// Status-specific copy: subject, status message, action message and
/// optional additional info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCopy {
    pub subject: String,
    pub status_message: String,
    pub action_message: String,
    pub additional_info: Option<String>,
}

impl StatusCopy {
    /// Neutral "order updated" copy.
    ///
    /// Not used by [`NotificationPayload::build`], which has dedicated
    /// wording for every status; this is the shape for callers that do not
    /// vary copy per status.
    pub fn generic(order_id: OrderId) -> Self {
        Self {
            subject: format!("Atualização do pedido {order_id}"),
            status_message: "Seu pedido foi atualizado.".to_string(),
            action_message: "Acompanhe o status do seu pedido".to_string(),
            additional_info: None,
        }
    }

    fn for_order(order: &OrderSnapshot) -> Self {
        let id = order.id;
        let action_message = "Acompanhe o status do seu pedido".to_string();
        let copy = |subject: String, status_message: &str, additional_info: Option<String>| Self {
            subject,
            status_message: status_message.to_string(),
            action_message: action_message.clone(),
            additional_info,
        };

        match order.status {
            OrderStatus::AwaitingPayment => copy(
                format!("Recebemos o seu pedido {id}"),
                "Estamos aguardando a confirmação do pagamento.",
                None,
            ),
            OrderStatus::Pending => copy(
                format!("Pedido {id} aguardando processamento"),
                "Seu pagamento está sendo processado.",
                None,
            ),
            OrderStatus::InAnalysis => copy(
                format!("Pagamento do pedido {id} em análise"),
                "O pagamento do seu pedido está em análise pelo provedor.",
                None,
            ),
            OrderStatus::Approved => copy(
                format!("Pagamento do pedido {id} aprovado"),
                "Seu pagamento foi aprovado! Já estamos preparando tudo.",
                None,
            ),
            OrderStatus::Rejected => copy(
                format!("Pagamento do pedido {id} não aprovado"),
                "O pagamento não foi aprovado. Tente novamente com outro meio de pagamento.",
                None,
            ),
            OrderStatus::Separated => copy(
                format!("Pedido {id} separado"),
                "Os itens do seu pedido foram separados no estoque.",
                None,
            ),
            OrderStatus::Packed => copy(
                format!("Pedido {id} embalado"),
                "Seu pedido foi embalado e logo será despachado.",
                None,
            ),
            OrderStatus::InTransit => copy(
                format!("Pedido {id} em transporte"),
                "Seu pedido está a caminho.",
                None,
            ),
            OrderStatus::OutForDelivery => copy(
                format!("Pedido {id} saiu para entrega"),
                "Seu pedido saiu para entrega e chega em breve.",
                None,
            ),
            OrderStatus::Delivered => copy(
                format!("Pedido {id} entregue"),
                "Seu pedido foi entregue. Esperamos que goste!",
                None,
            ),
            OrderStatus::AwaitingPickup => copy(
                format!("Pedido {id} aguardando retirada"),
                "Seu pedido está disponível para retirada.",
                None,
            ),
            OrderStatus::Canceled => copy(
                format!("Pedido {id} cancelado"),
                "Seu pedido foi cancelado.",
                order
                    .cancel_reason
                    .as_ref()
                    .map(|r| format!("Motivo: {r}")),
            ),
            OrderStatus::Refunded => copy(
                format!("Pedido {id} devolvido"),
                "O valor do seu pedido foi devolvido.",
                Some(format!(
                    "Valor devolvido: {}",
                    order.refund_amount.format_brl()
                )),
            ),
            OrderStatus::PartiallyRefunded => copy(
                format!("Pedido {id} parcialmente devolvido"),
                "Parte do valor do seu pedido foi devolvida.",
                Some(format!(
                    "Valor devolvido até agora: {}",
                    order.refund_amount.format_brl()
                )),
            ),
            OrderStatus::Lost => copy(
                format!("Pedido {id} extraviado"),
                "Seu pedido foi extraviado no transporte. Entraremos em contato.",
                None,
            ),
        }
    }
}

/// One itemized order line, formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadLine {
    pub product_name: String,
    pub quantity: u32,
    pub formatted_unit_price: String,
}

/// One refunded line in a partial-refund notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundedLine {
    pub product_name: String,
    pub quantity: u32,
    pub formatted_amount: String,
}

/// Fully-populated message payload handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub customer_name: String,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub formatted_total: String,
    pub items: Vec<PayloadLine>,
    pub subject: String,
    pub status_message: String,
    pub action_message: String,
    pub additional_info: Option<String>,
    /// Order-status page for this order.
    pub action_url: String,
    /// Present for partial refunds: the amount and items of the latest
    /// refund record.
    pub refunded_amount: Option<String>,
    pub refunded_items: Vec<RefundedLine>,
}

impl NotificationPayload {
    /// Build the payload for an order in its (new) current status.
    ///
    /// `base_url` is the storefront root, e.g. `https://loja.example.com`.
    pub fn build(order: &OrderSnapshot, customer_name: &str, base_url: &str) -> Self {
        let copy = StatusCopy::for_order(order);

        let items = order
            .items
            .iter()
            .map(|i| PayloadLine {
                product_name: i.product_name.clone(),
                quantity: i.quantity,
                formatted_unit_price: i.unit_price.format_brl(),
            })
            .collect();

        let (refunded_amount, refunded_items) =
            if order.status == OrderStatus::PartiallyRefunded {
                let latest: Option<&RefundRecord> = order.refunds.last();
                (
                    latest.map(|r| r.amount.format_brl()),
                    latest
                        .map(|r| {
                            r.items
                                .iter()
                                .map(|i| RefundedLine {
                                    product_name: i.product_name.clone(),
                                    quantity: i.quantity,
                                    formatted_amount: i.amount.format_brl(),
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                )
            } else {
                (None, Vec::new())
            };

        Self {
            customer_name: customer_name.to_string(),
            order_id: order.id,
            status: order.status,
            formatted_total: order.total_price.format_brl(),
            items,
            subject: copy.subject,
            status_message: copy.status_message,
            action_message: copy.action_message,
            additional_info: copy.additional_info,
            action_url: format!("{}/pedidos/{}", base_url.trim_end_matches('/'), order.id),
            refunded_amount,
            refunded_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loja_core::{CustomerId, Money, OrderItemId, ProductId, RefundId};
    use loja_orders::{LineItem, RefundReasonCode, RefundedItem};

    fn snapshot(status: OrderStatus) -> OrderSnapshot {
        OrderSnapshot {
            id: OrderId::new(),
            customer_id: Some(CustomerId::new()),
            description: String::new(),
            status,
            items: vec![LineItem {
                id: OrderItemId::new(),
                product_id: ProductId::new(),
                product_name: "Caneca".to_string(),
                quantity: 2,
                unit_price: Money::from_cents(2050),
            }],
            total_price: Money::from_cents(4100),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            paid_at: None,
            payment_ref: None,
            canceled_at: None,
            cancel_reason: None,
            refund_reason_code: None,
            refund_reason: None,
            refunded_at: None,
            refund_amount: Money::ZERO,
            refunds: Vec::new(),
            version: 1,
        }
    }

    #[test]
    fn subject_carries_the_order_id_for_every_status() {
        for status in OrderStatus::ALL {
            let order = snapshot(status);
            let payload = NotificationPayload::build(&order, "Maria", "https://loja.example.com");
            assert!(
                payload.subject.contains(&order.id.to_string()),
                "{status}: {}",
                payload.subject
            );
            assert!(!payload.status_message.is_empty());
            assert!(!payload.action_message.is_empty());
        }
    }

    #[test]
    fn totals_and_lines_are_formatted_in_brl() {
        let order = snapshot(OrderStatus::Approved);
        let payload = NotificationPayload::build(&order, "Maria", "https://loja.example.com");

        assert_eq!(payload.formatted_total, "R$ 41,00");
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].formatted_unit_price, "R$ 20,50");
        assert_eq!(payload.items[0].quantity, 2);
    }

    #[test]
    fn action_url_points_at_the_order_status_page() {
        let order = snapshot(OrderStatus::InTransit);
        let payload = NotificationPayload::build(&order, "Maria", "https://loja.example.com/");
        assert_eq!(
            payload.action_url,
            format!("https://loja.example.com/pedidos/{}", order.id)
        );
    }

    #[test]
    fn canceled_copy_includes_the_reason() {
        let mut order = snapshot(OrderStatus::Canceled);
        order.cancel_reason = Some("cliente desistiu".to_string());
        let payload = NotificationPayload::build(&order, "Maria", "https://loja.example.com");
        assert_eq!(
            payload.additional_info.as_deref(),
            Some("Motivo: cliente desistiu")
        );
    }

    #[test]
    fn partial_refund_payload_itemizes_the_latest_record() {
        let mut order = snapshot(OrderStatus::PartiallyRefunded);
        let line = order.items[0].clone();
        order.refund_amount = Money::from_cents(2050);
        order.refunds.push(RefundRecord {
            id: RefundId::new(),
            reason_code: RefundReasonCode::ProductDefect,
            reason: None,
            amount: Money::from_cents(2050),
            items: vec![RefundedItem {
                order_item_id: line.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: 1,
                amount: Money::from_cents(2050),
            }],
            refunded_at: Utc::now(),
        });

        let payload = NotificationPayload::build(&order, "Maria", "https://loja.example.com");
        assert_eq!(payload.refunded_amount.as_deref(), Some("R$ 20,50"));
        assert_eq!(payload.refunded_items.len(), 1);
        assert_eq!(payload.refunded_items[0].formatted_amount, "R$ 20,50");
    }

    #[test]
    fn non_refund_statuses_carry_no_refund_breakdown() {
        let order = snapshot(OrderStatus::Delivered);
        let payload = NotificationPayload::build(&order, "Maria", "https://loja.example.com");
        assert!(payload.refunded_amount.is_none());
        assert!(payload.refunded_items.is_empty());
    }

    #[test]
    fn generic_copy_is_available_as_fallback() {
        let id = OrderId::new();
        let copy = StatusCopy::generic(id);
        assert!(copy.subject.contains(&id.to_string()));
    }
}
