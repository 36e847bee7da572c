use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loja_core::Money;
use loja_orders::{OrderSnapshot, OrderStatus, RefundReasonCode};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    #[serde(default)]
    pub description: String,
    pub items: Vec<OrderItemRequest>,
    /// Defaults to `Aguardando pagamento`.
    pub initial_status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct FullRefundRequest {
    pub reason_code: Option<RefundReasonCode>,
    pub reason: Option<String>,
    /// Defaults to everything still refundable.
    pub amount_cents: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RefundItemDto {
    pub order_item_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct PartialRefundRequest {
    pub items: Vec<RefundItemDto>,
    pub reason_code: Option<RefundReasonCode>,
    pub notes: Option<String>,
}

/// Payment-provider webhook body, already verified upstream.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhookRequest {
    pub event_id: String,
    pub order_id: String,
    pub payment_ref: Option<String>,
    pub payment_status: String,
    pub occurred_at: Option<DateTime<Utc>>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub unit_price: String,
}

#[derive(Debug, Serialize)]
pub struct RefundRecordResponse {
    pub id: String,
    pub reason_code: String,
    pub reason: Option<String>,
    pub amount_cents: u64,
    pub amount: String,
    pub refunded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: Option<String>,
    pub description: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub total_price_cents: u64,
    pub total_price: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_ref: Option<String>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_amount_cents: u64,
    pub refund_amount: String,
    pub refunds: Vec<RefundRecordResponse>,
    pub version: u64,
}

impl From<&OrderSnapshot> for OrderResponse {
    fn from(order: &OrderSnapshot) -> Self {
        let fmt = |m: Money| m.format_brl();
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.map(|c| c.to_string()),
            description: order.description.clone(),
            status: order.status,
            items: order
                .items
                .iter()
                .map(|i| OrderItemResponse {
                    id: i.id.to_string(),
                    product_id: i.product_id.to_string(),
                    product_name: i.product_name.clone(),
                    quantity: i.quantity,
                    unit_price_cents: i.unit_price.cents(),
                    unit_price: fmt(i.unit_price),
                })
                .collect(),
            total_price_cents: order.total_price.cents(),
            total_price: fmt(order.total_price),
            created_at: order.created_at,
            updated_at: order.updated_at,
            paid_at: order.paid_at,
            payment_ref: order.payment_ref.clone(),
            canceled_at: order.canceled_at,
            cancel_reason: order.cancel_reason.clone(),
            refunded_at: order.refunded_at,
            refund_amount_cents: order.refund_amount.cents(),
            refund_amount: fmt(order.refund_amount),
            refunds: order
                .refunds
                .iter()
                .map(|r| RefundRecordResponse {
                    id: r.id.to_string(),
                    reason_code: r.reason_code.as_str().to_string(),
                    reason: r.reason.clone(),
                    amount_cents: r.amount.cents(),
                    amount: fmt(r.amount),
                    refunded_at: r.refunded_at,
                })
                .collect(),
            version: order.version,
        }
    }
}
