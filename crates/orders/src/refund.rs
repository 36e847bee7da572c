//! Refund ledger records and reason codes.
//!
//! A refund never edits the order's line items or `total_price`; each
//! approved refund appends an immutable record here. Corrections are new
//! records, not edits.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use loja_core::{DomainError, Entity, Money, OrderItemId, ProductId, RefundId};

/// Why money was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReasonCode {
    CustomerRequest,
    ProductDefect,
    WrongItem,
    NotDelivered,
    DuplicatedPayment,
    Other,
}

impl RefundReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReasonCode::CustomerRequest => "customer_request",
            RefundReasonCode::ProductDefect => "product_defect",
            RefundReasonCode::WrongItem => "wrong_item",
            RefundReasonCode::NotDelivered => "not_delivered",
            RefundReasonCode::DuplicatedPayment => "duplicated_payment",
            RefundReasonCode::Other => "other",
        }
    }
}

impl core::fmt::Display for RefundReasonCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefundReasonCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer_request" => Ok(RefundReasonCode::CustomerRequest),
            "product_defect" => Ok(RefundReasonCode::ProductDefect),
            "wrong_item" => Ok(RefundReasonCode::WrongItem),
            "not_delivered" => Ok(RefundReasonCode::NotDelivered),
            "duplicated_payment" => Ok(RefundReasonCode::DuplicatedPayment),
            "other" => Ok(RefundReasonCode::Other),
            _ => Err(DomainError::validation(format!(
                "unknown refund reason code: {s}"
            ))),
        }
    }
}

/// One refunded line-item slice within a refund record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundedItem {
    pub order_item_id: OrderItemId,
    pub product_id: ProductId,
    /// Name snapshot at refund time (matches the line item's snapshot).
    pub product_name: String,
    pub quantity: u32,
    /// quantity × the line item's captured unit price.
    pub amount: Money,
}

/// Immutable ledger entry documenting money returned to the customer.
///
/// Full refunds carry an empty `items` list; partial refunds itemize what
/// was returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: RefundId,
    pub reason_code: RefundReasonCode,
    pub reason: Option<String>,
    pub amount: Money,
    pub items: Vec<RefundedItem>,
    pub refunded_at: DateTime<Utc>,
}

impl RefundRecord {
    pub fn is_partial(&self) -> bool {
        !self.items.is_empty()
    }

    /// Quantity of one line item covered by this record.
    pub fn quantity_for(&self, item_id: OrderItemId) -> u32 {
        self.items
            .iter()
            .filter(|i| i.order_item_id == item_id)
            .map(|i| i.quantity)
            .sum()
    }
}

impl Entity for RefundRecord {
    type Id = RefundId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_serialize_snake_case() {
        let json = serde_json::to_string(&RefundReasonCode::DuplicatedPayment).unwrap();
        assert_eq!(json, "\"duplicated_payment\"");
        let parsed: RefundReasonCode = "wrong_item".parse().unwrap();
        assert_eq!(parsed, RefundReasonCode::WrongItem);
        assert!("store_credit".parse::<RefundReasonCode>().is_err());
    }

    #[test]
    fn quantity_for_sums_matching_items() {
        let item_id = OrderItemId::new();
        let other_id = OrderItemId::new();
        let record = RefundRecord {
            id: RefundId::new(),
            reason_code: RefundReasonCode::ProductDefect,
            reason: None,
            amount: Money::from_cents(3000),
            items: vec![
                RefundedItem {
                    order_item_id: item_id,
                    product_id: ProductId::new(),
                    product_name: "Caneca".to_string(),
                    quantity: 2,
                    amount: Money::from_cents(2000),
                },
                RefundedItem {
                    order_item_id: other_id,
                    product_id: ProductId::new(),
                    product_name: "Adesivo".to_string(),
                    quantity: 1,
                    amount: Money::from_cents(1000),
                },
            ],
            refunded_at: Utc::now(),
        };

        assert!(record.is_partial());
        assert_eq!(record.quantity_for(item_id), 2);
        assert_eq!(record.quantity_for(other_id), 1);
        assert_eq!(record.quantity_for(OrderItemId::new()), 0);
    }
}
