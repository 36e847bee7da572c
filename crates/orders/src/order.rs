use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loja_core::{
    Aggregate, AggregateRoot, CustomerId, DomainError, DomainEvent, Entity, Money, OrderId,
    OrderItemId, ProductId, RefundId,
};

use crate::refund::{RefundReasonCode, RefundRecord, RefundedItem};
use crate::status::OrderStatus;

/// Line item input at order creation (ids are assigned by the aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Immutable snapshot of one product's quantity and price within an order.
///
/// Name and price are captured at order time and never follow later catalog
/// changes; `product_id` is kept for traceability only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

impl Entity for LineItem {
    type Id = OrderItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One line of a partial-refund request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundItemRequest {
    pub order_item_id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
}

/// Aggregate root: Order.
///
/// Orders are never deleted; terminal statuses keep the row as an audit
/// record. `total_price` is the original order value and is never recomputed
/// after refunds (ledger semantics; refunds accumulate in `refunds`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer_id: Option<CustomerId>,
    description: String,
    status: OrderStatus,
    items: Vec<LineItem>,
    total_price: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    payment_ref: Option<String>,
    canceled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    refund_reason_code: Option<RefundReasonCode>,
    refund_reason: Option<String>,
    refunded_at: Option<DateTime<Utc>>,
    /// Cumulative refunded amount across all refund records.
    refund_amount: Money,
    refunds: Vec<RefundRecord>,
    version: u64,
    created: bool,
}

/// Plain-data image of an [`Order`], used by persistence and read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub description: String,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_ref: Option<String>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub refund_reason_code: Option<RefundReasonCode>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_amount: Money,
    pub refunds: Vec<RefundRecord>,
    pub version: u64,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            customer_id: None,
            description: String::new(),
            status: OrderStatus::AwaitingPayment,
            items: Vec::new(),
            total_price: Money::ZERO,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            paid_at: None,
            payment_ref: None,
            canceled_at: None,
            cancel_reason: None,
            refund_reason_code: None,
            refund_reason: None,
            refunded_at: None,
            refund_amount: Money::ZERO,
            refunds: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Rehydrate from a stored snapshot.
    pub fn from_snapshot(s: OrderSnapshot) -> Self {
        Self {
            id: s.id,
            customer_id: s.customer_id,
            description: s.description,
            status: s.status,
            items: s.items,
            total_price: s.total_price,
            created_at: s.created_at,
            updated_at: s.updated_at,
            paid_at: s.paid_at,
            payment_ref: s.payment_ref,
            canceled_at: s.canceled_at,
            cancel_reason: s.cancel_reason,
            refund_reason_code: s.refund_reason_code,
            refund_reason: s.refund_reason,
            refunded_at: s.refunded_at,
            refund_amount: s.refund_amount,
            refunds: s.refunds,
            version: s.version,
            created: true,
        }
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            id: self.id,
            customer_id: self.customer_id,
            description: self.description.clone(),
            status: self.status,
            items: self.items.clone(),
            total_price: self.total_price,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            payment_ref: self.payment_ref.clone(),
            canceled_at: self.canceled_at,
            cancel_reason: self.cancel_reason.clone(),
            refund_reason_code: self.refund_reason_code,
            refund_reason: self.refund_reason.clone(),
            refunded_at: self.refunded_at,
            refund_amount: self.refund_amount,
            refunds: self.refunds.clone(),
            version: self.version,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn payment_ref(&self) -> Option<&str> {
        self.payment_ref.as_deref()
    }

    pub fn canceled_at(&self) -> Option<DateTime<Utc>> {
        self.canceled_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    /// Cumulative refunded amount across the ledger.
    pub fn refund_amount(&self) -> Money {
        self.refund_amount
    }

    pub fn refunds(&self) -> &[RefundRecord] {
        &self.refunds
    }

    pub fn item(&self, id: OrderItemId) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// How much money can still be returned.
    pub fn remaining_refundable(&self) -> Money {
        self.total_price.saturating_sub(self.refund_amount)
    }

    /// Units of one line item already covered by prior refund records.
    pub fn refunded_quantity_for(&self, item_id: OrderItemId) -> u32 {
        self.refunds.iter().map(|r| r.quantity_for(item_id)).sum()
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder (checkout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub description: String,
    pub items: Vec<NewLineItem>,
    /// `Aguardando pagamento` or `Pendente`, depending on checkout flow.
    pub initial_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus (administrative fulfillment step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: OrderId,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyPaymentStatus (verified payment-webhook event, already
/// mapped from the provider's vocabulary to [`OrderStatus`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPaymentStatus {
    pub order_id: OrderId,
    pub to: OrderStatus,
    pub payment_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FullRefund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullRefund {
    pub order_id: OrderId,
    pub reason_code: RefundReasonCode,
    pub reason: Option<String>,
    /// Defaults to the remaining refundable amount (the full `total_price`
    /// when no partial refund preceded it).
    pub amount: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PartialRefund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRefund {
    pub order_id: OrderId,
    pub items: Vec<RefundItemRequest>,
    pub reason_code: Option<RefundReasonCode>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    ChangeStatus(ChangeStatus),
    ApplyPaymentStatus(ApplyPaymentStatus),
    CancelOrder(CancelOrder),
    FullRefund(FullRefund),
    PartialRefund(PartialRefund),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub description: String,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub total_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged (payment or fulfillment step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub payment_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRefunded (full refund; `record.items` is empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRefunded {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub record: RefundRecord,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartialRefundRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRefundRecorded {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub record: RefundRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    StatusChanged(StatusChanged),
    OrderCanceled(OrderCanceled),
    OrderRefunded(OrderRefunded),
    PartialRefundRecorded(PartialRefundRecorded),
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderCreated(e) => e.order_id,
            OrderEvent::StatusChanged(e) => e.order_id,
            OrderEvent::OrderCanceled(e) => e.order_id,
            OrderEvent::OrderRefunded(e) => e.order_id,
            OrderEvent::PartialRefundRecorded(e) => e.order_id,
        }
    }

    /// The status the order carries once this event is applied.
    pub fn resulting_status(&self) -> Option<OrderStatus> {
        match self {
            OrderEvent::OrderCreated(e) => Some(e.status),
            OrderEvent::StatusChanged(e) => Some(e.to),
            OrderEvent::OrderCanceled(_) => Some(OrderStatus::Canceled),
            OrderEvent::OrderRefunded(_) => Some(OrderStatus::Refunded),
            OrderEvent::PartialRefundRecorded(_) => Some(OrderStatus::PartiallyRefunded),
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "orders.created",
            OrderEvent::StatusChanged(_) => "orders.status_changed",
            OrderEvent::OrderCanceled(_) => "orders.canceled",
            OrderEvent::OrderRefunded(_) => "orders.refunded",
            OrderEvent::PartialRefundRecorded(_) => "orders.partial_refund_recorded",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
            OrderEvent::OrderCanceled(e) => e.occurred_at,
            OrderEvent::OrderRefunded(e) => e.occurred_at,
            OrderEvent::PartialRefundRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.customer_id = Some(e.customer_id);
                self.description = e.description.clone();
                self.status = e.status;
                self.items = e.items.clone();
                self.total_price = e.total_price;
                self.created_at = e.occurred_at;
                self.updated_at = e.occurred_at;
                self.created = true;
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
                if e.to == OrderStatus::Approved {
                    self.paid_at = Some(e.occurred_at);
                }
                if let Some(r) = &e.payment_ref {
                    self.payment_ref = Some(r.clone());
                }
                self.updated_at = e.occurred_at;
            }
            OrderEvent::OrderCanceled(e) => {
                self.status = OrderStatus::Canceled;
                self.canceled_at = Some(e.occurred_at);
                self.cancel_reason = Some(e.reason.clone());
                self.updated_at = e.occurred_at;
            }
            OrderEvent::OrderRefunded(e) => {
                self.status = OrderStatus::Refunded;
                self.record_refund(&e.record);
                self.updated_at = e.occurred_at;
            }
            OrderEvent::PartialRefundRecorded(e) => {
                self.status = OrderStatus::PartiallyRefunded;
                self.record_refund(&e.record);
                self.updated_at = e.occurred_at;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::ApplyPaymentStatus(cmd) => self.handle_apply_payment_status(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::FullRefund(cmd) => self.handle_full_refund(cmd),
            OrderCommand::PartialRefund(cmd) => self.handle_partial_refund(cmd),
        }
    }
}

impl Order {
    fn record_refund(&mut self, record: &RefundRecord) {
        self.refund_amount = self.refund_amount.saturating_add(record.amount);
        self.refund_reason_code = Some(record.reason_code);
        self.refund_reason = record.reason.clone();
        self.refunded_at = Some(record.refunded_at);
        self.refunds.push(record.clone());
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::validation("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_reachable(&self, to: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::invalid_transition(self.status, to));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        if !cmd.initial_status.is_initial() {
            return Err(DomainError::validation(format!(
                "orders start as '{}' or '{}', not '{}'",
                OrderStatus::AwaitingPayment,
                OrderStatus::Pending,
                cmd.initial_status
            )));
        }

        if cmd.items.is_empty() {
            return Err(DomainError::validation("order requires at least one item"));
        }

        let mut items = Vec::with_capacity(cmd.items.len());
        let mut total = Money::ZERO;
        for item in &cmd.items {
            if item.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "quantity must be at least 1 for product '{}'",
                    item.product_name
                )));
            }
            let line = LineItem {
                id: OrderItemId::new(),
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            };
            total = total.checked_add(line.line_total()?)?;
            items.push(line);
        }

        Ok(vec![OrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            description: cmd.description.clone(),
            status: cmd.initial_status,
            items,
            total_price: total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        match cmd.to {
            OrderStatus::Canceled => {
                return Err(DomainError::validation(
                    "cancellation requires a reason; use the cancel operation",
                ));
            }
            OrderStatus::Refunded | OrderStatus::PartiallyRefunded => {
                return Err(DomainError::validation(
                    "refunds require a reason code and amount; use the refund operations",
                ));
            }
            _ => {}
        }

        self.ensure_reachable(cmd.to)?;

        Ok(vec![OrderEvent::StatusChanged(StatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.to,
            payment_ref: None,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_payment_status(
        &self,
        cmd: &ApplyPaymentStatus,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        // Webhooks are at-least-once: a re-delivered status is a no-op.
        if cmd.to == self.status {
            return Ok(vec![]);
        }

        if cmd.to == OrderStatus::Refunded {
            // Provider-executed refund of whatever is still refundable.
            self.ensure_reachable(OrderStatus::Refunded)?;
            let record = RefundRecord {
                id: RefundId::new(),
                reason_code: RefundReasonCode::Other,
                reason: Some("refund executed by payment provider".to_string()),
                amount: self.remaining_refundable(),
                items: Vec::new(),
                refunded_at: cmd.occurred_at,
            };
            return Ok(vec![OrderEvent::OrderRefunded(OrderRefunded {
                order_id: cmd.order_id,
                from: self.status,
                record,
                occurred_at: cmd.occurred_at,
            })]);
        }

        if cmd.to == OrderStatus::Canceled {
            // Provider-side cancellation still carries the side data a
            // canceled order must have.
            self.ensure_reachable(OrderStatus::Canceled)?;
            return Ok(vec![OrderEvent::OrderCanceled(OrderCanceled {
                order_id: cmd.order_id,
                from: self.status,
                reason: "canceled by payment provider".to_string(),
                occurred_at: cmd.occurred_at,
            })]);
        }

        if cmd.to == OrderStatus::PartiallyRefunded {
            return Err(DomainError::validation(
                "partial refunds cannot be applied from a payment status",
            ));
        }

        self.ensure_reachable(cmd.to)?;

        Ok(vec![OrderEvent::StatusChanged(StatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.to,
            payment_ref: cmd.payment_ref.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_reachable(OrderStatus::Canceled)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation(
                "cancellation requires a non-empty reason",
            ));
        }

        Ok(vec![OrderEvent::OrderCanceled(OrderCanceled {
            order_id: cmd.order_id,
            from: self.status,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_full_refund(&self, cmd: &FullRefund) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_reachable(OrderStatus::Refunded)?;

        let remaining = self.remaining_refundable();
        let amount = cmd.amount.unwrap_or(remaining);

        if amount.is_zero() {
            return Err(DomainError::validation("refund amount must be positive"));
        }
        if amount > remaining {
            return Err(DomainError::validation(format!(
                "refund amount {} exceeds remaining refundable amount {}",
                amount, remaining
            )));
        }

        let record = RefundRecord {
            id: RefundId::new(),
            reason_code: cmd.reason_code,
            reason: cmd.reason.clone(),
            amount,
            items: Vec::new(),
            refunded_at: cmd.occurred_at,
        };

        Ok(vec![OrderEvent::OrderRefunded(OrderRefunded {
            order_id: cmd.order_id,
            from: self.status,
            record,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_partial_refund(&self, cmd: &PartialRefund) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_reachable(OrderStatus::PartiallyRefunded)?;

        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "partial refund requires at least one item",
            ));
        }

        // Quantities already claimed by this same request (duplicated item ids
        // count against the same remaining budget).
        let mut claimed: HashMap<OrderItemId, u32> = HashMap::new();
        let mut refunded_items = Vec::with_capacity(cmd.items.len());
        let mut amount = Money::ZERO;

        for req in &cmd.items {
            let line = self.item(req.order_item_id).ok_or(DomainError::NotFound)?;

            if line.product_id != req.product_id {
                return Err(DomainError::validation(format!(
                    "product mismatch for item '{}': order snapshot has a different product",
                    req.product_name
                )));
            }
            if req.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "refund quantity must be at least 1 for item '{}'",
                    line.product_name
                )));
            }

            let prior = self.refunded_quantity_for(line.id) + claimed.get(&line.id).copied().unwrap_or(0);
            let remaining_qty = line.quantity.saturating_sub(prior);
            if req.quantity > remaining_qty {
                return Err(DomainError::validation(format!(
                    "refund quantity {} exceeds remaining refundable quantity {} for item '{}'",
                    req.quantity, remaining_qty, line.product_name
                )));
            }
            *claimed.entry(line.id).or_insert(0) += req.quantity;

            let item_amount = line.unit_price.checked_mul(req.quantity)?;
            amount = amount.checked_add(item_amount)?;
            refunded_items.push(RefundedItem {
                order_item_id: line.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: req.quantity,
                amount: item_amount,
            });
        }

        let remaining = self.remaining_refundable();
        if amount > remaining {
            return Err(DomainError::validation(format!(
                "refund amount {} exceeds remaining refundable amount {}",
                amount, remaining
            )));
        }

        let record = RefundRecord {
            id: RefundId::new(),
            reason_code: cmd.reason_code.unwrap_or(RefundReasonCode::CustomerRequest),
            reason: cmd.notes.clone(),
            amount,
            items: refunded_items,
            refunded_at: cmd.occurred_at,
        };

        Ok(vec![OrderEvent::PartialRefundRecorded(PartialRefundRecorded {
            order_id: cmd.order_id,
            from: self.status,
            record,
            occurred_at: cmd.occurred_at,
        })])
    }
}
