//! `loja-orders` — the order aggregate, its status machine and the
//! refund/cancellation engine.

pub mod order;
pub mod refund;
pub mod status;

pub use order::{
    ApplyPaymentStatus, CancelOrder, ChangeStatus, CreateOrder, FullRefund, LineItem, NewLineItem,
    Order, OrderCanceled, OrderCommand, OrderCreated, OrderEvent, OrderRefunded, OrderSnapshot,
    PartialRefund, PartialRefundRecorded, RefundItemRequest, StatusChanged,
};
pub use refund::{RefundReasonCode, RefundRecord, RefundedItem};
pub use status::OrderStatus;
