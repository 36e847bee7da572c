use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use loja_core::{CustomerId, Money, OrderId, OrderItemId, ProductId};
use loja_orders::{NewLineItem, OrderStatus, RefundItemRequest, RefundReasonCode};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/status", post(change_status))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/refund", post(full_refund))
        .route("/:id/refund/partial", post(partial_refund))
}

fn parse_order_id(id: &str) -> Result<OrderId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
    })
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let customer_id: CustomerId = match body.customer_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid customer id")
        }
    };

    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let product_id: ProductId = match item.product_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid product id",
                )
            }
        };
        items.push(NewLineItem {
            product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: Money::from_cents(item.unit_price_cents),
        });
    }

    let initial_status = body.initial_status.unwrap_or(OrderStatus::AwaitingPayment);
    match services
        .orders
        .create_order(customer_id, body.description, items, initial_status)
        .await
    {
        Ok(order) => (
            StatusCode::CREATED,
            Json(dto::OrderResponse::from(&order)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.get_order(order_id).await {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeStatusRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.change_status(order_id, body.status).await {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelOrderRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.cancel(order_id, body.reason).await {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn full_refund(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::FullRefundRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let reason_code = body.reason_code.unwrap_or(RefundReasonCode::CustomerRequest);
    let amount = body.amount_cents.map(Money::from_cents);

    match services
        .orders
        .full_refund(order_id, reason_code, body.reason, amount)
        .await
    {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn partial_refund(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::PartialRefundRequest>,
) -> axum::response::Response {
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut items = Vec::with_capacity(body.items.len());
    for item in body.items {
        let order_item_id: OrderItemId = match item.order_item_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid order item id",
                )
            }
        };
        let product_id: ProductId = match item.product_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid product id",
                )
            }
        };
        items.push(RefundItemRequest {
            order_item_id,
            product_id,
            product_name: item.product_name,
            quantity: item.quantity,
        });
    }

    match services
        .orders
        .partial_refund(order_id, items, body.reason_code, body.notes)
        .await
    {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
