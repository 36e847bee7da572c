use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use loja_core::OrderId;
use loja_payments::PaymentWebhookEvent;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/payments", post(payment_webhook))
}

/// Payment-provider callback.
///
/// Signature verification happens at the gateway before the request reaches
/// this service. Re-deliveries of an already applied status return 200 with
/// the unchanged order.
pub async fn payment_webhook(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PaymentWebhookRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match body.order_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
        }
    };

    let event = PaymentWebhookEvent {
        event_id: body.event_id,
        order_id,
        payment_ref: body.payment_ref,
        payment_status: body.payment_status,
        occurred_at: body.occurred_at.unwrap_or_else(Utc::now),
    };

    match services.orders.handle_webhook(event).await {
        Ok(order) => Json(dto::OrderResponse::from(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
