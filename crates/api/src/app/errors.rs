use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use loja_core::DomainError;
use loja_infra::{OrderStoreError, ServiceError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => store_error_to_response(e),
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvalidTransition { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_transition",
            err.to_string(),
        ),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::External(msg) => json_error(StatusCode::BAD_GATEWAY, "external_error", msg),
    }
}

fn store_error_to_response(err: OrderStoreError) -> axum::response::Response {
    match err {
        OrderStoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
        OrderStoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        OrderStoreError::Corrupt(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "corrupt_order", msg)
        }
        OrderStoreError::Database(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
