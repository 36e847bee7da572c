use axum::Router;

pub mod orders;
pub mod system;
pub mod webhooks;

pub fn router() -> Router {
    Router::new()
        .nest("/orders", orders::router())
        .nest("/webhooks", webhooks::router())
}
