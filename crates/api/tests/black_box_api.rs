use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use loja_api::app::services::{in_memory_order_service, AppServices};
use loja_infra::InMemoryCustomerDirectory;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let customers = Arc::new(InMemoryCustomerDirectory::new());
        let services = Arc::new(AppServices {
            orders: in_memory_order_service(customers, "https://loja.example.com"),
        });
        let app = loja_api::app::build_app_with(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn order_body() -> serde_json::Value {
    json!({
        "customer_id": Uuid::now_v7().to_string(),
        "description": "pedido de teste",
        "items": [
            {
                "product_id": Uuid::now_v7().to_string(),
                "product_name": "Caneca",
                "quantity": 2,
                "unit_price_cents": 2050
            }
        ]
    })
}

async fn create_order(client: &reqwest::Client, base_url: &str) -> serde_json::Value {
    let resp = client
        .post(format!("{base_url}/orders"))
        .json(&order_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn approve(client: &reqwest::Client, base_url: &str, order_id: &str) -> serde_json::Value {
    let resp = client
        .post(format!("{base_url}/webhooks/payments"))
        .json(&json!({
            "event_id": "evt-1",
            "order_id": order_id,
            "payment_ref": "mp-123",
            "payment_status": "approved"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn().await;
    let resp = reqwest::get(format!("{}/health", server.base_url)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_then_fetch_an_order() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &server.base_url).await;
    assert_eq!(created["status"], "Aguardando pagamento");
    assert_eq!(created["total_price_cents"], 4100);
    assert_eq!(created["total_price"], "R$ 41,00");

    let id = created["id"].as_str().unwrap();
    let resp = client
        .get(format!("{}/orders/{id}", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn payment_webhook_approves_and_redelivery_is_idempotent() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &server.base_url).await;
    let id = created["id"].as_str().unwrap();

    let approved = approve(&client, &server.base_url, id).await;
    assert_eq!(approved["status"], "Aprovado");
    assert!(!approved["paid_at"].is_null());
    assert_eq!(approved["payment_ref"], "mp-123");

    let redelivered = approve(&client, &server.base_url, id).await;
    assert_eq!(redelivered["version"], approved["version"]);
}

#[tokio::test]
async fn unmapped_provider_status_is_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &server.base_url).await;
    let resp = client
        .post(format!("{}/webhooks/payments", server.base_url))
        .json(&json!({
            "event_id": "evt-2",
            "order_id": created["id"],
            "payment_status": "teleported"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn illegal_transition_is_unprocessable() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &server.base_url).await;
    let id = created["id"].as_str().unwrap();

    // Straight from awaiting payment to delivered.
    let resp = client
        .post(format!("{}/orders/{id}/status", server.base_url))
        .json(&json!({ "status": "Entregue" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn cancel_requires_a_reason() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &server.base_url).await;
    let id = created["id"].as_str().unwrap();

    let resp = client
        .post(format!("{}/orders/{id}/cancel", server.base_url))
        .json(&json!({ "reason": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{}/orders/{id}/cancel", server.base_url))
        .json(&json!({ "reason": "cliente desistiu" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "Cancelado");
    assert_eq!(body["cancel_reason"], "cliente desistiu");
}

#[tokio::test]
async fn full_refund_after_capture() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &server.base_url).await;
    let id = created["id"].as_str().unwrap();
    approve(&client, &server.base_url, id).await;

    let resp = client
        .post(format!("{}/orders/{id}/refund", server.base_url))
        .json(&json!({ "reason_code": "product_defect" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "Devolvido");
    assert_eq!(body["refund_amount_cents"], 4100);
    assert_eq!(body["refunds"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn partial_refund_caps_at_the_purchased_quantity() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &server.base_url).await;
    let id = created["id"].as_str().unwrap();
    approve(&client, &server.base_url, id).await;

    let line = &created["items"][0];
    let item = |quantity: u32| {
        json!({
            "order_item_id": line["id"],
            "product_id": line["product_id"],
            "product_name": line["product_name"],
            "quantity": quantity
        })
    };

    let resp = client
        .post(format!("{}/orders/{id}/refund/partial", server.base_url))
        .json(&json!({ "items": [item(1)] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "Parcialmente devolvido");
    assert_eq!(body["refund_amount_cents"], 2050);

    // Two more units would exceed what is left of that line.
    let resp = client
        .post(format!("{}/orders/{id}/refund/partial", server.base_url))
        .json(&json!({ "items": [item(2)] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!(
            "{}/orders/{}",
            server.base_url,
            Uuid::now_v7()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
