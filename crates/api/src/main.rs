use loja_api::app::{self, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    loja_observability::init();

    let base_url = std::env::var("STORE_BASE_URL").unwrap_or_else(|_| {
        tracing::warn!("STORE_BASE_URL not set; using dev default");
        "http://localhost:3000".to_string()
    });
    let database_url = std::env::var("DATABASE_URL").ok();
    if database_url.is_none() {
        tracing::warn!("DATABASE_URL not set; using the in-memory store");
    }

    let config = AppConfig {
        base_url,
        database_url,
    };
    let app = app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
