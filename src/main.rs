use anyhow::Result;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (if present) before reading any configuration
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber to log to stdout
    tracing_subscriber::fmt::init();
    tracing::info!(
        "Starting passkey ceremony API v{}...",
        env!("CARGO_PKG_VERSION")
    );

    // Configuration, stores, and the WebAuthn instance are wired up here;
    // startup fails fast on missing configuration or an unreachable database.
    let app = passkey_api::create_router().await?;

    // Get optional bind endpoint from environment
    let endpoint = env::var("PASSKEY_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    info!("Listening at endpoint:{}", endpoint);

    let listener = tokio::net::TcpListener::bind(&endpoint).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
