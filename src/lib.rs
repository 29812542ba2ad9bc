// src/lib.rs
use anyhow::Result;
use app_state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

use handlers::health_check;
use handlers::metrics_handler;
use handlers::root_handler;
use redis::Client;
use std::env;

// Public exports (visible outside this module)
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod challenge;
mod config;
mod error;
mod handlers;
mod infrastructure;

pub use config::*;
pub use error::CeremonyError;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_noop_metrics, // ---
    create_postgres_repository,
    create_prom_metrics,
    create_webauthn,
    init_database_with_retry,
    init_database_with_retry_from_env,
};

/// Build the HTTP router with metrics implementation determined by environment variables.
pub async fn create_router() -> Result<Router> {
    // ---
    // Load all configuration from environment
    let config = AppConfig::from_env()?;

    // Determine metrics implementation from environment
    let metrics_type = env::var("PASSKEY_METRICS_TYPE").unwrap_or_else(|_| "noop".to_string());
    let metrics = if metrics_type == "prom" {
        create_prom_metrics()?
    } else {
        create_noop_metrics()?
    };

    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    // Create infrastructure dependencies
    let redis_client = Client::open(config.redis.url.clone())?;
    init_database_with_retry(&config.database).await?;
    let repository = create_postgres_repository()?;
    let webauthn = std::sync::Arc::new(create_webauthn(&config.relying_party)?);

    // Build application state with all dependencies
    let app_state = AppState::new(
        redis_client,
        metrics,
        repository,
        webauthn,
        config.redis.challenge_ttl,
    );

    // Ceremony routes are POST-only; other methods get 405 from the router.
    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest(
            "/passkeys",
            Router::new()
                .route(
                    "/generate-registration-options",
                    post(handlers::generate_registration_options),
                )
                .route(
                    "/verify-registration",
                    post(handlers::verify_registration),
                )
                .route(
                    "/generate-authentication-options",
                    post(handlers::generate_authentication_options),
                )
                .route(
                    "/verify-authentication",
                    post(handlers::verify_authentication),
                ),
        )
        .with_state(app_state);

    Ok(router)
}
