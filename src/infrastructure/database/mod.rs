//! Postgres-backed persistence.
//!
//! The connection pool is process-wide state, lazily constructed on first
//! use behind a `OnceCell`: repeated initialization calls are no-ops, so the
//! handlers, the binary, and every test can all call the initializer without
//! coordinating. Schema bootstrap is idempotent for the same reason.

mod postgres_repository;


use crate::config::DatabaseConfig;
use crate::domain::RepositoryPtr;
use anyhow::{anyhow, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use postgres_repository::PostgresRepository;

// ---

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Initializes the shared connection pool, retrying until the database
/// accepts connections (it may still be starting up alongside us).
///
/// Idempotent: after the first success, further calls return immediately.
pub async fn init_database_with_retry(config: &DatabaseConfig) -> Result<()> {
    // ---
    POOL.get_or_try_init(|| async {
        //
        let mut attempts = 0u32;
        let pool = loop {
            //
            let connected = PgPoolOptions::new()
                .min_connections(config.min_connections)
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect(&config.database_url)
                .await;

            match connected {
                Ok(pool) => break pool,
                Err(err) if attempts < config.retry_count => {
                    //
                    attempts += 1;
                    tracing::warn!(
                        "Database not ready (attempt {attempts}/{}): {err}",
                        config.retry_count
                    );
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(err) => return Err(anyhow::Error::from(err)),
            }
        };

        bootstrap_schema(&pool).await?;
        tracing::info!("Database initialized");

        Ok(pool)
    })
    .await?;

    Ok(())
}

/// Convenience wrapper reading [`DatabaseConfig`] from the environment.
pub async fn init_database_with_retry_from_env() -> Result<()> {
    // ---
    init_database_with_retry(&DatabaseConfig::from_env()?).await
}

async fn bootstrap_schema(pool: &PgPool) -> Result<()> {
    // ---
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS passkey_users (
             id         TEXT PRIMARY KEY,
             handle     UUID NOT NULL UNIQUE,
             created_at TIMESTAMPTZ NOT NULL
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS passkey_credentials (
             user_id       TEXT NOT NULL REFERENCES passkey_users (id),
             credential_id BYTEA NOT NULL,
             public_key    TEXT NOT NULL,
             counter       BIGINT NOT NULL DEFAULT 0,
             transports    TEXT[] NOT NULL DEFAULT '{}',
             device_type   TEXT NOT NULL,
             backed_up     BOOLEAN NOT NULL,
             created_at    TIMESTAMPTZ NOT NULL,
             PRIMARY KEY (user_id, credential_id)
         )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn pool() -> Result<&'static PgPool> {
    // ---
    POOL.get()
        .ok_or_else(|| anyhow!("database pool not initialized; call init_database_with_retry"))
}

/// Creates a repository over the shared, already-initialized pool.
pub fn create_postgres_repository() -> Result<RepositoryPtr> {
    // ---
    Ok(Arc::new(PostgresRepository::new(pool()?.clone())))
}
