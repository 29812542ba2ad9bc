//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers via the `State` extractor. The `AppState` contains shared
//! resources like the Redis client, the credential repository, the metrics
//! implementation, and the WebAuthn instance.
//!
//! The state is designed to be cheaply cloneable (using `Arc` internally
//! where needed) so it can be passed efficiently to each request handler
//! without expensive copying of resources.

use crate::domain::{MetricsPtr, RepositoryPtr};
use crate::error::CeremonyError;
use redis::Client;
use std::sync::Arc;
use std::time::Duration;
use webauthn_rs::Webauthn;

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the Dependency Injection container for the
/// application. It is built once at startup and cloned cheaply for each
/// request via Axum's `State` extractor; handlers depend on the
/// `Repository`/`Metrics` abstractions, not on concrete backends.
///
/// # Fields
///
/// - `redis_client`: Client for creating ephemeral Redis connections (pending ceremonies)
/// - `metrics`: Metrics implementation for observability (Prometheus or no-op)
/// - `repository`: Store abstraction for persistent data (users, credentials)
/// - `webauthn`: WebAuthn protocol handler for the ceremony cryptography
/// - `challenge_ttl`: Time-to-live for pending ceremonies stored in Redis
#[derive(Clone)]
pub(crate) struct AppState {
    /// Redis client for creating multiplexed async connections on demand.
    ///
    /// Used for the ephemeral per-user pending ceremony. Handlers call
    /// `get_conn()` to obtain a connection for each request.
    redis_client: Client,

    /// Metrics implementation for recording ceremony events.
    metrics: MetricsPtr,

    /// Repository abstraction for persistent storage.
    ///
    /// Provides access to users and credentials via the `Repository` trait.
    /// Backed by PostgreSQL with SQLx connection pooling.
    repository: RepositoryPtr,

    /// WebAuthn protocol handler.
    ///
    /// Configured with the relying party identity derived from the public
    /// URL. Wrapped in `Arc` because `Webauthn` does not implement `Clone`.
    webauthn: Arc<Webauthn>,

    /// Time-to-live for pending ceremonies in Redis.
    ///
    /// Unconsumed challenges expire after this duration. Typically 5 minutes.
    challenge_ttl: Duration,
}

impl AppState {
    // ---

    pub fn new(
        redis_client: Client,
        metrics: MetricsPtr,
        repository: RepositoryPtr,
        webauthn: Arc<Webauthn>,
        challenge_ttl: Duration,
    ) -> Self {
        // ---
        AppState {
            redis_client,
            metrics,
            repository,
            webauthn,
            challenge_ttl,
        }
    }

    /// Creates a new multiplexed Redis connection.
    ///
    /// Logs an error if connection fails and surfaces it as a store failure.
    pub(crate) async fn get_conn(
        &self,
    ) -> Result<redis::aio::MultiplexedConnection, CeremonyError> {
        // ---
        self.redis_client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| {
                tracing::error!("Failed to connect to Redis: {:?}", err);
                CeremonyError::Store(err.into())
            })
    }

    /// Get a reference to the metrics implementation.
    pub(crate) fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the repository implementation.
    pub(crate) fn repository(&self) -> &RepositoryPtr {
        // ---
        &self.repository
    }

    /// Get a reference to the WebAuthn instance.
    pub(crate) fn webauthn(&self) -> &Webauthn {
        // ---
        &self.webauthn
    }

    /// Get the pending ceremony TTL.
    pub(crate) fn challenge_ttl(&self) -> Duration {
        // ---
        self.challenge_ttl
    }
}
