//! Passkey authentication handlers.
//!
//! Implements the two-phase passkey authentication ceremony:
//! 1. `generate_authentication_options` - issue a challenge scoped to the user's credentials
//! 2. `verify_authentication` - verify the assertion and advance the signature counter

use crate::app_state::AppState;
use crate::challenge::{self, PendingCeremony};
use crate::domain::PasskeyRecord;
use crate::error::CeremonyError;
use axum::{extract::State, Json};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webauthn_rs::prelude::*;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AuthenticationOptionsRequest {
    //
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    //
    pub verified: bool,
}

// ============================================================================
// Options Handler
// ============================================================================

/// POST /passkeys/generate-authentication-options
///
/// Issues an authentication challenge scoped to the user's own registered
/// credentials - the allow-list is never a global credential pool. The
/// pending state is parked in Redis with a TTL, overwriting any ceremony the
/// user still had in flight.
///
/// A user with no usable credentials is rejected up front: the verification
/// library refuses an empty allow-list, and a ceremony that cannot succeed
/// is not worth issuing.
pub async fn generate_authentication_options(
    State(state): State<AppState>,
    Json(req): Json<AuthenticationOptionsRequest>,
) -> Result<Json<RequestChallengeResponse>, CeremonyError> {
    //
    if req.user_id.trim().is_empty() {
        return Err(CeremonyError::Validation(
            "userID must be non-empty".to_string(),
        ));
    }

    let user = state
        .repository()
        .get_user(&req.user_id)
        .await?
        .ok_or_else(|| {
            //
            tracing::warn!("Authentication options requested for unknown user");
            CeremonyError::Validation("no passkeys registered for this user".to_string())
        })?;

    let records = state.repository().passkeys_for_user(&user.id).await?;

    // Stored as base64 text; an undecodable record is skipped, not fatal
    let passkeys: Vec<Passkey> = records
        .iter()
        .filter_map(|record| {
            //
            decode_passkey(record)
                .map_err(|e| {
                    //
                    tracing::error!(
                        "Failed to decode passkey {}: {e}",
                        hex::encode(&record.credential_id)
                    );
                })
                .ok()
        })
        .collect();

    if passkeys.is_empty() {
        //
        tracing::warn!("User '{}' has no usable passkeys", user.id);
        return Err(CeremonyError::Validation(
            "no passkeys registered for this user".to_string(),
        ));
    }

    let (options, auth_state) = state
        .webauthn()
        .start_passkey_authentication(&passkeys)
        .map_err(|e| {
            //
            tracing::error!("Failed to start authentication: {e}");
            CeremonyError::Store(anyhow::anyhow!("failed to start authentication: {e}"))
        })?;

    let mut conn = state.get_conn().await?;
    challenge::store_pending(
        &mut conn,
        &user.id,
        &PendingCeremony::Authentication(auth_state),
        state.challenge_ttl(),
    )
    .await?;

    tracing::info!("Authentication options issued for user: {}", user.id);

    Ok(Json(options))
}

// ============================================================================
// Verification Handler
// ============================================================================

/// POST /passkeys/verify-authentication
///
/// Completes passkey authentication. The server does not know which user is
/// signing in until the authenticator echoes back the handle it was given at
/// registration, so resolution order is: user from `response.userHandle`,
/// pending challenge, asserted credential within that user's set (404 when
/// absent), then cryptographic verification and the counter check.
///
/// The pending challenge is consumed by this attempt whether verification
/// succeeds or not.
pub async fn verify_authentication(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<VerifyResponse>, CeremonyError> {
    //
    let credential: PublicKeyCredential = serde_json::from_value(body)
        .map_err(|e| CeremonyError::Validation(format!("malformed assertion: {e}")))?;

    let handle_bytes = credential
        .response
        .user_handle
        .as_ref()
        .map(|handle| handle.to_vec())
        .ok_or_else(|| CeremonyError::Validation("response.userHandle is required".to_string()))?;
    let handle = Uuid::from_slice(&handle_bytes)
        .map_err(|_| CeremonyError::Validation("malformed user handle".to_string()))?;

    let user = state
        .repository()
        .get_user_by_handle(handle)
        .await?
        .ok_or(CeremonyError::ChallengeMissing)?;

    let mut conn = state.get_conn().await?;

    // Consumed here, before verification: the challenge is spent by this
    // attempt regardless of its outcome.
    let auth_state = match challenge::take_pending(&mut conn, &user.id).await? {
        Some(PendingCeremony::Authentication(s)) => s,
        Some(PendingCeremony::Registration(_)) => return Err(CeremonyError::ChallengeMismatch),
        None => return Err(CeremonyError::ChallengeMissing),
    };

    // The asserted credential must exist in this user's set (404 contract)
    let asserted_id = credential.raw_id.to_vec();
    let stored = state
        .repository()
        .find_passkey(&user.id, &asserted_id)
        .await?
        .ok_or_else(|| {
            //
            tracing::warn!(
                "Credential {} not found for user '{}'",
                hex::encode(&asserted_id),
                user.id
            );
            CeremonyError::CredentialNotFound
        })?;

    let result = state
        .webauthn()
        .finish_passkey_authentication(&credential, &auth_state)
        .map_err(|e| {
            //
            tracing::warn!(
                "Authentication verification failed for user '{}': {e}",
                user.id
            );
            CeremonyError::from_webauthn(e)
        })?;

    let asserted = result.counter();
    ensure_counter_advances(stored.counter, asserted)?;

    if i64::from(asserted) > stored.counter {
        state
            .repository()
            .update_counter(&user.id, &stored.credential_id, i64::from(asserted))
            .await?;
    }

    state.metrics().record_authentication_verified();
    tracing::info!(
        "User '{}' authenticated with credential {}",
        user.id,
        hex::encode(&stored.credential_id)
    );

    Ok(Json(VerifyResponse { verified: true }))
}

// ============================================================================
// Helpers
// ============================================================================

fn decode_passkey(record: &PasskeyRecord) -> anyhow::Result<Passkey> {
    // ---
    let bytes = base64::engine::general_purpose::STANDARD.decode(&record.public_key)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Counter policy: once either side reports a non-zero counter, each
/// assertion must advance it; a stalled or regressed counter is a cloned
/// authenticator signal and the record is left untouched. Authenticators
/// that never implement a counter report zero on both sides and pass.
fn ensure_counter_advances(stored: i64, asserted: u32) -> Result<(), CeremonyError> {
    // ---
    if (stored != 0 || asserted != 0) && i64::from(asserted) <= stored {
        return Err(CeremonyError::CounterRegression { stored, asserted });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
