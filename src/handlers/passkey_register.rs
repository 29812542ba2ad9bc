//! Passkey registration handlers.
//!
//! Implements the two-phase passkey registration ceremony:
//! 1. `generate_registration_options` - build the exclusion list, issue a challenge
//! 2. `verify_registration` - verify the attestation and persist the credential

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
pub struct RegistrationOptionsRequest {
    // ---
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    // ---
    pub verified: bool,
}

// ============================================================================
// Options Handler
// ============================================================================

/// POST /passkeys/generate-registration-options
///
/// Initiates passkey registration for an identity-provider user. Builds the
/// exclusion list from the user's already-registered credentials (so an
/// authenticator cannot be enrolled twice), starts the ceremony, and parks
/// the pending state in Redis with a TTL, overwriting any ceremony the user
/// still had in flight.
///
/// # Request Body
/// ```json
/// { "userID": "abc123", "username": "user@example.com" }
/// ```
///
/// # Response
/// Returns WebAuthn credential creation options containing the challenge.
/// The client passes these options to `navigator.credentials.create()`.
pub async fn generate_registration_options(
    State(state): State<AppState>,
    Json(req): Json<RegistrationOptionsRequest>,
) -> Result<Json<CreationChallengeResponse>, CeremonyError> {
    // ---

    if req.user_id.trim().is_empty() || req.username.trim().is_empty() {
        return Err(CeremonyError::Validation(
            "userID and username must be non-empty".to_string(),
        ));
    }

    // Create or get the user record; the identity provider owns the id, we
    // only mirror it.
    let user = match state.repository().get_user(&req.user_id).await? {
        Some(u) => u,
        None => state.repository().create_user(&req.user_id).await?,
    };

    // Previously registered authenticators go on the exclusion list
    let existing = state.repository().passkeys_for_user(&user.id).await?;
    let exclude: Vec<CredentialID> = existing
        .iter()
        .map(|c| CredentialID::from(c.credential_id.clone()))
        .collect();
    let exclude = (!exclude.is_empty()).then_some(exclude);

    let (options, reg_state) = state
        .webauthn()
        .start_passkey_registration(user.handle, &req.username, &req.username, exclude)
        .map_err(|e| {
            tracing::error!("Failed to start registration: {e}");
            CeremonyError::Store(anyhow::anyhow!("failed to start registration: {e}"))
        })?;

    let mut conn = state.get_conn().await?;
    challenge::store_pending(
        &mut conn,
        &user.id,
        &PendingCeremony::Registration(reg_state),
        state.challenge_ttl(),
    )
    .await?;

    tracing::info!("Registration options issued for user: {}", user.id);

    Ok(Json(options))
}

// ============================================================================
// Verification Handler
// ============================================================================

/// POST /passkeys/verify-registration
///
/// Completes passkey registration by verifying the attestation produced by
/// the authenticator and persisting the new credential.
///
/// The owning user is resolved from `response.userHandle`, which the client
/// echoes alongside the credential. The pending challenge is consumed by this
/// attempt whether verification succeeds or not, so a failed ceremony has to
/// restart from options generation.
///
/// # Response
/// `{"verified": true}` on success; 400 with `{"error": ...}` detail when the
/// challenge, origin, relying party, or attestation does not check out.
pub async fn verify_registration(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<VerifyResponse>, CeremonyError> {
    // ---

    let user_id = body
        .pointer("/response/userHandle")
        .and_then(Value::as_str)
        .ok_or_else(|| CeremonyError::Validation("response.userHandle is required".to_string()))?
        .to_string();

    let credential: RegisterPublicKeyCredential = serde_json::from_value(body)
        .map_err(|e| CeremonyError::Validation(format!("malformed ceremony result: {e}")))?;

    let user = state
        .repository()
        .get_user(&user_id)
        .await?
        .ok_or(CeremonyError::ChallengeMissing)?;

    let mut conn = state.get_conn().await?;

    // Consumed here, before verification: the challenge is spent by this
    // attempt regardless of its outcome.
    let reg_state = match challenge::take_pending(&mut conn, &user.id).await? {
        Some(PendingCeremony::Registration(s)) => s,
        Some(PendingCeremony::Authentication(_)) => return Err(CeremonyError::ChallengeMismatch),
        None => return Err(CeremonyError::ChallengeMissing),
    };

    let passkey = state
        .webauthn()
        .finish_passkey_registration(&credential, &reg_state)
        .map_err(|e| {
            tracing::warn!("Registration verification failed for user '{}': {e}", user.id);
            CeremonyError::from_webauthn(e)
        })?;

    let record = passkey_record(&user.id, &passkey)?;
    let cred_id_hex = hex::encode(&record.credential_id);

    // The exclusion list normally prevents this, but the client controls
    // what it sends back.
    let already_registered = state
        .repository()
        .find_passkey(&user.id, &record.credential_id)
        .await?
        .is_some();
    if already_registered {
        return Err(CeremonyError::SignatureInvalid(
            "credential already registered".to_string(),
        ));
    }

    state.repository().save_passkey(record).await?;

    state.metrics().record_registration_verified();
    tracing::info!(
        "Registration completed for user: {} (credential: {})",
        user.id,
        cred_id_hex
    );

    Ok(Json(VerifyResponse { verified: true }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Flattens a verified passkey into the persisted credential layout: the
/// serialized key material as base64 text plus the metadata fields the
/// authentication ceremony and the dashboard read back.
fn passkey_record(user_id: &str, passkey: &Passkey) -> Result<PasskeyRecord, CeremonyError> {
    // ---
    let serialized = serde_json::to_vec(passkey)
        .map_err(|e| CeremonyError::Store(anyhow::anyhow!("serialize passkey: {e}")))?;

    let internals: Credential = passkey.clone().into();

    // Transport hints keep their wire names ("usb", "nfc", "internal", ...)
    let transports: Vec<String> = internals
        .transports
        .as_ref()
        .and_then(|ts| serde_json::to_value(ts).ok())
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    // Backup-eligible credentials sync across devices.
    let device_type = if internals.backup_eligible {
        "multiDevice"
    } else {
        "singleDevice"
    };

    Ok(PasskeyRecord {
        credential_id: passkey.cred_id().to_vec(),
        user_id: user_id.to_string(),
        public_key: base64::engine::general_purpose::STANDARD.encode(&serialized),
        counter: i64::from(internals.counter),
        transports,
        device_type: device_type.to_string(),
        backed_up: internals.backup_state,
        created_at: chrono::Utc::now(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn options_request_uses_wire_field_names() {
        // ---
        let req: RegistrationOptionsRequest = serde_json::from_value(serde_json::json!({
            "userID": "abc123",
            "username": "u1@example.com"
        }))
        .unwrap();

        assert_eq!(req.user_id, "abc123");
        assert_eq!(req.username, "u1@example.com");
    }

    #[test]
    fn options_request_rejects_missing_fields() {
        // ---
        let result: Result<RegistrationOptionsRequest, _> =
            serde_json::from_value(serde_json::json!({ "username": "u1@example.com" }));
        assert!(result.is_err());
    }

    #[test]
    fn verify_response_shape() {
        // ---
        let body = serde_json::to_value(VerifyResponse { verified: true }).unwrap();
        assert_eq!(body, serde_json::json!({ "verified": true }));
    }

    #[test]
    fn user_handle_is_read_from_the_response_object() {
        // ---
        let body = serde_json::json!({
            "id": "abc",
            "response": { "userHandle": "user-1" }
        });

        assert_eq!(
            body.pointer("/response/userHandle").and_then(|v| v.as_str()),
            Some("user-1")
        );
    }
}
