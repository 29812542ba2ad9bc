//! Ceremony error taxonomy.
//!
//! Every failure a ceremony handler can produce is expressed as a
//! [`CeremonyError`] variant and converted into an HTTP response with a
//! `{"error": ...}` JSON body at the handler boundary. Verification failures
//! never escape to the transport layer as uncaught errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use webauthn_rs::prelude::WebauthnError;

/// Failure modes of the registration and authentication ceremonies.
#[derive(Error, Debug)]
pub enum CeremonyError {
    /// Malformed request body, rejected before any store access.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The persistence layer (Redis or Postgres) is unreachable or failed.
    #[error("store error: {0}")]
    Store(anyhow::Error),

    /// No pending challenge exists for the resolved user.
    #[error("no pending challenge for this user")]
    ChallengeMissing,

    /// A pending challenge exists but is not the one the client answered,
    /// e.g. it was overwritten by a newer ceremony.
    #[error("challenge does not match the most recently issued one")]
    ChallengeMismatch,

    /// The asserted credential id is not in the user's credential set.
    #[error("credential not found")]
    CredentialNotFound,

    /// Cryptographic verification of the attestation or assertion failed.
    #[error("verification failed: {0}")]
    SignatureInvalid(String),

    /// The asserted signature counter did not advance past the stored one.
    /// Treated as a possible cloned authenticator; the record is not updated.
    #[error("signature counter regressed: stored {stored}, asserted {asserted}")]
    CounterRegression { stored: i64, asserted: u32 },
}

impl CeremonyError {
    /// Maps a verification-library failure onto the ceremony taxonomy.
    ///
    /// A challenge echo that differs from the pending ceremony state is the
    /// one library failure callers distinguish (a concurrently restarted
    /// ceremony, not a forged signature); everything else surfaces as a
    /// verification failure with the library's cause text.
    pub(crate) fn from_webauthn(err: WebauthnError) -> Self {
        // ---
        match err {
            WebauthnError::MismatchedChallenge => CeremonyError::ChallengeMismatch,
            other => CeremonyError::SignatureInvalid(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for CeremonyError {
    fn from(err: anyhow::Error) -> Self {
        CeremonyError::Store(err)
    }
}

impl IntoResponse for CeremonyError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = match &self {
            CeremonyError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CeremonyError::Store(err) => {
                // Store internals stay in the logs, not in the response body.
                tracing::error!("Store failure: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store error".to_string(),
                )
            }
            CeremonyError::ChallengeMissing | CeremonyError::ChallengeMismatch => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            CeremonyError::CredentialNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            CeremonyError::SignatureInvalid(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            CeremonyError::CounterRegression { .. } => {
                tracing::error!("Possible cloned authenticator: {self}");
                (StatusCode::BAD_REQUEST, self.to_string())
            }
        };

        let body = Json(json!({ "error": message }));

        (status, body).into_response()
    }
}
