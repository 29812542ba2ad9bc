//! Pending ceremony (challenge) storage.
//!
//! Each user has at most one live challenge at a time, held under a single
//! Redis key together with the rest of the serialized ceremony state the
//! verification library needs at finish time. Starting any new ceremony
//! overwrites the previous entry, implicitly invalidating it; verification
//! consumes the entry atomically (GETDEL) so a challenge can never be
//! answered twice, whether the attempt succeeds or fails. Entries carry a
//! TTL so abandoned ceremonies age out on their own.

use crate::error::CeremonyError;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use webauthn_rs::prelude::{PasskeyAuthentication, PasskeyRegistration};

// ---

/// Serialized state of the ceremony a user currently has in flight.
///
/// Registration and authentication share one slot per user: the ceremony
/// kinds invalidate each other, exactly like a single challenge field on the
/// user's record would.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum PendingCeremony {
    //
    Registration(PasskeyRegistration),
    Authentication(PasskeyAuthentication),
}

// ---

fn challenge_key(user_id: &str) -> String {
    // ---
    format!("passkey:challenge:{user_id}")
}

/// Persists a pending ceremony for the user, overwriting any prior one.
pub(crate) async fn store_pending(
    conn: &mut MultiplexedConnection,
    user_id: &str,
    pending: &PendingCeremony,
    ttl: Duration,
) -> Result<(), CeremonyError> {
    //
    let bytes = serde_json::to_vec(pending)
        .map_err(|e| CeremonyError::Store(anyhow::anyhow!("serialize ceremony state: {e}")))?;

    conn.set_ex::<_, _, ()>(challenge_key(user_id), bytes, ttl.as_secs())
        .await
        .map_err(|e| {
            //
            tracing::error!("Failed to store pending ceremony: {e}");
            CeremonyError::Store(e.into())
        })?;

    Ok(())
}

/// Atomically retrieves and clears the user's pending ceremony.
///
/// A challenge must be consumed, not fetched then deleted later; GETDEL makes
/// the read and the clear one operation, so every verification attempt uses
/// up the challenge regardless of its outcome.
pub(crate) async fn take_pending(
    conn: &mut MultiplexedConnection,
    user_id: &str,
) -> Result<Option<PendingCeremony>, CeremonyError> {
    //
    let bytes: Option<Vec<u8>> = conn.get_del(challenge_key(user_id)).await.map_err(|e| {
        //
        tracing::error!("Failed to consume pending ceremony: {e}");
        CeremonyError::Store(e.into())
    })?;

    match bytes {
        None => Ok(None),
        Some(bytes) => {
            //
            let pending = serde_json::from_slice(&bytes).map_err(|e| {
                CeremonyError::Store(anyhow::anyhow!("deserialize ceremony state: {e}"))
            })?;
            Ok(Some(pending))
        }
    }
}
