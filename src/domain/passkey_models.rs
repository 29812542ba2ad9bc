use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dashboard user as seen by this service.
///
/// The identity provider owns the `id` string; this service only mirrors it
/// as the partition key for challenges and credentials. The `handle` is the
/// 16-byte WebAuthn user id handed to authenticators at registration and
/// echoed back in assertions; it is derived deterministically from `id` so
/// concurrent record creation cannot mint two different handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    // ---
    pub id: String,
    pub handle: Uuid,
    pub created_at: DateTime<Utc>,
}

impl User {
    // ---
    pub fn new(id: String) -> Self {
        // ---
        let handle = Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes());
        Self {
            id,
            handle,
            created_at: Utc::now(),
        }
    }
}

/// One registered passkey credential owned by a user.
///
/// Created only on a successful registration verification. Immutable
/// afterward except for `counter`, which advances on each successful
/// authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasskeyRecord {
    // ---
    /// Credential id assigned by the authenticator.
    pub credential_id: Vec<u8>,

    /// Owning user identity.
    pub user_id: String,

    /// Serialized verification key material, base64 text.
    pub public_key: String,

    /// Signature counter; monotonically non-decreasing.
    pub counter: i64,

    /// Transport hints reported at registration (usb, nfc, internal, ...).
    pub transports: Vec<String>,

    /// "multiDevice" for backup-eligible (synced) credentials, else "singleDevice".
    pub device_type: String,

    /// Whether the credential was backed up at registration time.
    pub backed_up: bool,

    /// When this credential was registered.
    pub created_at: DateTime<Utc>,
}
