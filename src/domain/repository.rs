use super::passkey_models::{PasskeyRecord, User};
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Abstraction for user and credential persistence.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // ---
    /// Create a record for an identity-provider user id.
    async fn create_user(&self, user_id: &str) -> Result<User>;

    /// Get a user by identity-provider id.
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Get a user by WebAuthn handle (from an assertion's userHandle).
    async fn get_user_by_handle(&self, handle: Uuid) -> Result<Option<User>>;

    /// Save a newly registered credential.
    async fn save_passkey(&self, record: PasskeyRecord) -> Result<()>;

    /// All credentials registered by a user.
    async fn passkeys_for_user(&self, user_id: &str) -> Result<Vec<PasskeyRecord>>;

    /// A specific credential within a user's set. Lookups are always scoped
    /// to the owning user, never a global credential pool.
    async fn find_passkey(
        &self,
        user_id: &str,
        credential_id: &[u8],
    ) -> Result<Option<PasskeyRecord>>;

    /// Write back the signature counter after a successful authentication.
    /// The only mutation a credential record ever receives.
    async fn update_counter(&self, user_id: &str, credential_id: &[u8], counter: i64)
        -> Result<()>;
}

/// Type alias for any backend that implements Repository.
pub type RepositoryPtr = Arc<dyn Repository>;
