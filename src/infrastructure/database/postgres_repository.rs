use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{PasskeyRecord, Repository, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    handle: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PasskeyRow {
    credential_id: Vec<u8>,
    user_id: String,
    public_key: String,
    counter: i64,
    transports: Vec<String>,
    device_type: String,
    backed_up: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    // ---
    fn from(r: UserRow) -> Self {
        // ---
        User {
            id: r.id,
            handle: r.handle,
            created_at: r.created_at,
        }
    }
}

impl From<PasskeyRow> for PasskeyRecord {
    // ---
    fn from(r: PasskeyRow) -> Self {
        // ---
        PasskeyRecord {
            credential_id: r.credential_id,
            user_id: r.user_id,
            public_key: r.public_key,
            counter: r.counter,
            transports: r.transports,
            device_type: r.device_type,
            backed_up: r.backed_up,
            created_at: r.created_at,
        }
    }
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    // ---
    async fn create_user(&self, user_id: &str) -> Result<User> {
        // ---
        let user = User::new(user_id.to_string());

        sqlx::query("INSERT INTO passkey_users (id, handle, created_at) VALUES ($1, $2, $3)")
            .bind(&user.id)
            .bind(user.handle)
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;

        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, handle, created_at FROM passkey_users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_user_by_handle(&self, handle: Uuid) -> Result<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, handle, created_at FROM passkey_users WHERE handle = $1",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn save_passkey(&self, record: PasskeyRecord) -> Result<()> {
        // ---
        sqlx::query(
            "INSERT INTO passkey_credentials
                 (user_id, credential_id, public_key, counter, transports,
                  device_type, backed_up, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.user_id)
        .bind(&record.credential_id)
        .bind(&record.public_key)
        .bind(record.counter)
        .bind(&record.transports)
        .bind(&record.device_type)
        .bind(record.backed_up)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn passkeys_for_user(&self, user_id: &str) -> Result<Vec<PasskeyRecord>> {
        // ---
        let rows = sqlx::query_as::<_, PasskeyRow>(
            "SELECT user_id, credential_id, public_key, counter, transports,
                    device_type, backed_up, created_at
             FROM passkey_credentials WHERE user_id = $1
             ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PasskeyRecord::from).collect())
    }

    async fn find_passkey(
        &self,
        user_id: &str,
        credential_id: &[u8],
    ) -> Result<Option<PasskeyRecord>> {
        // ---
        let row = sqlx::query_as::<_, PasskeyRow>(
            "SELECT user_id, credential_id, public_key, counter, transports,
                    device_type, backed_up, created_at
             FROM passkey_credentials WHERE user_id = $1 AND credential_id = $2",
        )
        .bind(user_id)
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PasskeyRecord::from))
    }

    async fn update_counter(
        &self,
        user_id: &str,
        credential_id: &[u8],
        counter: i64,
    ) -> Result<()> {
        // ---
        sqlx::query(
            "UPDATE passkey_credentials SET counter = $1
             WHERE user_id = $2 AND credential_id = $3",
        )
        .bind(counter)
        .bind(user_id)
        .bind(credential_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
