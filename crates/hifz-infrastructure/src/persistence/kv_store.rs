use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::persistence::ResultExt;
use hifz_domain::shared::DomainError;
use hifz_domain::storage::KeyValueStore;

/// `KeyValueStore` over the `kv_store` SQLite table. Each `set` is a single
/// upsert statement, so a value is either fully written or not at all.
pub struct SqliteKeyValueStore {
    pool: Arc<SqlitePool>,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let value: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_repo_error("Read stored value")?;

        Ok(value.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let query = r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = ?2,
                updated_at = ?3
        "#;

        sqlx::query(query)
            .bind(key)
            .bind(value)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool.as_ref())
            .await
            .map_repo_error("Write stored value")?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(self.pool.as_ref())
            .await
            .map_repo_error("Remove stored value")?;

        Ok(())
    }
}
