use async_trait::async_trait;

use crate::shared::DomainError;

/// Durable string key/value storage.
///
/// Each `set` is atomic for its key only. Callers that need several fields
/// to change together must store them under one key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), DomainError>;
    async fn remove(&self, key: &str) -> Result<(), DomainError>;
}
