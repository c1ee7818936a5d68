//! Conversation Store
//!
//! Key-value state shared by every reply job: bounded history lists, owner and
//! automation activity stamps, the target roster and a few operator switches.
//!
//! Every operation is individually atomic. Multi-step sequences (read a stamp,
//! then act on it) are deliberately not transactional.
//!
//! Backends:
//! - [`RedisStore`]: production, shared across processes
//! - [`MemoryStore`]: in-process, used when no Redis URL is configured and in tests

pub mod keys;
pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Wrong value type at key {0}")]
    WrongType(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal key-value surface the engine depends on
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Read a string value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrite a string value, optionally expiring after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Remove a key of any type
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Append to the tail of a list, creating it if needed
    async fn list_append(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Keep only `[start, stop]` (inclusive, negative indices count from the end)
    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> StoreResult<()>;

    /// Whole list in append order
    async fn list_range(&self, key: &str) -> StoreResult<Vec<String>>;

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Returns true if the member was newly added
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns true if the member was present
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;
}

/// Read a Unix timestamp; unreadable or unparsable values count as "no signal"
pub async fn read_timestamp(store: &dyn ConversationStore, key: &str) -> Option<i64> {
    match store.get(key).await {
        Ok(Some(raw)) => raw.trim().parse().ok(),
        Ok(None) => None,
        Err(e) => {
            warn!("Store read failed for {}: {}", key, e);
            None
        }
    }
}

/// Write a Unix timestamp, logging failures
pub async fn write_timestamp(
    store: &dyn ConversationStore,
    key: &str,
    value: i64,
    ttl: Option<Duration>,
) {
    if let Err(e) = store.set(key, &value.to_string(), ttl).await {
        warn!("Store write failed for {}: {}", key, e);
    }
}
