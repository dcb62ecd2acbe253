//! Storage layer: expiring challenge/session stores and the SQLite task store.
//!
//! Challenges and sessions live behind the [`ChallengeStore`] and
//! [`SessionStore`] traits so the auth core runs unchanged against Redis
//! ([`RedisStore`]) or the in-process [`MemoryStore`]. Tasks and users are
//! relational and live in [`db::Database`].

pub mod db;
pub mod memory;
pub mod redis_store;
pub mod tasks;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::auth::address::Address;
use crate::models::{Challenge, StoredSession};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Stored record could not be decoded: {0}")]
    Codec(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(format!("Redis error: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

/// Keyed storage of pending challenges, one per address.
///
/// Every method is atomic for its key. `delete_if_nonce` is the
/// compare-and-delete used to consume a challenge: it removes the entry only
/// if it still holds the given nonce, so a challenge re-issued in the
/// meantime survives.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Insert or replace the challenge for `address`.
    async fn put(&self, address: &Address, challenge: &Challenge) -> Result<(), StoreError>;

    async fn get(&self, address: &Address) -> Result<Option<Challenge>, StoreError>;

    /// Remove the challenge for `address`. Removing nothing is not an error.
    async fn delete(&self, address: &Address) -> Result<(), StoreError>;

    /// Remove the challenge only if its nonce matches. Returns whether it was removed.
    async fn delete_if_nonce(&self, address: &Address, nonce: &str) -> Result<bool, StoreError>;
}

/// Bearer session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_session(&self, session: &StoredSession, ttl: Duration) -> Result<(), StoreError>;

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, StoreError>;

    /// Returns true if the session existed.
    async fn delete_session(&self, token: &str) -> Result<bool, StoreError>;
}

/// Run a store operation with an upper bound on its duration.
pub async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

/// Whole seconds (rounded up, at least 1) for backends that take integer TTLs.
pub(crate) fn ttl_secs(ttl: chrono::Duration) -> u64 {
    let millis = ttl.num_milliseconds().max(1) as u64;
    millis.div_ceil(1000)
}
