//! # tally-cache
//!
//! Key-value cache used as a read-through accelerator in front of user and
//! balance lookups. The cache is never authoritative: a miss, an error or a
//! disabled cache only costs latency.
//!
//! - [`Cache`]: byte-level get/set/delete/exists with optional TTL
//! - [`MemoryCache`]: in-process map with per-entry expiry
//! - [`NullCache`]: always misses
//! - [`keys`]: key scheme shared by every caller

pub mod keys;
pub mod memory;
pub mod null;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use memory::MemoryCache;
pub use null::NullCache;

/// Cache error types.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// A key-value store with optional per-entry TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`. `None` TTL never expires.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Get and decode a JSON value.
pub async fn get_json<T, C>(cache: &C, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    C: Cache + ?Sized,
{
    match cache.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and store a JSON value.
pub async fn set_json<T, C>(cache: &C, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
where
    T: Serialize + ?Sized,
    C: Cache + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    cache.set(key, bytes, ttl).await
}

/// Advisory, non-blocking delete.
///
/// Spawns the delete and returns immediately. A failure is logged at `warn`
/// and never reaches the caller.
pub fn spawn_advisory_delete<C>(cache: C, key: String)
where
    C: Cache + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = cache.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "advisory cache delete failed");
        }
    });
}
