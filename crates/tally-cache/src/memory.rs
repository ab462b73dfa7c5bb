//! In-process cache with passive expiry.
//!
//! Expired entries are not swept on a timer. A read that finds one reports a
//! miss and hands the removal to [`spawn_advisory_delete`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{spawn_advisory_delete, Cache, Result};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Shared in-memory cache. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        tracing::debug!(key, "cache entry expired");
        spawn_advisory_delete(self.clone(), key.to_string());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set("a", vec![1, 2, 3], None).await.expect("set");
        assert_eq!(cache.get("a").await.expect("get"), Some(vec![1, 2, 3]));
        assert!(cache.exists("a").await.expect("exists"));

        cache.delete("a").await.expect("delete");
        assert_eq!(cache.get("a").await.expect("get"), None);
        assert!(!cache.exists("a").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache.set("a", vec![9], None).await.expect("set");
        assert_eq!(other.get("a").await.expect("get"), Some(vec![9]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("a", vec![1], Some(Duration::from_secs(60)))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.exists("a").await.expect("exists"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.exists("a").await.expect("exists"));
        assert_eq!(cache.get("a").await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_evicts_in_background() {
        let cache = MemoryCache::new();
        cache
            .set("a", vec![1], Some(Duration::from_secs(1)))
            .await
            .expect("set");
        cache.set("b", vec![2], None).await.expect("set");
        tokio::time::advance(Duration::from_secs(2)).await;

        // Expired but not yet removed.
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await.expect("get"), None);

        for _ in 0..10 {
            if cache.len().await == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("b").await.expect("get"), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("a", vec![1], Some(Duration::from_millis(1)))
            .await
            .expect("set");
        cache.set("a", vec![2], None).await.expect("overwrite");
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("a").await.expect("get"), Some(vec![2]));
    }
}
