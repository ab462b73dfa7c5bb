//! A cache that stores nothing.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Cache, Result};

/// Always misses. Used when caching is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_misses() {
        let cache = NullCache;
        cache.set("k", vec![1], None).await.expect("set");
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert!(!cache.exists("k").await.expect("exists"));
    }
}
