//! In-memory TTL cache for tests/dev and single-process deployments.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CacheError, RevocationCache};

#[derive(Debug, Default)]
pub struct InMemoryRevocationCache {
    inner: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryRevocationCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationCache for InMemoryRevocationCache {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let deadline = Instant::now() + Duration::from_secs(ttl_secs);
        let mut map = self
            .inner
            .write()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;
        map.insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        // lazily evict on read; no background sweeper needed at this scale
        let mut map = self
            .inner
            .write()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;
        match map.get(key) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                map.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let cache = InMemoryRevocationCache::new();
        cache.put("k", "1", 60).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("1".to_string()));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zero_ttl_entry_expires_immediately() {
        let cache = InMemoryRevocationCache::new();
        cache.put("k", "1", 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
