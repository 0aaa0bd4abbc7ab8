//! Redis-backed revocation cache (optional, `redis` feature).
//!
//! Uses the synchronous client on a blocking task; SETEX gives atomic
//! put-with-TTL per key. Every call carries connect/read/write timeouts so
//! a hung Redis surfaces as `CacheError` within a bounded delay and the
//! lifecycle manager degrades to the store.

use std::time::Duration;

use async_trait::async_trait;
use redis::Commands;

use super::{CacheError, RevocationCache};

/// Bound on connecting to and talking to Redis for one operation.
const OP_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RedisRevocationCache {
    client: redis::Client,
    prefix: String,
}

impl RedisRevocationCache {
    pub fn new(redis_url: impl AsRef<str>, prefix: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            prefix: prefix.into(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

fn connect(client: &redis::Client) -> Result<redis::Connection, CacheError> {
    let conn = client
        .get_connection_with_timeout(OP_TIMEOUT)
        .map_err(|e| CacheError::Unavailable(e.to_string()))?;
    conn.set_read_timeout(Some(OP_TIMEOUT))
        .map_err(|e| CacheError::Unavailable(e.to_string()))?;
    conn.set_write_timeout(Some(OP_TIMEOUT))
        .map_err(|e| CacheError::Unavailable(e.to_string()))?;
    Ok(conn)
}

#[async_trait]
impl RevocationCache for RedisRevocationCache {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let client = self.client.clone();
        let key = self.prefixed(key);
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = connect(&client)?;
            conn.set_ex::<_, _, ()>(key, value, ttl_secs)
                .map_err(|e| CacheError::Unavailable(e.to_string()))
        })
        .await
        .map_err(|e| CacheError::Unavailable(format!("cache task failed: {e}")))?
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let client = self.client.clone();
        let key = self.prefixed(key);

        tokio::task::spawn_blocking(move || {
            let mut conn = connect(&client)?;
            conn.get::<_, Option<String>>(key)
                .map_err(|e| CacheError::Unavailable(e.to_string()))
        })
        .await
        .map_err(|e| CacheError::Unavailable(format!("cache task failed: {e}")))?
    }
}
