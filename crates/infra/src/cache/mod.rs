//! Revocation cache: fast key→blob lookup with TTL.
//!
//! The cache is advisory. Misses, errors, and absence all degrade to a
//! direct revoked-flag query against the token store; a cache problem must
//! never fail a request, and must never fail it open.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use warden_auth::codec::signed::SignedCodec;
use warden_auth::TokenKind;

pub use in_memory::InMemoryRevocationCache;
#[cfg(feature = "redis")]
pub use redis::RedisRevocationCache;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// TTL'd key/value cache with atomic per-key operations.
#[async_trait]
pub trait RevocationCache: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
}

#[async_trait]
impl<C> RevocationCache for std::sync::Arc<C>
where
    C: RevocationCache + ?Sized,
{
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        (**self).put(key, value, ttl_secs).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key).await
    }
}

/// Deterministic cache key for a token value.
///
/// Signed tokens key on the signature segment (every outstanding copy of the
/// value shares it); opaque tokens key on the full value.
pub fn revocation_key(kind: TokenKind, token: &str) -> String {
    let suffix = match kind {
        TokenKind::Signed => SignedCodec::signature_segment(token).unwrap_or(token),
        TokenKind::Opaque => token,
    };
    format!("revoked:{}:{}", kind.as_str(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_key_uses_signature_segment() {
        let key = revocation_key(TokenKind::Signed, "aaa.bbb.ccc");
        assert_eq!(key, "revoked:signed:ccc");
    }

    #[test]
    fn opaque_key_uses_full_value() {
        let key = revocation_key(TokenKind::Opaque, "q3Zx09Aa11BbCc22DdEe33FfGg44Hh");
        assert_eq!(key, "revoked:opaque:q3Zx09Aa11BbCc22DdEe33FfGg44Hh");
    }
}
