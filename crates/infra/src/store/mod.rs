//! Credential/token persistence contracts.
//!
//! The surrounding user-record CRUD API owns the full user schema; this layer
//! only needs identity lookup plus token-record CRUD. Both traits must be
//! safe for concurrent access: the token store's `revoke` is a compare-and-
//! swap so concurrent refresh attempts produce exactly one winner.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_auth::{TokenKind, UserIdentity};
use warden_core::{AuthError, TokenId, UserId};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Persistence failure. Maps onto the domain taxonomy at the boundary:
/// anything unreachable fails closed as `Unavailable`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A token value collided with a live row (unique constraint).
    #[error("duplicate token value")]
    DuplicateToken,

    /// A username or email collided with an existing identity.
    #[error("duplicate identity: {0}")]
    DuplicateIdentity(String),

    /// The store could not be reached or the query failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            // A collision is retried by the caller; if it escapes, the
            // request must still fail closed.
            StoreError::DuplicateToken => AuthError::unavailable("token collision not resolved"),
            StoreError::DuplicateIdentity(msg) => AuthError::unavailable(msg),
            StoreError::Unavailable(msg) => AuthError::unavailable(msg),
        }
    }
}

/// One persisted access/refresh pair.
///
/// Created at authentication or refresh; mutated only to flip `revoked`
/// false→true; physically deleted only by the out-of-band purge job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: TokenId,
    pub kind: TokenKind,
    pub access_token: String,
    pub refresh_token: String,
    pub revoked: bool,
    /// Epoch seconds.
    pub issued_at: i64,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
    pub user_id: UserId,
}

impl TokenRecord {
    pub fn expires_at(&self) -> i64 {
        self.issued_at + self.expires_in
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    /// Refresh window end: `issued_at + expires_in * multiplier`.
    pub fn refresh_expires_at(&self, refresh_multiplier: i64) -> i64 {
        self.issued_at + self.expires_in * refresh_multiplier
    }

    pub fn is_refresh_expired(&self, now: i64, refresh_multiplier: i64) -> bool {
        now >= self.refresh_expires_at(refresh_multiplier)
    }

    /// Seconds of natural lifetime left, floored at zero. Used as the
    /// revocation-cache TTL so the cache never outlives the token.
    pub fn remaining_lifetime(&self, now: i64) -> u64 {
        (self.expires_at() - now).max(0) as u64
    }
}

/// Outcome of a compare-and-swap revocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// This call flipped the flag.
    Revoked,
    /// The flag was already set; no-op.
    AlreadyRevoked,
    /// No such record.
    NotFound,
}

/// Identity lookup surface of the external credential store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>, StoreError>;

    async fn find_user(&self, id: UserId) -> Result<Option<UserIdentity>, StoreError>;
}

/// Token-record persistence.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::DuplicateToken`] when
    /// either token value collides with a live row; callers regenerate and
    /// retry.
    async fn insert(&self, record: TokenRecord) -> Result<(), StoreError>;

    async fn find_by_access(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<TokenRecord>, StoreError>;

    /// Compare-and-swap `revoked` false→true. Exactly one concurrent caller
    /// observes [`RevokeOutcome::Revoked`].
    async fn revoke(&self, id: TokenId) -> Result<RevokeOutcome, StoreError>;

    /// Revoked-flag lookup by access-token value. `None` when no record
    /// exists for the value.
    async fn is_revoked(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<bool>, StoreError>;

    /// Bulk-delete rows that are both revoked and past natural expiry.
    /// Returns the number of rows removed. Runs out-of-band (purge job).
    async fn purge_expired(&self, now: i64) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> UserStore for std::sync::Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>, StoreError> {
        (**self).find_by_username(username).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserIdentity>, StoreError> {
        (**self).find_user(id).await
    }
}

#[async_trait]
impl<S> TokenStore for std::sync::Arc<S>
where
    S: TokenStore + ?Sized,
{
    async fn insert(&self, record: TokenRecord) -> Result<(), StoreError> {
        (**self).insert(record).await
    }

    async fn find_by_access(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<TokenRecord>, StoreError> {
        (**self).find_by_access(kind, access_token).await
    }

    async fn revoke(&self, id: TokenId) -> Result<RevokeOutcome, StoreError> {
        (**self).revoke(id).await
    }

    async fn is_revoked(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<bool>, StoreError> {
        (**self).is_revoked(kind, access_token).await
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, StoreError> {
        (**self).purge_expired(now).await
    }
}
