//! In-memory store for tests/dev.
//!
//! Mirrors the Postgres implementation's semantics, including the unique
//! constraints on token values and usernames/emails and the CAS revoke.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use warden_auth::{TokenKind, UserIdentity};
use warden_core::{TokenId, UserId};

use super::{RevokeOutcome, StoreError, TokenRecord, TokenStore, UserStore};

/// In-memory user + token store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, UserIdentity>>,
    tokens: RwLock<HashMap<TokenId, TokenRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity (test/dev seeding path).
    pub fn create_user(&self, user: UserIdentity) -> Result<UserId, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Unavailable("user lock poisoned".into()))?;

        let clash = users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if clash {
            return Err(StoreError::DuplicateIdentity(format!(
                "username or email already registered: {}",
                user.username
            )));
        }

        let id = user.id;
        users.insert(id, user);
        Ok(id)
    }

    /// Flip the suspended flag (test/dev path).
    pub fn set_suspended(&self, id: UserId, suspended: bool) {
        if let Ok(mut users) = self.users.write() {
            if let Some(user) = users.get_mut(&id) {
                user.suspended = suspended;
            }
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Unavailable("user lock poisoned".into()))?;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserIdentity>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Unavailable("user lock poisoned".into()))?;
        Ok(users.get(&id).cloned())
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn insert(&self, record: TokenRecord) -> Result<(), StoreError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StoreError::Unavailable("token lock poisoned".into()))?;

        let clash = tokens.values().any(|t| {
            t.access_token == record.access_token || t.refresh_token == record.refresh_token
        });
        if clash {
            return Err(StoreError::DuplicateToken);
        }

        tokens.insert(record.id, record);
        Ok(())
    }

    async fn find_by_access(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| StoreError::Unavailable("token lock poisoned".into()))?;
        Ok(tokens
            .values()
            .find(|t| t.kind == kind && t.access_token == access_token)
            .cloned())
    }

    async fn revoke(&self, id: TokenId) -> Result<RevokeOutcome, StoreError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StoreError::Unavailable("token lock poisoned".into()))?;

        match tokens.get_mut(&id) {
            None => Ok(RevokeOutcome::NotFound),
            Some(record) if record.revoked => Ok(RevokeOutcome::AlreadyRevoked),
            Some(record) => {
                record.revoked = true;
                Ok(RevokeOutcome::Revoked)
            }
        }
    }

    async fn is_revoked(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<bool>, StoreError> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| StoreError::Unavailable("token lock poisoned".into()))?;
        Ok(tokens
            .values()
            .find(|t| t.kind == kind && t.access_token == access_token)
            .map(|t| t.revoked))
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, StoreError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StoreError::Unavailable("token lock poisoned".into()))?;
        let before = tokens.len();
        tokens.retain(|_, t| !(t.revoked && t.is_expired(now)));
        Ok((before - tokens.len()) as u64)
    }
}
