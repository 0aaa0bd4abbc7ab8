//! Postgres-backed credential/token store.
//!
//! ## Error mapping
//!
//! | SQLx error | PostgreSQL code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `DuplicateToken` / `DuplicateIdentity` | token value or username/email collision |
//! | any other | — | `Unavailable` | connectivity, pool closed, bad rows |
//!
//! The revoke path is a conditional UPDATE (`... AND revoked = FALSE`), so a
//! refresh race produces exactly one winner at the database level.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;

use warden_auth::{Role, TokenKind, UserIdentity};
use warden_core::{TokenId, UserId};

use super::{RevokeOutcome, StoreError, TokenRecord, TokenStore, UserStore};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres store. `Clone` + `Send + Sync`; all access goes through the
/// SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warden_users (
                id            UUID PRIMARY KEY,
                username      TEXT NOT NULL UNIQUE,
                email         TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                password_salt TEXT NOT NULL,
                suspended     BOOLEAN NOT NULL DEFAULT FALSE,
                roles         TEXT[] NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warden_tokens (
                id            UUID PRIMARY KEY,
                kind          TEXT NOT NULL,
                access_token  TEXT NOT NULL UNIQUE,
                refresh_token TEXT NOT NULL UNIQUE,
                revoked       BOOLEAN NOT NULL DEFAULT FALSE,
                issued_at     BIGINT NOT NULL,
                expires_in    BIGINT NOT NULL,
                user_id       UUID NOT NULL REFERENCES warden_users (id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS warden_tokens_access_idx ON warden_tokens (kind, access_token)",
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }

    /// Register an identity (provisioning path, not request-time).
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create_user(&self, user: &UserIdentity) -> Result<UserId, StoreError> {
        let roles: Vec<String> = user.roles.iter().map(|r| r.as_str().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO warden_users
                (id, username, email, password_hash, password_salt, suspended, roles)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.password_salt)
        .bind(user.suspended)
        .bind(&roles)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateIdentity(format!(
                    "username or email already registered: {}",
                    user.username
                ))
            } else {
                map_sqlx_error("create_user", e)
            }
        })?;

        Ok(user.id)
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<UserIdentity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, password_salt, suspended, roles
            FROM warden_users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_username", e))?;

        row.map(user_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn find_user(&self, id: UserId) -> Result<Option<UserIdentity>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, password_salt, suspended, roles
            FROM warden_users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user", e))?;

        row.map(user_from_row).transpose()
    }
}

#[async_trait]
impl TokenStore for PostgresStore {
    #[instrument(skip(self, record), fields(token_id = %record.id, kind = %record.kind))]
    async fn insert(&self, record: TokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO warden_tokens
                (id, kind, access_token, refresh_token, revoked, issued_at, expires_in, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.kind.as_str())
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.revoked)
        .bind(record.issued_at)
        .bind(record.expires_in)
        .bind(record.user_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateToken
            } else {
                map_sqlx_error("insert", e)
            }
        })?;

        Ok(())
    }

    #[instrument(skip(self, access_token), fields(kind = %kind))]
    async fn find_by_access(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, kind, access_token, refresh_token, revoked, issued_at, expires_in, user_id
            FROM warden_tokens
            WHERE kind = $1 AND access_token = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(access_token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_access", e))?;

        row.map(token_from_row).transpose()
    }

    #[instrument(skip(self), fields(token_id = %id))]
    async fn revoke(&self, id: TokenId) -> Result<RevokeOutcome, StoreError> {
        let updated = sqlx::query(
            "UPDATE warden_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE",
        )
        .bind(id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("revoke", e))?;

        if updated.rows_affected() == 1 {
            return Ok(RevokeOutcome::Revoked);
        }

        let exists = sqlx::query("SELECT 1 FROM warden_tokens WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke", e))?;

        Ok(if exists.is_some() {
            RevokeOutcome::AlreadyRevoked
        } else {
            RevokeOutcome::NotFound
        })
    }

    #[instrument(skip(self, access_token), fields(kind = %kind))]
    async fn is_revoked(
        &self,
        kind: TokenKind,
        access_token: &str,
    ) -> Result<Option<bool>, StoreError> {
        let row = sqlx::query(
            "SELECT revoked FROM warden_tokens WHERE kind = $1 AND access_token = $2",
        )
        .bind(kind.as_str())
        .bind(access_token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("is_revoked", e))?;

        row.map(|r| {
            r.try_get::<bool, _>("revoked")
                .map_err(|e| StoreError::Unavailable(format!("is_revoked: bad row: {e}")))
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self, now: i64) -> Result<u64, StoreError> {
        let deleted = sqlx::query(
            "DELETE FROM warden_tokens WHERE revoked = TRUE AND issued_at + expires_in <= $1",
        )
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("purge_expired", e))?;

        Ok(deleted.rows_affected())
    }
}

fn user_from_row(row: sqlx::postgres::PgRow) -> Result<UserIdentity, StoreError> {
    let bad = |e: sqlx::Error| StoreError::Unavailable(format!("bad user row: {e}"));

    let roles: Vec<String> = row.try_get("roles").map_err(bad)?;
    Ok(UserIdentity {
        id: UserId::from_uuid(row.try_get("id").map_err(bad)?),
        username: row.try_get("username").map_err(bad)?,
        email: row.try_get("email").map_err(bad)?,
        password_hash: row.try_get("password_hash").map_err(bad)?,
        password_salt: row.try_get("password_salt").map_err(bad)?,
        suspended: row.try_get("suspended").map_err(bad)?,
        roles: roles.into_iter().map(Role::new).collect(),
    })
}

fn token_from_row(row: sqlx::postgres::PgRow) -> Result<TokenRecord, StoreError> {
    let bad = |e: sqlx::Error| StoreError::Unavailable(format!("bad token row: {e}"));

    let kind: String = row.try_get("kind").map_err(bad)?;
    Ok(TokenRecord {
        id: TokenId::from_uuid(row.try_get("id").map_err(bad)?),
        kind: TokenKind::from_str(&kind)
            .map_err(|e| StoreError::Unavailable(format!("bad token row: {e}")))?,
        access_token: row.try_get("access_token").map_err(bad)?,
        refresh_token: row.try_get("refresh_token").map_err(bad)?,
        revoked: row.try_get("revoked").map_err(bad)?,
        issued_at: row.try_get("issued_at").map_err(bad)?,
        expires_in: row.try_get("expires_in").map_err(bad)?,
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(bad)?),
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

fn map_sqlx_error(op: &str, e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("{op}: {e}"))
}
