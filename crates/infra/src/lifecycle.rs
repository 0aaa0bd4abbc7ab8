//! Token lifecycle manager: issuance, verification, refresh-rotation, and
//! revocation across both codec backends.
//!
//! State machine per token pair: `Issued → Active → {Expired | Revoked} →
//! Superseded` (superseded on successful refresh, which always revokes the
//! predecessor). Refresh is all-or-nothing: the CAS on the revoked flag
//! picks exactly one winner under concurrent attempts, and a loser observes
//! "already revoked" with no mutation of its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use warden_auth::codec::IssuedPair;
use warden_auth::{Credentials, OpaqueCodec, SignedCodec, SignedCodecConfig, TokenKind, UserIdentity};
use warden_core::{AuthError, AuthResult, TokenId, UserId};

use crate::cache::{revocation_key, RevocationCache};
use crate::store::{RevokeOutcome, TokenRecord, TokenStore, UserStore};

/// Attempts to resolve an opaque-token value collision before giving up.
const MAX_COLLISION_RETRIES: usize = 8;

/// Lifecycle configuration, built once at process start.
#[derive(Debug, Clone)]
pub struct TokenLifecycleConfig {
    /// Backend used for issuance (verification always fans across both).
    pub default_kind: TokenKind,
    /// RFC 6750 token-type label returned in bundles ("Bearer").
    pub token_type: String,
    pub access_token_exp_secs: i64,
    /// Refresh window = access lifetime × this multiplier.
    pub refresh_multiplier: i64,
    pub opaque_access_len: usize,
    pub signed_secret: String,
    pub issuer: String,
    pub audience: String,
    pub leeway_secs: u64,
    /// Upper bound on any single revocation-cache call; on expiry the
    /// lookup degrades to the store just like a cache error.
    pub cache_timeout: Duration,
}

impl Default for TokenLifecycleConfig {
    fn default() -> Self {
        Self {
            default_kind: TokenKind::Signed,
            token_type: "Bearer".to_string(),
            access_token_exp_secs: 30 * 60,
            refresh_multiplier: 5,
            opaque_access_len: OpaqueCodec::DEFAULT_ACCESS_LEN,
            signed_secret: String::new(),
            issuer: "warden".to_string(),
            audience: "warden-api".to_string(),
            leeway_secs: 0,
            cache_timeout: Duration::from_millis(500),
        }
    }
}

/// The bundle returned to clients on issue and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub issued_at: i64,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub kind: TokenKind,
    pub user_id: UserId,
    pub access_token: String,
}

/// Orchestrates codecs, the token store, and the revocation cache.
///
/// `S` is the combined store; the cache is optional (feature-flagged
/// deployments) and advisory — see [`crate::cache`].
pub struct TokenLifecycle<S> {
    store: S,
    cache: Option<Arc<dyn RevocationCache>>,
    opaque: OpaqueCodec,
    signed: SignedCodec,
    default_kind: TokenKind,
    token_type: String,
    access_exp: i64,
    refresh_multiplier: i64,
    cache_timeout: Duration,
}

impl<S> TokenLifecycle<S>
where
    S: TokenStore + UserStore,
{
    pub fn new(
        store: S,
        cache: Option<Arc<dyn RevocationCache>>,
        cfg: TokenLifecycleConfig,
    ) -> Self {
        let signed = SignedCodec::new(SignedCodecConfig {
            secret: cfg.signed_secret,
            issuer: cfg.issuer,
            audience: cfg.audience,
            access_ttl_secs: cfg.access_token_exp_secs,
            refresh_ttl_secs: cfg.access_token_exp_secs * cfg.refresh_multiplier,
            leeway_secs: cfg.leeway_secs,
        });

        Self {
            store,
            cache,
            opaque: OpaqueCodec::new(cfg.opaque_access_len),
            signed,
            default_kind: cfg.default_kind,
            token_type: cfg.token_type,
            access_exp: cfg.access_token_exp_secs,
            refresh_multiplier: cfg.refresh_multiplier,
            cache_timeout: cfg.cache_timeout,
        }
    }

    pub fn default_kind(&self) -> TokenKind {
        self.default_kind
    }

    // ─────────────────────────────────────────────────────────────────────
    // Issue
    // ─────────────────────────────────────────────────────────────────────

    /// Authenticate credentials and mint a token pair of the default kind.
    pub async fn issue(&self, credentials: &Credentials) -> AuthResult<TokenBundle> {
        self.issue_kind(credentials, self.default_kind).await
    }

    /// Authenticate credentials and mint a token pair of an explicit kind.
    ///
    /// Bad credentials leave no record behind; shape violations are rejected
    /// before the store is consulted.
    pub async fn issue_kind(
        &self,
        credentials: &Credentials,
        kind: TokenKind,
    ) -> AuthResult<TokenBundle> {
        credentials.validate()?;

        let user = self
            .store
            .find_by_username(&credentials.username)
            .await?
            .ok_or(AuthError::CredentialsInvalid)?;

        if user.suspended || !user.verify_password(&credentials.password) {
            return Err(AuthError::CredentialsInvalid);
        }

        let record = self.persist_new_pair(kind, user.id).await?;
        Ok(self.bundle(record))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Verify
    // ─────────────────────────────────────────────────────────────────────

    /// Verify a token against every registered backend, in fixed order
    /// (opaque first), returning the first success or the most specific
    /// failure seen.
    pub async fn verify(&self, token: &str, allow_expired: bool) -> AuthResult<VerifiedToken> {
        let mut best: Option<AuthError> = None;

        for kind in TokenKind::ALL {
            match self.verify_kind(kind, token, allow_expired).await {
                Ok(verified) => return Ok(verified),
                Err(e) => {
                    let keep = best
                        .as_ref()
                        .map(|b| e.specificity() >= b.specificity())
                        .unwrap_or(true);
                    if keep {
                        best = Some(e);
                    }
                }
            }
        }

        Err(best.unwrap_or_else(|| AuthError::invalid_token("no token backend accepted the value")))
    }

    async fn verify_kind(
        &self,
        kind: TokenKind,
        token: &str,
        allow_expired: bool,
    ) -> AuthResult<VerifiedToken> {
        match kind {
            TokenKind::Opaque => self.verify_opaque(token, allow_expired).await,
            TokenKind::Signed => self.verify_signed(token, allow_expired).await,
        }
    }

    async fn verify_opaque(&self, token: &str, allow_expired: bool) -> AuthResult<VerifiedToken> {
        // fail fast: no store lookup for syntactically impossible values
        if !self.opaque.is_well_formed(token) {
            return Err(AuthError::invalid_token("not an opaque token"));
        }

        let record = self
            .store
            .find_by_access(TokenKind::Opaque, token)
            .await?
            .ok_or_else(|| AuthError::invalid_token("unknown token"))?;

        if record.revoked {
            return Err(AuthError::TokenRevoked);
        }
        if !allow_expired && record.is_expired(now()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(VerifiedToken {
            kind: TokenKind::Opaque,
            user_id: record.user_id,
            access_token: record.access_token,
        })
    }

    async fn verify_signed(&self, token: &str, allow_expired: bool) -> AuthResult<VerifiedToken> {
        // cryptographic verification first, then the revocation check
        let claims = self.signed.verify_access(token, allow_expired)?;

        if self.is_revoked(TokenKind::Signed, token).await? {
            return Err(AuthError::TokenRevoked);
        }

        Ok(VerifiedToken {
            kind: TokenKind::Signed,
            user_id: claims.sub,
            access_token: token.to_string(),
        })
    }

    /// Resolve the owning identity of a verified token.
    pub async fn owner(&self, token: &str) -> AuthResult<UserIdentity> {
        let verified = self.verify(token, false).await?;
        self.store
            .find_user(verified.user_id)
            .await?
            .ok_or_else(|| AuthError::invalid_token("token owner no longer exists"))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────

    /// Rotate a token pair: all checks pass → the old pair is revoked and a
    /// brand-new pair is issued for the same user; any failed check aborts
    /// with no mutation.
    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> AuthResult<TokenBundle> {
        let mut best: Option<AuthError> = None;

        for kind in TokenKind::ALL {
            let attempt = match kind {
                TokenKind::Opaque => self.refresh_opaque(access_token, refresh_token).await,
                TokenKind::Signed => self.refresh_signed(access_token, refresh_token).await,
            };
            match attempt {
                Ok(bundle) => return Ok(bundle),
                Err(e) => {
                    let keep = best
                        .as_ref()
                        .map(|b| e.specificity() >= b.specificity())
                        .unwrap_or(true);
                    if keep {
                        best = Some(e);
                    }
                }
            }
        }

        Err(best.unwrap_or_else(|| AuthError::invalid_token("no token backend accepted the pair")))
    }

    async fn refresh_opaque(&self, access_token: &str, refresh_token: &str) -> AuthResult<TokenBundle> {
        if !self.opaque.is_well_formed(access_token) {
            return Err(AuthError::invalid_token("not an opaque token"));
        }

        let record = self
            .store
            .find_by_access(TokenKind::Opaque, access_token)
            .await?
            .ok_or_else(|| AuthError::invalid_token("unknown token"))?;

        self.check_rotation(&record, refresh_token == record.refresh_token)?;
        self.rotate(record).await
    }

    async fn refresh_signed(&self, access_token: &str, refresh_token: &str) -> AuthResult<TokenBundle> {
        // access: signature enforced, expiry ignored (this is the one caller
        // allowed to present an expired access token)
        let claims = self.signed.verify_access(access_token, true)?;
        let refresh_claims = self.signed.verify_refresh(refresh_token)?;

        let binding = SignedCodec::signature_segment(access_token)?;
        let bound = refresh_claims.tsig == binding;

        let record = self
            .store
            .find_by_access(TokenKind::Signed, access_token)
            .await?
            .ok_or_else(|| AuthError::invalid_token("unknown token"))?;
        if record.user_id != claims.sub {
            return Err(AuthError::invalid_token("token record does not match claims"));
        }

        self.check_rotation(&record, bound)?;
        self.rotate(record).await
    }

    /// Shared pre-rotation checks. Pairing is backend-specific and passed in.
    fn check_rotation(&self, record: &TokenRecord, pair_matches: bool) -> AuthResult<()> {
        if record.revoked {
            return Err(AuthError::TokenRevoked);
        }
        if !pair_matches {
            return Err(AuthError::invalid_refresh_token("token pair mismatch"));
        }
        if record.is_refresh_expired(now(), self.refresh_multiplier) {
            return Err(AuthError::RefreshTokenExpired);
        }
        Ok(())
    }

    /// Revoke the predecessor (CAS — one winner) and persist the successor.
    async fn rotate(&self, old: TokenRecord) -> AuthResult<TokenBundle> {
        match self.store.revoke(old.id).await? {
            RevokeOutcome::Revoked => {}
            // a concurrent refresh won the race; this caller mutates nothing
            RevokeOutcome::AlreadyRevoked => return Err(AuthError::TokenRevoked),
            RevokeOutcome::NotFound => {
                return Err(AuthError::invalid_token("token record vanished"))
            }
        }

        self.push_revocation(&old).await;

        let record = self.persist_new_pair(old.kind, old.user_id).await?;
        Ok(self.bundle(record))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Revoke
    // ─────────────────────────────────────────────────────────────────────

    /// Revoke the pair owning this access token.
    ///
    /// Hard revoke: the record covers both tokens, so the paired refresh
    /// token dies too. Idempotent — a second call reports `AlreadyRevoked`
    /// and mutates nothing.
    pub async fn revoke(&self, token: &str) -> AuthResult<RevokeOutcome> {
        let record = self.locate(token).await?;

        let outcome = self.store.revoke(record.id).await?;
        if outcome == RevokeOutcome::Revoked {
            self.push_revocation(&record).await;
        }
        Ok(outcome)
    }

    /// Locate the record behind a token value, trying each backend.
    /// Signed tokens must pass signature verification before their record
    /// is trusted.
    async fn locate(&self, token: &str) -> AuthResult<TokenRecord> {
        if self.opaque.is_well_formed(token) {
            if let Some(record) = self.store.find_by_access(TokenKind::Opaque, token).await? {
                return Ok(record);
            }
            return Err(AuthError::invalid_token("unknown token"));
        }

        self.signed.verify_access(token, true)?;
        self.store
            .find_by_access(TokenKind::Signed, token)
            .await?
            .ok_or_else(|| AuthError::invalid_token("unknown token"))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    async fn persist_new_pair(&self, kind: TokenKind, user_id: UserId) -> AuthResult<TokenRecord> {
        for _ in 0..MAX_COLLISION_RETRIES {
            let issued_at = Utc::now();
            let pair: IssuedPair = match kind {
                TokenKind::Opaque => self.opaque.issue(),
                TokenKind::Signed => self.signed.issue(user_id, issued_at)?,
            };

            let record = TokenRecord {
                id: TokenId::new(),
                kind,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
                revoked: false,
                issued_at: issued_at.timestamp(),
                expires_in: self.access_exp,
                user_id,
            };

            match self.store.insert(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(crate::store::StoreError::DuplicateToken) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::unavailable(
            "could not mint a unique token pair after repeated attempts",
        ))
    }

    fn bundle(&self, record: TokenRecord) -> TokenBundle {
        TokenBundle {
            token_type: self.token_type.clone(),
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            expires_in: record.expires_in,
            issued_at: record.issued_at,
        }
    }

    /// Revocation check with cache-first lookup and store fallback.
    ///
    /// Cache trouble degrades to the store; a stalled cache is cut off at
    /// `cache_timeout` and treated the same way. Store trouble fails closed.
    async fn is_revoked(&self, kind: TokenKind, token: &str) -> AuthResult<bool> {
        if let Some(cache) = &self.cache {
            let key = revocation_key(kind, token);
            let lookup = cache.get(&key);
            match tokio::time::timeout(self.cache_timeout, lookup).await {
                Ok(Ok(Some(_))) => return Ok(true),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "revocation cache lookup failed; falling back to store")
                }
                Err(_) => warn!("revocation cache lookup timed out; falling back to store"),
            }
        }

        match self.store.is_revoked(kind, token).await? {
            Some(true) => {
                // opportunistic population so the next hit skips the store
                if let Some(record) = self.store.find_by_access(kind, token).await? {
                    self.push_revocation(&record).await;
                }
                Ok(true)
            }
            // signed tokens need no record to be valid; absence means
            // "never revoked" for them
            _ => Ok(false),
        }
    }

    /// Best-effort cache write; TTL is the token's remaining natural
    /// lifetime so cache entries never outlive the tokens they shadow.
    async fn push_revocation(&self, record: &TokenRecord) {
        let Some(cache) = &self.cache else {
            return;
        };

        let ttl = record.remaining_lifetime(now());
        if ttl == 0 {
            return;
        }

        let key = revocation_key(record.kind, &record.access_token);
        match tokio::time::timeout(self.cache_timeout, cache.put(&key, "1", ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "revocation cache write failed; store remains authoritative")
            }
            Err(_) => warn!("revocation cache write timed out; store remains authoritative"),
        }
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}
