//! Signed (JWT) token backend.
//!
//! Tokens are stateless: validity is proven by signature + claims alone.
//! Persisted token records exist only to support revocation and audit.
//! HMAC-SHA256 with a shared secret; the key material never leaves this
//! module once the codec is constructed.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;

use warden_core::{AuthError, AuthResult, UserId};

use crate::claims::{AccessClaims, RefreshClaims};

use super::IssuedPair;

/// Construction parameters for [`SignedCodec`].
#[derive(Debug, Clone)]
pub struct SignedCodecConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub leeway_secs: u64,
}

impl Default for SignedCodecConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "warden".to_string(),
            audience: "warden-api".to_string(),
            access_ttl_secs: 30 * 60,
            refresh_ttl_secs: 150 * 60,
            leeway_secs: 0,
        }
    }
}

/// Codec for signed (self-describing) tokens.
pub struct SignedCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    leeway_secs: u64,
}

impl SignedCodec {
    pub fn new(cfg: SignedCodecConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer,
            audience: cfg.audience,
            access_ttl_secs: cfg.access_ttl_secs,
            refresh_ttl_secs: cfg.refresh_ttl_secs,
            leeway_secs: cfg.leeway_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Syntactic filter: three non-empty dot-separated segments.
    pub fn is_well_formed(token: &str) -> bool {
        let mut parts = token.split('.');
        matches!(
            (parts.next(), parts.next(), parts.next(), parts.next()),
            (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty()
        )
    }

    /// The third (signature) segment of a compact JWT.
    pub fn signature_segment(token: &str) -> AuthResult<&str> {
        if !Self::is_well_formed(token) {
            return Err(AuthError::invalid_token("not a signed token"));
        }
        // is_well_formed guarantees the third segment exists
        Ok(token.rsplit('.').next().unwrap_or_default())
    }

    /// Mint an access/refresh pair for `user_id` at time `now`.
    ///
    /// The refresh token's `tsig` claim is the access token's signature
    /// segment, binding the pair without storage.
    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<IssuedPair> {
        let iat = now.timestamp();

        let mut nonce = [0u8; 3];
        OsRng.fill_bytes(&mut nonce);

        let access_claims = AccessClaims {
            sub: user_id,
            rnd: hex::encode(nonce),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            nbf: iat,
            exp: iat + self.access_ttl_secs,
        };
        let access_token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &access_claims, &self.encoding)
            .map_err(|e| AuthError::unavailable(format!("token signing failed: {e}")))?;

        let refresh_claims = RefreshClaims {
            tsig: Self::signature_segment(&access_token)?.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            nbf: iat,
            exp: iat + self.refresh_ttl_secs,
        };
        let refresh_token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &refresh_claims, &self.encoding)
            .map_err(|e| AuthError::unavailable(format!("token signing failed: {e}")))?;

        Ok(IssuedPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify an access token's signature and claims.
    ///
    /// `allow_expired` skips the expiry check only; signature, issuer and
    /// audience are always enforced. Used internally during refresh to
    /// inspect an already-expired access token.
    pub fn verify_access(&self, token: &str, allow_expired: bool) -> AuthResult<AccessClaims> {
        if !Self::is_well_formed(token) {
            return Err(AuthError::invalid_token("not a signed token"));
        }

        let mut validation = self.validation();
        validation.validate_exp = !allow_expired;

        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::invalid_token(e.to_string()),
            })?;
        Ok(data.claims)
    }

    /// Verify a refresh token with expiry enforced.
    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        if !Self::is_well_formed(token) {
            return Err(AuthError::invalid_refresh_token("not a signed token"));
        }

        let data = jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::RefreshTokenExpired,
                _ => AuthError::invalid_refresh_token(e.to_string()),
            })?;
        Ok(data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = self.leeway_secs;
        validation
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn codec() -> SignedCodec {
        SignedCodec::new(SignedCodecConfig {
            secret: "test-secret".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn issue_then_verify_roundtrip() {
        let codec = codec();
        let user_id = UserId::new();
        let pair = codec.issue(user_id, Utc::now()).unwrap();

        let claims = codec.verify_access(&pair.access_token, false).unwrap();
        assert_eq!(claims.sub, user_id);

        let refresh = codec.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(
            refresh.tsig,
            SignedCodec::signature_segment(&pair.access_token).unwrap()
        );
    }

    #[test]
    fn same_second_issues_produce_distinct_tokens() {
        let codec = codec();
        let user_id = UserId::new();
        let now = Utc::now();
        let a = codec.issue(user_id, now).unwrap();
        let b = codec.issue(user_id, now).unwrap();
        assert_ne!(a.access_token, b.access_token);
        assert_ne!(a.refresh_token, b.refresh_token);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = codec();
        let pair = codec.issue(UserId::new(), Utc::now()).unwrap();

        // flip the last character of the signature segment
        let mut tampered = pair.access_token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(matches!(
            codec.verify_access(&tampered, false),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn truncated_token_is_rejected() {
        let codec = codec();
        let pair = codec.issue(UserId::new(), Utc::now()).unwrap();
        let truncated = &pair.access_token[..pair.access_token.len() - 1];
        assert!(codec.verify_access(truncated, false).is_err());
    }

    #[test]
    fn expired_access_token_fails_unless_allowed() {
        let codec = codec();
        let issued_at = Utc::now() - Duration::seconds(codec.access_ttl_secs() * 2);
        let pair = codec.issue(UserId::new(), issued_at).unwrap();

        assert_eq!(
            codec.verify_access(&pair.access_token, false).unwrap_err(),
            AuthError::TokenExpired
        );
        // refresh inspection path: expiry ignored, signature still enforced
        assert!(codec.verify_access(&pair.access_token, true).is_ok());
    }

    #[test]
    fn expired_refresh_token_reports_refresh_expiry() {
        let codec = SignedCodec::new(SignedCodecConfig {
            secret: "test-secret".to_string(),
            refresh_ttl_secs: 60,
            ..Default::default()
        });
        let issued_at = Utc::now() - Duration::seconds(3600);
        let pair = codec.issue(UserId::new(), issued_at).unwrap();

        assert_eq!(
            codec.verify_refresh(&pair.refresh_token).unwrap_err(),
            AuthError::RefreshTokenExpired
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let pair = codec().issue(UserId::new(), Utc::now()).unwrap();
        let other = SignedCodec::new(SignedCodecConfig {
            secret: "another-secret".to_string(),
            ..Default::default()
        });
        assert!(other.verify_access(&pair.access_token, false).is_err());
    }

    #[test]
    fn opaque_looking_value_is_malformed_here() {
        assert!(!SignedCodec::is_well_formed("q3Zx09Aa11BbCc22DdEe33FfGg44Hh"));
        assert!(!SignedCodec::is_well_formed("a..b"));
        assert!(SignedCodec::is_well_formed("a.b.c"));
    }
}
