//! Claim sets carried by signed tokens.

use serde::{Deserialize, Serialize};

use warden_core::UserId;

/// Claims embedded in a signed access token.
///
/// Standard time claims plus the owning user. `iat`/`nbf`/`exp` are epoch
/// seconds, as `jsonwebtoken` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,
    /// Random hex nonce: keeps two tokens minted for the same user within
    /// the same second from being byte-identical.
    pub rnd: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Claims embedded in a signed refresh token.
///
/// `tsig` binds the refresh token to its paired access token: it equals the
/// access token's third (signature) segment, so pair mismatch is detectable
/// without any extra storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub tsig: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}
