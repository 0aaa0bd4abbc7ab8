//! Authentication/authorization error model.

use thiserror::Error;

/// Result type used across the auth layers.
pub type AuthResult<T> = Result<T, AuthError>;

/// Domain-level authentication/authorization failure.
///
/// Every variant maps to exactly one client-observable condition; the HTTP
/// adapter performs the final status-code translation. Keep infrastructure
/// detail (connection strings, SQL) out of these messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The token is malformed or unparseable (wrong length, charset, or
    /// segment structure), or no record/signature matches it.
    #[error("token invalid: {0}")]
    InvalidToken(String),

    /// The access token's lifetime has elapsed.
    #[error("token has expired")]
    TokenExpired,

    /// The token was explicitly revoked before its natural expiry.
    #[error("token has been revoked")]
    TokenRevoked,

    /// The refresh token does not pair with the presented access token.
    #[error("refresh token invalid: {0}")]
    InvalidRefreshToken(String),

    /// The refresh window for this token pair has elapsed.
    #[error("refresh token has expired")]
    RefreshTokenExpired,

    /// Username/password did not match a live identity.
    #[error("invalid credentials")]
    CredentialsInvalid,

    /// Credentials failed shape validation (length/charset), rejected
    /// before any store lookup.
    #[error("malformed credentials: {0}")]
    CredentialsMalformed(String),

    /// Authenticated, but the caller's roles do not satisfy route policy.
    #[error("access to this resource has been restricted")]
    Forbidden,

    /// A required dependency (store, cache) was unreachable. Fails closed.
    #[error("dependency unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    pub fn invalid_refresh_token(msg: impl Into<String>) -> Self {
        Self::InvalidRefreshToken(msg.into())
    }

    pub fn malformed_credentials(msg: impl Into<String>) -> Self {
        Self::CredentialsMalformed(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::InvalidRefreshToken(_) => "invalid_refresh_token",
            AuthError::RefreshTokenExpired => "refresh_token_expired",
            AuthError::CredentialsInvalid => "credentials_invalid",
            AuthError::CredentialsMalformed(_) => "credentials_malformed",
            AuthError::Forbidden => "forbidden",
            AuthError::Unavailable(_) => "unavailable",
        }
    }

    /// Ranking used when several token backends are tried in order: keep the
    /// most specific failure rather than a generic "invalid".
    pub fn specificity(&self) -> u8 {
        match self {
            AuthError::InvalidToken(_) => 0,
            AuthError::CredentialsMalformed(_) => 1,
            AuthError::CredentialsInvalid => 1,
            AuthError::Forbidden => 1,
            AuthError::TokenExpired => 2,
            AuthError::TokenRevoked => 2,
            AuthError::InvalidRefreshToken(_) => 2,
            AuthError::RefreshTokenExpired => 2,
            AuthError::Unavailable(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AuthError::TokenRevoked.code(), "token_revoked");
        assert_eq!(AuthError::invalid_token("x").code(), "invalid_token");
        assert_eq!(AuthError::Forbidden.code(), "forbidden");
    }

    #[test]
    fn specific_failures_outrank_generic_invalid() {
        assert!(AuthError::TokenRevoked.specificity() > AuthError::invalid_token("x").specificity());
        assert!(AuthError::TokenExpired.specificity() > AuthError::invalid_token("x").specificity());
    }
}
