//! Request/response DTOs for the auth endpoints.

use serde::{Deserialize, Serialize};

use warden_auth::Credentials;

/// Credential payload for `POST /v1/auth` (JSON or form-encoded).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl From<LoginRequest> for Credentials {
    fn from(req: LoginRequest) -> Self {
        Credentials::new(req.username, req.password)
    }
}

/// Optional body for `POST /v1/auth/verify`; the bearer header wins when
/// both are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyRequest {
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub access_token: String,
}

/// Body for `POST /v1/auth/refresh`. The access token may instead arrive in
/// the bearer header; the refresh token may instead arrive in the
/// authorization header under the refresh prefix.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshRequest {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WhoamiResponse {
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
}
