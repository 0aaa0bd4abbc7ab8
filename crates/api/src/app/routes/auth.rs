//! Credential exchange, verification, refresh, and revocation endpoints.
//!
//! These routes bypass the auth interceptor and do their own header/body
//! handling. Status contract: 200 success, 205 on revoke, 400 shape
//! problems, 401 authentication failures, 422 malformed credentials.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;

use warden_auth::Credentials;
use warden_infra::RevokeOutcome;
use warden_core::AuthError;

use crate::app::dto::{LoginRequest, RefreshRequest, VerifyRequest, VerifyResponse};
use crate::app::errors::{auth_error_response, json_error};
use crate::app::AppState;
use crate::middleware::parse_bearer;

/// `POST /v1/auth` — authenticate and receive a token bundle.
///
/// Credentials may arrive as a JSON body, a form-encoded body, or an HTTP
/// Basic authorization header; the header wins when both are present.
pub async fn login(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let credentials = match extract_credentials(&headers, &body) {
        Ok(credentials) => credentials,
        Err(resp) => return resp,
    };

    match state.lifecycle.issue(&credentials).await {
        Ok(bundle) => (StatusCode::OK, axum::Json(bundle)).into_response(),
        Err(e) => auth_error_response(&e),
    }
}

/// `GET /v1/auth` — advertise the authentication scheme (200, not a
/// challenge rejection: clients probe this before POSTing credentials).
pub async fn challenge(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::WWW_AUTHENTICATE, state.config.access_prefix.clone())],
        axum::Json(serde_json::json!({
            "WWW-Authenticate": state.config.access_prefix,
        })),
    )
        .into_response()
}

/// `POST /v1/auth/verify` — verify a token and echo it back.
pub async fn verify(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let token = match parse_bearer(&headers, &state.config.access_prefix) {
        Ok(token) => token.to_string(),
        Err(header_err) => match parse_json_body::<VerifyRequest>(&body) {
            Ok(payload) => match payload.access_token {
                Some(token) => token,
                None => return auth_error_response(&header_err),
            },
            Err(resp) => return resp,
        },
    };

    match state.lifecycle.verify(&token, false).await {
        Ok(_) => (
            StatusCode::OK,
            axum::Json(VerifyResponse {
                access_token: token,
            }),
        )
            .into_response(),
        Err(e) => auth_error_response(&e),
    }
}

/// `POST /v1/auth/refresh` — rotate a token pair.
///
/// Both tokens in the body, or either one in the authorization header (the
/// access token under the access prefix, the refresh token under the
/// refresh prefix — distinct prefixes keep the two from being swapped).
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let payload = match parse_json_body::<RefreshRequest>(&body) {
        Ok(payload) => payload,
        Err(resp) => return resp,
    };

    let access_token = payload
        .access_token
        .or_else(|| parse_bearer(&headers, &state.config.access_prefix).ok().map(String::from));
    let refresh_token = payload
        .refresh_token
        .or_else(|| parse_bearer(&headers, &state.config.refresh_prefix).ok().map(String::from));

    let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "both access_token and refresh_token are required",
        );
    };

    match state.lifecycle.refresh(&access_token, &refresh_token).await {
        Ok(bundle) => (StatusCode::OK, axum::Json(bundle)).into_response(),
        Err(e) => auth_error_response(&e),
    }
}

/// `DELETE /v1/auth` — revoke the presented token pair.
pub async fn revoke(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = match parse_bearer(&headers, &state.config.access_prefix) {
        Ok(token) => token.to_string(),
        Err(e) => return auth_error_response(&e),
    };

    match state.lifecycle.revoke(&token).await {
        Ok(RevokeOutcome::Revoked) => StatusCode::RESET_CONTENT.into_response(),
        // a second revoke is an auth failure, not a quiet success
        Ok(RevokeOutcome::AlreadyRevoked) => auth_error_response(&AuthError::TokenRevoked),
        Ok(RevokeOutcome::NotFound) => {
            auth_error_response(&AuthError::invalid_token("unknown token"))
        }
        Err(e) => auth_error_response(&e),
    }
}

/// Pull credentials out of a login request: Basic header first, then the
/// body by content type (JSON default, form-encoded when declared).
fn extract_credentials(headers: &HeaderMap, body: &Bytes) -> Result<Credentials, Response> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        return basic_credentials(value);
    }

    let form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let parsed: Result<LoginRequest, String> = if form {
        serde_urlencoded::from_bytes(body).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice(body).map_err(|e| e.to_string())
    };

    parsed.map(Credentials::from).map_err(|e| {
        json_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            format!("could not read credentials: {e}"),
        )
    })
}

fn basic_credentials(value: &header::HeaderValue) -> Result<Credentials, Response> {
    let malformed = || {
        json_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "authorization header is not a valid Basic credential",
        )
    };

    let value = value.to_str().map_err(|_| malformed())?;
    let encoded = value.strip_prefix("Basic ").ok_or_else(malformed)?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;

    let (username, password) = decoded.split_once(':').ok_or_else(malformed)?;
    Ok(Credentials::new(username, password))
}

/// Parse an optional JSON body; an empty body yields the type's default.
fn parse_json_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: Default + serde::de::DeserializeOwned,
{
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        json_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            format!("could not read request body: {e}"),
        )
    })
}
