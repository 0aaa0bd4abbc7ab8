//! Request interceptors: authentication and route policy (RBAC).
//!
//! Ordering: authentication runs first and attaches [`AuthContext`]; the
//! policy layer runs second and only acts when an identity is present.
//! The `/v1/auth` family handles its own credentials and bypasses both.

use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use warden_core::{AuthError, AuthResult};

use crate::app::errors::auth_error_response;
use crate::app::AppState;
use crate::context::AuthContext;

/// Route prefix that performs its own credential handling.
pub const AUTH_ROUTE: &str = "/v1/auth";

/// Authentication interceptor.
///
/// Exemptions, in order: the auth endpoints themselves, exempt methods,
/// exempt routes, and routes marked `@passthrough` in policy. Everything
/// else must present a parseable bearer header that the lifecycle manager
/// accepts; the failure code/message is preserved verbatim in the 401 body.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = route_template(&req);
    let method = req.method().as_str().to_string();

    if is_auth_route(&path)
        || state.config.exempt_methods.iter().any(|m| m == &method)
        || state.config.exempt_routes.iter().any(|r| r == &path)
        || state.policy.is_passthrough(&path, &method)
    {
        return next.run(req).await;
    }

    let token = match parse_bearer(req.headers(), &state.config.access_prefix) {
        Ok(token) => token.to_string(),
        Err(e) => return auth_error_response(&e),
    };

    match state.lifecycle.verify(&token, false).await {
        Ok(verified) => {
            req.extensions_mut()
                .insert(AuthContext::new(verified.user_id));
            next.run(req).await
        }
        Err(e) => auth_error_response(&e),
    }
}

/// Route policy interceptor. No-op when no identity was attached.
pub async fn enforce_policy(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(ctx) = req.extensions().get::<AuthContext>().copied() else {
        return next.run(req).await;
    };

    let path = route_template(&req);
    let method = req.method().as_str();

    let user = match state.store.find_user(ctx.user_id()).await {
        Ok(Some(user)) => user,
        // token verified but the identity is gone: treat as a dead token
        Ok(None) => {
            return auth_error_response(&AuthError::invalid_token("token owner no longer exists"))
        }
        Err(e) => return auth_error_response(&e.into()),
    };

    match state.policy.authorize(&user.roles, &path, method) {
        Ok(()) => next.run(req).await,
        Err(e) => auth_error_response(&e),
    }
}

/// True only for the auth endpoint family itself, not for sibling routes
/// that merely share the prefix (`/v1/authors` must still authenticate).
fn is_auth_route(path: &str) -> bool {
    path == AUTH_ROUTE || path.starts_with("/v1/auth/")
}

/// The router's matched-path template when available (`/v1/users/:id`),
/// otherwise the raw request path.
fn route_template(req: &Request<Body>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

/// Parse `Authorization: <prefix> <token>`.
///
/// Exactly two whitespace-separated parts, matching prefix, non-empty
/// value. Each violation gets its own message so clients can tell a
/// missing header from a mangled one.
pub fn parse_bearer<'a>(headers: &'a HeaderMap, prefix: &str) -> AuthResult<&'a str> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AuthError::invalid_token("authorization header missing"))?;

    let header = header
        .to_str()
        .map_err(|_| AuthError::invalid_token("authorization header is not valid UTF-8"))?;

    let mut parts = header.split_whitespace();
    let scheme = parts
        .next()
        .ok_or_else(|| AuthError::invalid_token("authorization header is empty"))?;
    if scheme != prefix {
        return Err(AuthError::invalid_token(format!(
            "authorization header must start with {prefix}"
        )));
    }

    let token = parts
        .next()
        .ok_or_else(|| AuthError::invalid_token("authorization header is missing the token value"))?;
    if parts.next().is_some() {
        return Err(AuthError::invalid_token(
            "authorization header contains extra content",
        ));
    }

    Ok(token)
}
