use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use warden_core::AuthError;

use crate::app::dto::WhoamiResponse;
use crate::app::errors::auth_error_response;
use crate::app::AppState;
use crate::context::AuthContext;

/// `GET /v1/ping` — liveness probe, exempt from authentication.
pub async fn ping() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "message": "pong" }))
}

/// `GET /v1/whoami` — echo the authenticated identity and its roles.
///
/// The context is optional so an operator policy that marks this route
/// passthrough degrades to a 401 instead of an extractor failure.
pub async fn whoami(
    State(state): State<AppState>,
    ctx: Option<Extension<AuthContext>>,
) -> Response {
    let Some(Extension(ctx)) = ctx else {
        return auth_error_response(&AuthError::invalid_token("no identity on this request"));
    };

    match state.store.find_user(ctx.user_id()).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            axum::Json(WhoamiResponse {
                user_id: user.id.to_string(),
                username: user.username,
                roles: user.roles.iter().map(|r| r.to_string()).collect(),
            }),
        )
            .into_response(),
        Ok(None) => auth_error_response(&AuthError::invalid_token("token owner no longer exists")),
        Err(e) => auth_error_response(&e.into()),
    }
}
