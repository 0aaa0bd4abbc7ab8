use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_core::AuthError;

/// Translate a domain failure into the JSON error envelope.
///
/// The code/message pair comes from the error itself, unmodified, so the
/// body matches whatever the lifecycle manager reported.
pub fn auth_error_response(err: &AuthError) -> axum::response::Response {
    let status = match err {
        AuthError::CredentialsMalformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::Forbidden => StatusCode::FORBIDDEN,
        AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::UNAUTHORIZED,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
