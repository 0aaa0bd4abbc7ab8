//! HTTP application wiring (axum router + state).
//!
//! Layout:
//! - `routes/`: handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: the JSON error envelope

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use warden_auth::PolicyConfig;
use warden_infra::cache::RevocationCache;
use warden_infra::store::{TokenStore, UserStore};
use warden_infra::TokenLifecycle;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;

/// Combined store surface the api needs.
pub trait AuthStore: TokenStore + UserStore {}

impl<S> AuthStore for S where S: TokenStore + UserStore {}

pub type SharedStore = Arc<dyn AuthStore>;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<TokenLifecycle<SharedStore>>,
    pub store: SharedStore,
    pub policy: Arc<PolicyConfig>,
    pub config: Arc<AppConfig>,
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// integration tests).
pub fn build_app(
    config: AppConfig,
    store: SharedStore,
    cache: Option<Arc<dyn RevocationCache>>,
) -> Router {
    let lifecycle = Arc::new(TokenLifecycle::new(
        store.clone(),
        cache,
        config.lifecycle_config(),
    ));

    let state = AppState {
        lifecycle,
        store,
        policy: Arc::new(config.policy.clone()),
        config: Arc::new(config),
    };

    Router::new()
        .route(
            "/v1/auth",
            post(routes::auth::login)
                .get(routes::auth::challenge)
                .delete(routes::auth::revoke),
        )
        .route("/v1/auth/verify", post(routes::auth::verify))
        .route("/v1/auth/refresh", post(routes::auth::refresh))
        .route("/v1/ping", get(routes::system::ping))
        .route("/v1/whoami", get(routes::system::whoami))
        // policy runs after authentication (layers apply bottom-up)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::enforce_policy,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .with_state(state)
}
