//! Process configuration, read once at startup from the environment.

use warden_auth::{PolicyConfig, TokenKind, ANY_ROLES, PASSTHROUGH};
use warden_infra::TokenLifecycleConfig;

/// Everything the api binary needs, resolved before the router is built.
///
/// Held behind an `Arc` in app state; immutable during request processing.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub token_kind: TokenKind,
    pub signed_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_exp_secs: i64,
    pub refresh_multiplier: i64,
    pub opaque_access_len: usize,
    pub leeway_secs: u64,
    /// Authorization-header prefix for access tokens.
    pub access_prefix: String,
    /// Authorization-header prefix for refresh tokens. Distinct from the
    /// access prefix so the two token types cannot be swapped in headers.
    pub refresh_prefix: String,
    /// Routes that skip authentication entirely (matched-path form).
    pub exempt_routes: Vec<String>,
    /// Methods that skip authentication on every route.
    pub exempt_methods: Vec<String>,
    pub policy: PolicyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            token_kind: TokenKind::Signed,
            signed_secret: String::new(),
            issuer: "warden".to_string(),
            audience: "warden-api".to_string(),
            access_token_exp_secs: 30 * 60,
            refresh_multiplier: 5,
            opaque_access_len: 30,
            leeway_secs: 0,
            access_prefix: "Bearer".to_string(),
            refresh_prefix: "Refresh".to_string(),
            exempt_routes: vec!["/v1/ping".to_string()],
            exempt_methods: vec!["OPTIONS".to_string(), "HEAD".to_string()],
            policy: default_policy(),
        }
    }
}

impl AppConfig {
    /// Read configuration from `WARDEN_*` environment variables, falling
    /// back to dev defaults. The policy may be supplied as JSON via
    /// `WARDEN_POLICY`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(addr) = std::env::var("WARDEN_BIND_ADDR") {
            cfg.bind_addr = addr;
        }
        match std::env::var("WARDEN_TOKEN_SECRET") {
            Ok(secret) => cfg.signed_secret = secret,
            Err(_) => {
                tracing::warn!("WARDEN_TOKEN_SECRET not set; using insecure dev default");
                cfg.signed_secret = "dev-secret".to_string();
            }
        }
        if let Ok(kind) = std::env::var("WARDEN_TOKEN_KIND") {
            match kind.parse() {
                Ok(kind) => cfg.token_kind = kind,
                Err(_) => tracing::warn!(kind = %kind, "unknown WARDEN_TOKEN_KIND; keeping default"),
            }
        }
        if let Some(secs) = env_i64("WARDEN_ACCESS_TOKEN_EXP_SECS") {
            cfg.access_token_exp_secs = secs;
        }
        if let Some(mult) = env_i64("WARDEN_REFRESH_MULTIPLIER") {
            cfg.refresh_multiplier = mult;
        }
        if let Some(leeway) = env_i64("WARDEN_LEEWAY_SECS") {
            cfg.leeway_secs = leeway.max(0) as u64;
        }
        if let Ok(policy) = std::env::var("WARDEN_POLICY") {
            match serde_json::from_str(&policy) {
                Ok(policy) => cfg.policy = policy,
                Err(e) => tracing::warn!(error = %e, "WARDEN_POLICY is not valid JSON; keeping default policy"),
            }
        }

        cfg
    }

    pub fn lifecycle_config(&self) -> TokenLifecycleConfig {
        TokenLifecycleConfig {
            default_kind: self.token_kind,
            token_type: self.access_prefix.clone(),
            access_token_exp_secs: self.access_token_exp_secs,
            refresh_multiplier: self.refresh_multiplier,
            opaque_access_len: self.opaque_access_len,
            signed_secret: self.signed_secret.clone(),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            leeway_secs: self.leeway_secs,
            ..TokenLifecycleConfig::default()
        }
    }
}

/// Dev/default policy: administrators manage, any authenticated role may
/// introspect itself, ping is open.
pub fn default_policy() -> PolicyConfig {
    PolicyConfig::default()
        .with_roles(["administrator", "contributor"])
        .with_responsibility("manager", ["administrator"])
        .with_route("/v1/whoami", "GET", [ANY_ROLES])
        .with_route("/v1/ping", "GET", [PASSTHROUGH])
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_internally_consistent() {
        assert!(default_policy().validate().is_ok());
    }

    #[test]
    fn default_prefixes_are_distinct() {
        let cfg = AppConfig::default();
        assert_ne!(cfg.access_prefix, cfg.refresh_prefix);
    }
}
