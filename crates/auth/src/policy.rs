//! Route access policy: roles, responsibilities, and the RBAC decision.
//!
//! Policy is a static configuration graph loaded once at process start and
//! treated as immutable during request processing. Routes reference
//! responsibilities (named role groups), never individual roles, so role
//! churn stays out of route configuration.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use warden_core::{AuthError, AuthResult};

use crate::Role;

/// Reserved responsibility: the route bypasses authorization entirely.
pub const PASSTHROUGH: &str = "@passthrough";

/// Reserved responsibility: any authenticated role is sufficient.
pub const ANY_ROLES: &str = "@any-roles";

/// Per-route mapping of HTTP method to allowed responsibility names.
pub type RoutePolicy = BTreeMap<String, Vec<String>>;

/// Static policy configuration.
///
/// Route keys use the router's matched-path syntax (e.g. `/v1/users/:id`),
/// method keys are uppercase. Unlisted routes and methods deny by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub roles: Vec<String>,
    pub responsibilities: BTreeMap<String, Vec<String>>,
    pub routes: BTreeMap<String, RoutePolicy>,
}

impl PolicyConfig {
    /// Check referential integrity: every responsibility must expand to
    /// known roles, and every route policy must name a known responsibility
    /// or a reserved marker.
    pub fn validate(&self) -> AuthResult<()> {
        let known: HashSet<&str> = self.roles.iter().map(String::as_str).collect();

        for (name, members) in &self.responsibilities {
            for role in members {
                if !known.contains(role.as_str()) {
                    return Err(AuthError::unavailable(format!(
                        "policy: responsibility '{name}' references unknown role '{role}'"
                    )));
                }
            }
        }

        for (route, methods) in &self.routes {
            for (method, names) in methods {
                for name in names {
                    let reserved = name == PASSTHROUGH || name == ANY_ROLES;
                    if !reserved && !self.responsibilities.contains_key(name) {
                        return Err(AuthError::unavailable(format!(
                            "policy: {method} {route} references unknown responsibility '{name}'"
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// True when the route+method is marked `@passthrough` (no identity
    /// required at all).
    pub fn is_passthrough(&self, route: &str, method: &str) -> bool {
        self.method_policy(route, method)
            .map(|names| names.iter().any(|n| n == PASSTHROUGH))
            .unwrap_or(false)
    }

    /// RBAC decision: permit iff the caller's roles intersect the roles
    /// allowed for this route+method. Deny-by-default for unlisted entries.
    pub fn authorize(&self, caller_roles: &[Role], route: &str, method: &str) -> AuthResult<()> {
        let Some(names) = self.method_policy(route, method) else {
            return Err(AuthError::Forbidden);
        };

        if names.iter().any(|n| n == PASSTHROUGH) {
            return Ok(());
        }

        let allowed = self.expand_responsibilities(names);
        let permitted = caller_roles
            .iter()
            .any(|role| allowed.contains(role.as_str()));

        if permitted {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    fn method_policy(&self, route: &str, method: &str) -> Option<&[String]> {
        self.routes
            .get(route)
            .and_then(|m| m.get(method))
            .map(Vec::as_slice)
    }

    /// Expand responsibility names into their constituent role names.
    /// `@any-roles` expands to every known role.
    fn expand_responsibilities<'a>(&'a self, names: &'a [String]) -> HashSet<&'a str> {
        let mut out: HashSet<&str> = HashSet::new();
        for name in names {
            if name == ANY_ROLES {
                out.extend(self.roles.iter().map(String::as_str));
            } else if let Some(members) = self.responsibilities.get(name) {
                out.extend(members.iter().map(String::as_str));
            }
        }
        out
    }
}

/// Builder-style helpers for constructing policy in code (tests, defaults).
impl PolicyConfig {
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_responsibility<S, I, R>(mut self, name: S, members: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.responsibilities
            .insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_route<S, M, I, R>(mut self, route: S, method: M, names: I) -> Self
    where
        S: Into<String>,
        M: Into<String>,
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.routes
            .entry(route.into())
            .or_default()
            .insert(method.into(), names.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> PolicyConfig {
        PolicyConfig::default()
            .with_roles(["administrator", "contributor", "staff", "student"])
            .with_responsibility("manager", ["administrator", "staff"])
            .with_responsibility("admin-only", ["administrator"])
            .with_responsibility("journalist", ["contributor", "staff", "student"])
            .with_route("/v1/users", "GET", ["manager"])
            .with_route("/v1/users", "OPTIONS", [PASSTHROUGH])
            .with_route("/v1/admin", "POST", ["admin-only"])
            .with_route("/v1/profile", "GET", [ANY_ROLES])
    }

    #[test]
    fn staff_permitted_via_manager_responsibility() {
        let policy = sample_policy();
        let roles = vec![Role::new("staff")];
        assert!(policy.authorize(&roles, "/v1/users", "GET").is_ok());
    }

    #[test]
    fn staff_denied_on_admin_only_route() {
        let policy = sample_policy();
        let roles = vec![Role::new("staff")];
        assert_eq!(
            policy.authorize(&roles, "/v1/admin", "POST").unwrap_err(),
            AuthError::Forbidden
        );
    }

    #[test]
    fn unlisted_route_denies_by_default() {
        let policy = sample_policy();
        let roles = vec![Role::new("administrator")];
        assert!(policy.authorize(&roles, "/v1/unknown", "GET").is_err());
        // listed route, unlisted method
        assert!(policy.authorize(&roles, "/v1/users", "DELETE").is_err());
    }

    #[test]
    fn any_roles_accepts_every_known_role() {
        let policy = sample_policy();
        for role in ["administrator", "contributor", "staff", "student"] {
            assert!(policy
                .authorize(&[Role::new(role.to_string())], "/v1/profile", "GET")
                .is_ok());
        }
    }

    #[test]
    fn passthrough_permits_without_roles() {
        let policy = sample_policy();
        assert!(policy.authorize(&[], "/v1/users", "OPTIONS").is_ok());
        assert!(policy.is_passthrough("/v1/users", "OPTIONS"));
        assert!(!policy.is_passthrough("/v1/users", "GET"));
    }

    #[test]
    fn caller_with_no_roles_is_denied() {
        let policy = sample_policy();
        assert!(policy.authorize(&[], "/v1/profile", "GET").is_err());
    }

    #[test]
    fn validate_rejects_unknown_role_in_responsibility() {
        let policy = PolicyConfig::default()
            .with_roles(["staff"])
            .with_responsibility("manager", ["administrator"]);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_responsibility_in_route() {
        let policy = PolicyConfig::default()
            .with_roles(["staff"])
            .with_route("/v1/users", "GET", ["manager"]);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn validate_accepts_reserved_markers() {
        let policy = sample_policy();
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn policy_deserializes_from_json() {
        let json = serde_json::json!({
            "roles": ["administrator", "staff"],
            "responsibilities": {"manager": ["administrator", "staff"]},
            "routes": {"/v1/users": {"GET": ["manager"], "OPTIONS": ["@passthrough"]}}
        });
        let policy: PolicyConfig = serde_json::from_value(json).unwrap();
        assert!(policy.validate().is_ok());
        assert!(policy
            .authorize(&[Role::new("staff")], "/v1/users", "GET")
            .is_ok());
    }
}
