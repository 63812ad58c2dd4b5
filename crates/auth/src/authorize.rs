use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Permission, PermissionEvaluator, Role};

/// Access rule attached to a navigable route.
///
/// Declared statically per route and never mutated at runtime. Required
/// permissions and required roles must both be satisfied; each list follows
/// the evaluator's AND/OR semantics selected by `require_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAccessRule {
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub required_permissions: Vec<Permission>,
    #[serde(default)]
    pub required_roles: Vec<Role>,
    #[serde(default)]
    pub require_all: bool,
}

impl RouteAccessRule {
    /// Reachable without a session (login page, error pages).
    pub fn public() -> Self {
        Self::default()
    }

    /// Any authenticated user.
    pub fn authenticated() -> Self {
        Self {
            requires_auth: true,
            ..Self::default()
        }
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.requires_auth = true;
        self.required_permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        self.requires_auth = true;
        self.required_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    pub fn has_requirements(&self) -> bool {
        !self.required_permissions.is_empty() || !self.required_roles.is_empty()
    }
}

/// The part of a rule the session did not satisfy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Unmet {
    pub permissions: Vec<Permission>,
    pub roles: Vec<Role>,
}

impl Unmet {
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty() && self.roles.is_empty()
    }

    /// Comma-separated unmet keys, permissions first (forbidden page query).
    pub fn required(&self) -> String {
        self.permissions
            .iter()
            .map(Permission::as_str)
            .chain(self.roles.iter().map(Role::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: missing '{}'", .0.required())]
    Forbidden(Unmet),
}

/// Check a route rule against a session.
///
/// - No IO
/// - No panics
pub fn authorize(
    evaluator: &PermissionEvaluator<'_>,
    rule: &RouteAccessRule,
) -> Result<(), AuthzError> {
    if !rule.requires_auth {
        return Ok(());
    }
    if !evaluator.check_auth() {
        return Err(AuthzError::Unauthenticated);
    }

    let unmet = unmet(evaluator, rule);
    if unmet.is_empty() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(unmet))
    }
}

fn unmet(evaluator: &PermissionEvaluator<'_>, rule: &RouteAccessRule) -> Unmet {
    let mut unmet = Unmet::default();

    if !evaluator.has_permissions(&rule.required_permissions, rule.require_all) {
        // With OR semantics nothing was held, so every listed key is reported.
        unmet.permissions = rule
            .required_permissions
            .iter()
            .filter(|p| !evaluator.has_permission(p))
            .cloned()
            .collect();
    }

    if !evaluator.has_roles(&rule.required_roles, rule.require_all) {
        unmet.roles = rule
            .required_roles
            .iter()
            .filter(|r| !evaluator.has_role(r))
            .cloned()
            .collect();
    }

    unmet
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an access decision (CLI output, debug logs).
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub granted: bool,
    pub reason: String,
    pub authenticated: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub unmet: Option<Unmet>,
}

/// Explain why `rule` is (or would be) granted or denied for the session.
pub fn explain(
    evaluator: &PermissionEvaluator<'_>,
    rule: &RouteAccessRule,
) -> AuthorizationExplanation {
    let session = evaluator.session();
    let authenticated = evaluator.check_auth();
    let roles = session.roles().iter().map(|r| r.as_str().to_string()).collect();
    let permissions = session.permissions().iter().map(|p| p.as_str().to_string()).collect();

    let (granted, reason, unmet) = match authorize(evaluator, rule) {
        Ok(()) if !rule.requires_auth => (true, "route is public".to_string(), None),
        Ok(()) if !rule.has_requirements() => {
            (true, "route only requires an authenticated session".to_string(), None)
        }
        Ok(()) => (
            true,
            format!(
                "session satisfies the route requirements ({})",
                if rule.require_all { "all required" } else { "any suffices" }
            ),
            None,
        ),
        Err(AuthzError::Unauthenticated) => {
            (false, "route requires an authenticated session".to_string(), None)
        }
        Err(AuthzError::Forbidden(unmet)) => (
            false,
            format!("session is missing: {}", unmet.required()),
            Some(unmet),
        ),
    };

    AuthorizationExplanation {
        granted,
        reason,
        authenticated,
        roles,
        permissions,
        unmet,
    }
}
