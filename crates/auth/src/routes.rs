//! Static route declarations.

use crate::catalog::keys;
use crate::{Role, RouteAccessRule};

pub const LOGIN_PATH: &str = "/login";
pub const FORBIDDEN_PATH: &str = "/forbidden";

/// Route pattern → access rule.
///
/// Patterns are `/`-separated; a segment starting with `:` matches any single
/// segment. The first declared matching pattern wins. Unknown paths get
/// [`RouteAccessRule::authenticated`].
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(String, RouteAccessRule)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, pattern: impl Into<String>, rule: RouteAccessRule) -> Self {
        let pattern = pattern.into();
        for p in rule.required_permissions.iter().filter(|p| !p.is_catalogued()) {
            tracing::warn!(
                route = %pattern,
                permission = %p,
                "route references a permission outside the catalog"
            );
        }
        self.routes.push((pattern, rule));
        self
    }

    /// Rule of the first pattern matching `path` (query string and fragment ignored).
    pub fn lookup(&self, path: &str) -> Option<&RouteAccessRule> {
        let path = strip_query(path);
        self.routes
            .iter()
            .find(|(pattern, _)| matches(pattern, path))
            .map(|(_, rule)| rule)
    }

    /// Like [`Self::lookup`], failing closed for undeclared paths.
    pub fn rule_for(&self, path: &str) -> RouteAccessRule {
        self.lookup(path)
            .cloned()
            .unwrap_or_else(RouteAccessRule::authenticated)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(p, _)| p.as_str())
    }

    /// Route declarations of the administrative dashboard.
    pub fn dashboard() -> Self {
        Self::new()
            .declare(LOGIN_PATH, RouteAccessRule::public())
            .declare("/verify", RouteAccessRule::public())
            .declare(FORBIDDEN_PATH, RouteAccessRule::public())
            .declare("/not-found", RouteAccessRule::public())
            .declare("/", RouteAccessRule::authenticated())
            .declare("/dashboard", RouteAccessRule::authenticated())
            .declare("/profile", RouteAccessRule::authenticated())
            .declare(
                "/trainings",
                RouteAccessRule::authenticated().with_permissions([keys::VIEW_TRAINING]),
            )
            .declare(
                "/trainings/create",
                RouteAccessRule::authenticated().with_permissions([keys::CREATE_TRAINING]),
            )
            .declare(
                "/trainings/:id",
                RouteAccessRule::authenticated().with_permissions([keys::VIEW_TRAINING]),
            )
            .declare(
                "/trainings/:id/edit",
                RouteAccessRule::authenticated().with_permissions([keys::EDIT_TRAINING]),
            )
            .declare(
                "/job-offers",
                RouteAccessRule::authenticated().with_permissions([keys::VIEW_JOB_OFFER]),
            )
            .declare(
                "/job-offers/create",
                RouteAccessRule::authenticated().with_permissions([keys::CREATE_JOB_OFFER]),
            )
            .declare(
                "/job-offers/:id",
                RouteAccessRule::authenticated().with_permissions([keys::VIEW_JOB_OFFER]),
            )
            .declare(
                "/job-offers/:id/edit",
                RouteAccessRule::authenticated().with_permissions([keys::EDIT_JOB_OFFER]),
            )
            .declare(
                "/applications",
                RouteAccessRule::authenticated().with_permissions([keys::VIEW_CABINET_APPLICATION]),
            )
            .declare(
                "/applications/:id",
                RouteAccessRule::authenticated()
                    .with_permissions([
                        keys::VIEW_CABINET_APPLICATION,
                        keys::REVIEW_CABINET_APPLICATION,
                    ])
                    .require_all(true),
            )
            .declare(
                "/payments",
                RouteAccessRule::authenticated().with_permissions([keys::VIEW_PAYMENT]),
            )
            .declare("/users", RouteAccessRule::authenticated().with_permissions([keys::VIEW_USER]))
            .declare(
                "/users/create",
                RouteAccessRule::authenticated().with_permissions([keys::CREATE_USER]),
            )
            .declare(
                "/users/:id/edit",
                RouteAccessRule::authenticated().with_permissions([keys::EDIT_USER]),
            )
            .declare(
                "/roles",
                RouteAccessRule::authenticated()
                    .with_permissions([keys::VIEW_ROLE])
                    .with_roles([Role::ADMIN, Role::MANAGER]),
            )
            .declare(
                "/permissions",
                RouteAccessRule::authenticated()
                    .with_permissions([keys::VIEW_PERMISSION])
                    .with_roles([Role::ADMIN]),
            )
    }
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

fn matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = segments(pattern);
    let mut path_segments = segments(path);

    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) if p.starts_with(':') || p == s => continue,
            _ => return false,
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_routes_win_over_params_when_declared_first() {
        let table = RouteTable::dashboard();
        let rule = table.rule_for("/job-offers/create");
        assert_eq!(rule.required_permissions[0].as_str(), keys::CREATE_JOB_OFFER);

        let rule = table.rule_for("/job-offers/42");
        assert_eq!(rule.required_permissions[0].as_str(), keys::VIEW_JOB_OFFER);
    }

    #[test]
    fn query_and_trailing_slash_are_ignored() {
        let table = RouteTable::dashboard();
        assert_eq!(
            table.lookup("/users/?page=2"),
            table.lookup("/users"),
        );
        assert!(table.lookup("/users#top").is_some());
    }

    #[test]
    fn public_pages_are_public() {
        let table = RouteTable::dashboard();
        assert!(!table.rule_for(LOGIN_PATH).requires_auth);
        assert!(!table.rule_for(FORBIDDEN_PATH).requires_auth);
    }

    #[test]
    fn unknown_paths_fail_closed() {
        let table = RouteTable::dashboard();
        assert!(table.lookup("/internal/metrics").is_none());
        assert_eq!(table.rule_for("/internal/metrics"), RouteAccessRule::authenticated());
    }

    #[test]
    fn root_only_matches_root() {
        let table = RouteTable::new().declare("/", RouteAccessRule::public());
        assert!(table.lookup("/").is_some());
        assert!(table.lookup("/users").is_none());
    }
}
