//! Route guard: decides whether a navigation proceeds or redirects.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use backoffice_auth::routes::{FORBIDDEN_PATH, LOGIN_PATH};
use backoffice_auth::{AuthzError, RouteTable, authorize};

use crate::session::SessionContext;

pub const REDIRECT_QUERY: &str = "redirect";
pub const REQUIRED_QUERY: &str = "required";

/// Outcome of evaluating one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GuardVerdict {
    Allowed,
    /// Send the user to the login page; `redirect` is where they were going.
    RedirectLogin { redirect: String },
    /// Authenticated but missing grants; `required` lists what is missing.
    RedirectForbidden { required: String },
}

impl GuardVerdict {
    pub fn into_navigation(self) -> Navigation {
        match self {
            GuardVerdict::Allowed => Navigation::Proceed,
            GuardVerdict::RedirectLogin { redirect } => {
                Navigation::Redirect(Location::new(LOGIN_PATH).with_query(REDIRECT_QUERY, redirect))
            }
            GuardVerdict::RedirectForbidden { required } => {
                Navigation::Redirect(
                    Location::new(FORBIDDEN_PATH).with_query(REQUIRED_QUERY, required),
                )
            }
        }
    }
}

/// Router-level target: path plus query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn to_href(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// The router's `(to, from, next)` contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    Redirect(Location),
}

#[async_trait]
pub trait NavigationGuard: Send + Sync {
    async fn before_each(&self, to: &str, from: &str) -> Navigation;
}

/// Guards navigation with the route table and the session.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: SessionContext,
    routes: Arc<RouteTable>,
}

impl RouteGuard {
    pub fn new(session: SessionContext, routes: Arc<RouteTable>) -> Self {
        Self { session, routes }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decide the fate of a navigation to `to` (full path, query included).
    ///
    /// Apart from the silent profile reload (and the forced logout a 401
    /// triggers), this has no side effects: re-evaluating with an unchanged
    /// session yields the same verdict.
    pub async fn evaluate(&self, to: &str) -> GuardVerdict {
        let rule = self.routes.rule_for(to);
        if !rule.requires_auth {
            return GuardVerdict::Allowed;
        }

        if !self.session.check_auth() && !self.silent_reload().await {
            tracing::info!(route = %to, "navigation requires login");
            return GuardVerdict::RedirectLogin {
                redirect: to.to_string(),
            };
        }

        let verdict = self.session.evaluate(|ev| match authorize(ev, &rule) {
            Ok(()) => GuardVerdict::Allowed,
            Err(AuthzError::Unauthenticated) => GuardVerdict::RedirectLogin {
                redirect: to.to_string(),
            },
            Err(AuthzError::Forbidden(unmet)) => GuardVerdict::RedirectForbidden {
                required: unmet.required(),
            },
        });

        if let GuardVerdict::RedirectForbidden { required } = &verdict {
            tracing::info!(route = %to, %required, "navigation forbidden");
        }
        verdict
    }

    /// One reload attempt with the stored token; true when it authenticated
    /// the session.
    ///
    /// Rapid navigations share the same in-flight reload.
    async fn silent_reload(&self) -> bool {
        if self.session.token().is_none() {
            return false;
        }

        match self.session.load_profile().await {
            Ok(()) => self.session.check_auth(),
            Err(err) => {
                // A 401 has already purged the session inside `load_profile`.
                tracing::info!("silent profile reload failed: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl NavigationGuard for RouteGuard {
    async fn before_each(&self, to: &str, from: &str) -> Navigation {
        let verdict = self.evaluate(to).await;
        tracing::debug!(%to, %from, ?verdict, "route guard");
        verdict.into_navigation()
    }
}

/// Minimal router front: runs the guard and tracks the current location.
///
/// A navigation that is overtaken by a newer one while its guard is pending
/// is dropped when the guard completes.
pub struct Navigator<G> {
    guard: G,
    current: Mutex<String>,
    latest: AtomicU64,
}

impl<G: NavigationGuard> Navigator<G> {
    pub fn new(guard: G, start: impl Into<String>) -> Self {
        Self {
            guard,
            current: Mutex::new(start.into()),
            latest: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> String {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Navigate to `to`; returns where the user ended up, or `None` when a
    /// newer navigation superseded this one.
    pub async fn navigate(&self, to: &str) -> Option<String> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let from = self.current();

        let navigation = self.guard.before_each(to, &from).await;

        if self.latest.load(Ordering::SeqCst) != ticket {
            tracing::debug!(%to, "navigation superseded");
            return None;
        }

        let target = match navigation {
            Navigation::Proceed => to.to_string(),
            Navigation::Redirect(location) => location.to_href(),
        };
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = target.clone();
        Some(target)
    }
}

impl<G> core::fmt::Debug for Navigator<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Navigator").finish_non_exhaustive()
    }
}
