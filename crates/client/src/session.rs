//! Session container: the single owner of the client's [`Session`].
//!
//! Created once at startup ([`SessionContext::bootstrap`]) and handed to the
//! guard, gates and UI by cloning the handle. The session only changes
//! through the methods below, and every change is persisted to (or cleared
//! from) durable storage.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use backoffice_auth::{PermissionEvaluator, Session, UserProfile};

use crate::backend::{AuthBackend, Credentials, LoginOutcome};
use crate::cache::{Coalescer, PermissionCache};
use crate::error::AuthError;
use crate::storage::{PersistedSession, TokenStore};

const PROFILE_KEY: &str = "profile";

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    /// The backend rejected the token; the session was purged and the UI
    /// should send the user to the login page.
    Expired,
}

#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<Session>,
    events: broadcast::Sender<SessionEvent>,
    profiles: PermissionCache<UserProfile>,
    reloads: Coalescer<(), AuthError>,
}

impl SessionContext {
    /// Build the context from whatever durable storage holds.
    ///
    /// Reads storage exactly once and performs no network call.
    pub fn bootstrap(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        cache_ttl: Duration,
    ) -> Self {
        let session = match store.load() {
            Ok(Some(persisted)) => persisted.into_session(),
            Ok(None) => Session::anonymous(),
            Err(err) => {
                tracing::warn!("failed to load persisted session, starting anonymous: {err:?}");
                Session::anonymous()
            }
        };

        tracing::info!(
            authenticated = session.is_authenticated(),
            has_token = session.token().is_some(),
            "session bootstrapped"
        );

        Self::with_session(backend, store, cache_ttl, session)
    }

    fn with_session(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        cache_ttl: Duration,
        session: Session,
    ) -> Self {
        let (state, _) = watch::channel(session);
        let (events, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                state,
                events,
                profiles: PermissionCache::new(cache_ttl),
                reloads: Coalescer::new(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Reactive read: yields a new snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token().map(str::to_string)
    }

    /// Run `f` against the current snapshot without cloning it.
    pub fn evaluate<R>(&self, f: impl FnOnce(&PermissionEvaluator<'_>) -> R) -> R {
        let session = self.inner.state.borrow();
        f(&session.evaluator())
    }

    pub fn check_auth(&self) -> bool {
        self.evaluate(|ev| ev.check_auth())
    }

    pub fn has_permission(&self, key: impl AsRef<str>) -> bool {
        self.evaluate(|ev| ev.has_permission(key))
    }

    pub fn has_permissions<I, K>(&self, keys: I, require_all: bool) -> bool
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.evaluate(|ev| ev.has_permissions(keys, require_all))
    }

    pub fn has_role(&self, name: impl AsRef<str>) -> bool {
        self.evaluate(|ev| ev.has_role(name))
    }

    pub fn has_roles<I, K>(&self, names: I, require_all: bool) -> bool
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.evaluate(|ev| ev.has_roles(names, require_all))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Exchange credentials for a session.
    ///
    /// On [`AuthError::TwoFactorRequired`] the session stays unauthenticated
    /// and remembers the e-mail awaiting a code. Other failures leave the
    /// session untouched.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let outcome = self.inner.backend.login(credentials).await;
        self.complete_exchange(outcome)
    }

    /// Finish a login that was interrupted by a two-factor challenge.
    pub async fn verify_two_factor(&self, code: &str) -> Result<(), AuthError> {
        let email = self
            .inner
            .state
            .borrow()
            .pending_verification()
            .map(str::to_string)
            .ok_or_else(|| {
                AuthError::Unknown("no two-factor verification is pending".to_string())
            })?;

        self.verify_two_factor_for(&email, code).await
    }

    /// Verify a code for `email` without a pending challenge in this process
    /// (the challenge was issued to an earlier run of the CLI).
    pub async fn verify_two_factor_for(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let outcome = self.inner.backend.verify_two_factor(email, code).await;
        self.complete_exchange(outcome)
    }

    fn complete_exchange(&self, outcome: Result<LoginOutcome, AuthError>) -> Result<(), AuthError> {
        match outcome {
            Ok(LoginOutcome::Authenticated { token, user }) => {
                let session = Session::authenticated(token, user)?;
                tracing::info!(
                    user_id = ?session.user_id(),
                    roles = session.roles().len(),
                    "logged in"
                );

                self.inner.profiles.invalidate_all();
                if let Some(user) = session.user() {
                    self.inner.profiles.set(PROFILE_KEY, user.clone());
                }
                self.replace(session);
                let _ = self.inner.events.send(SessionEvent::LoggedIn);
                Ok(())
            }
            Ok(LoginOutcome::TwoFactorRequired { email }) => {
                tracing::info!(%email, "two-factor verification required");
                self.replace(Session::awaiting_verification(email.clone()));
                Err(AuthError::TwoFactorRequired { email })
            }
            Err(err) => {
                tracing::warn!("login failed: {err}");
                Err(err)
            }
        }
    }

    /// End the session.
    ///
    /// The server call is best effort: local state is cleared even when it
    /// fails.
    pub async fn logout(&self) {
        if let Some(token) = self.token() {
            if let Err(err) = self.inner.backend.logout(&token).await {
                tracing::warn!("server logout failed, clearing local session anyway: {err}");
            }
        }

        self.clear();
        tracing::info!("logged out");
        let _ = self.inner.events.send(SessionEvent::LoggedOut);
    }

    /// Swap the current token for a fresh one.
    pub async fn refresh_token(&self) -> Result<(), AuthError> {
        let token = self.token().ok_or(AuthError::Unauthorized)?;
        let result = self.inner.backend.refresh_token(&token).await;
        let new_token = self.intercept(&token, result)?;

        let current = self.snapshot();
        if current.token() != Some(token.as_str()) {
            tracing::debug!("session changed during token refresh; dropping result");
            return Ok(());
        }

        self.replace(current.with_refreshed_token(new_token)?);
        tracing::debug!("token refreshed");
        Ok(())
    }

    /// Reload the profile (identity, roles, permissions) with the current token.
    ///
    /// Concurrent callers with the same token share a single backend request.
    pub async fn load_profile(&self) -> Result<(), AuthError> {
        let token = self.token().ok_or(AuthError::Unauthorized)?;
        let key = format!("{PROFILE_KEY}:{token}");
        let inner = self.inner.clone();
        let sent_with = token.clone();

        let result = self
            .inner
            .reloads
            .run(&key, move || async move {
                let profile = inner.backend.fetch_profile(&sent_with).await?;
                Inner::apply_profile(&inner, &sent_with, profile)
            })
            .await;

        self.intercept(&token, result)
    }

    /// Like [`Self::load_profile`], skipped while the cached profile is fresh.
    ///
    /// Returns whether the backend was asked.
    pub async fn refresh_permissions(&self) -> Result<bool, AuthError> {
        if self.check_auth() && self.inner.profiles.is_valid(PROFILE_KEY) {
            tracing::trace!("permission refresh served from cache");
            return Ok(false);
        }

        self.load_profile().await?;
        Ok(true)
    }

    /// Apply the app-wide 401 policy to a backend result obtained with `token`.
    ///
    /// An [`AuthError::Unauthorized`] purges the session and emits
    /// [`SessionEvent::Expired`] before the error is handed back, unless the
    /// session has moved on to another token (or none) in the meantime.
    pub fn intercept<T>(&self, token: &str, result: Result<T, AuthError>) -> Result<T, AuthError> {
        if let Err(AuthError::Unauthorized) = &result {
            self.expire(token);
        }
        result
    }

    /// Forced logout after the backend rejected `token`.
    fn expire(&self, token: &str) {
        // Already purged, or replaced by a newer login.
        if self.token().as_deref() != Some(token) {
            tracing::debug!("ignoring 401 for a token the session no longer holds");
            return;
        }

        tracing::warn!("token rejected by backend, purging session");
        self.clear();
        let _ = self.inner.events.send(SessionEvent::Expired);
    }

    fn clear(&self) {
        self.inner.profiles.invalidate_all();
        self.inner.state.send_replace(Session::anonymous());
        if let Err(err) = self.inner.store.clear() {
            tracing::error!("failed to clear persisted session: {err:?}");
        }
    }

    fn replace(&self, session: Session) {
        Inner::persist(&self.inner, &session);
        self.inner.state.send_replace(session);
    }
}

impl Inner {
    fn apply_profile(
        inner: &Arc<Inner>,
        token: &str,
        profile: UserProfile,
    ) -> Result<(), AuthError> {
        // A logout or re-login while the request was in flight wins.
        if inner.state.borrow().token() != Some(token) {
            tracing::debug!("session changed during profile reload; dropping result");
            return Ok(());
        }

        let session = Session::authenticated(token, profile.clone())?;
        tracing::debug!(
            user_id = ?session.user_id(),
            permissions = session.permissions().len(),
            "profile reloaded"
        );

        inner.profiles.set(PROFILE_KEY, profile);
        Inner::persist(inner, &session);
        inner.state.send_replace(session);
        Ok(())
    }

    fn persist(inner: &Arc<Inner>, session: &Session) {
        let result = match PersistedSession::from_session(session) {
            Some(persisted) => inner.store.save(&persisted),
            None => inner.store.clear(),
        };
        if let Err(err) = result {
            tracing::error!("failed to persist session: {err:?}");
        }
    }
}

impl core::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let session = self.inner.state.borrow();
        f.debug_struct("SessionContext")
            .field("authenticated", &session.is_authenticated())
            .field("user_id", &session.user_id())
            .finish_non_exhaustive()
    }
}
