//! Client-side session snapshot.
//!
//! A [`Session`] is an immutable value; the session container in
//! `backoffice-client` replaces it wholesale on every transition.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, UserId};

use crate::{Permission, PermissionEvaluator, Role};

/// User profile as returned by the backend (`GET /profile`, `POST /login`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// The authenticated user's client-side state.
///
/// # Invariants
/// - `is_authenticated()` implies a non-empty token and a user profile.
/// - Roles keep the backend's order, without duplicates.
/// - Roles and permissions are only meaningful while authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user: Option<UserProfile>,
    roles: Vec<Role>,
    permissions: BTreeSet<Permission>,
    authenticated: bool,
    pending_verification: Option<String>,
}

impl Session {
    /// No token, no user.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Unauthenticated session that still carries a token from storage.
    ///
    /// The token has not been checked yet; a profile reload decides whether
    /// it is still good.
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
            ..Self::default()
        }
    }

    /// Unauthenticated session waiting for a one-time code sent to `email`.
    pub fn awaiting_verification(email: impl Into<String>) -> Self {
        Self {
            pending_verification: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn authenticated(token: impl Into<String>, profile: UserProfile) -> DomainResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DomainError::validation("session token must not be empty"));
        }

        let mut roles: Vec<Role> = Vec::with_capacity(profile.roles.len());
        for role in &profile.roles {
            if !roles.contains(role) {
                roles.push(role.clone());
            }
        }
        let permissions = profile.permissions.iter().cloned().collect();

        Ok(Self {
            token: Some(token),
            user: Some(profile),
            roles,
            permissions,
            authenticated: true,
            pending_verification: None,
        })
    }

    /// Same identity and grants, new token.
    pub fn with_refreshed_token(&self, token: impl Into<String>) -> DomainResult<Self> {
        match &self.user {
            Some(profile) if self.authenticated => Self::authenticated(token, profile.clone()),
            _ => Ok(Self::with_token(token)),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.display_name.as_str())
    }

    pub fn user_type(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.user_type.as_deref())
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    pub fn pending_verification(&self) -> Option<&str> {
        self.pending_verification.as_deref()
    }

    pub fn evaluator(&self) -> PermissionEvaluator<'_> {
        PermissionEvaluator::new(self)
    }
}
