//! Permission and role queries over a session snapshot.
//!
//! - No IO
//! - No side effects
//! - Reactive callers re-evaluate against each new snapshot

use crate::{Role, Session};

#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator<'a> {
    session: &'a Session,
}

impl<'a> PermissionEvaluator<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }

    /// Whether the session holds a verified identity.
    pub fn check_auth(&self) -> bool {
        self.session.is_authenticated() && self.session.user().is_some()
    }

    /// Exact membership of `key` in the session's permission set.
    ///
    /// Always false for an unauthenticated session.
    pub fn has_permission(&self, key: impl AsRef<str>) -> bool {
        self.check_auth() && self.session.permissions().contains(key.as_ref())
    }

    /// AND (`require_all`) or OR over [`Self::has_permission`].
    ///
    /// An empty key list is satisfied regardless of `require_all`. Route rules
    /// and gates rely on this: no listed permission means no restriction.
    pub fn has_permissions<I, K>(&self, keys: I, require_all: bool) -> bool
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        all_or_any(keys, require_all, |k| self.has_permission(k))
    }

    /// Membership of `name` among all roles assigned to the user.
    pub fn has_role(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.check_auth() && self.session.roles().iter().any(|r| r.as_str() == name)
    }

    /// Same AND/OR and empty-list rules as [`Self::has_permissions`].
    pub fn has_roles<I, K>(&self, names: I, require_all: bool) -> bool
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        all_or_any(names, require_all, |r| self.has_role(r))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::ADMIN)
    }

    pub fn is_manager(&self) -> bool {
        self.has_role(Role::MANAGER)
    }

    pub fn is_visitor(&self) -> bool {
        self.has_role(Role::VISITOR)
    }
}

fn all_or_any<I, K, F>(items: I, require_all: bool, check: F) -> bool
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
    F: Fn(&str) -> bool,
{
    let mut items = items.into_iter().peekable();
    if items.peek().is_none() {
        return true;
    }

    if require_all {
        items.all(|k| check(k.as_ref()))
    } else {
        items.any(|k| check(k.as_ref()))
    }
}
