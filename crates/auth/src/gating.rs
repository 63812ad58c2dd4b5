//! Permission-gated presentation of UI elements.
//!
//! Framework-agnostic: a UI layer asks for a [`Presentation`] and renders it
//! however it likes (wrapper component, render prop, ...).

use serde::{Deserialize, Serialize};

use crate::{Permission, PermissionEvaluator, Role};

/// What to do with an element whose requirement is not met.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    #[default]
    Hide,
    Disable,
}

/// Resolved presentation of a gated element. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    Visible,
    /// Removed from layout, not merely transparent.
    Hidden,
    /// Keeps its layout slot, dimmed, non-interactive, `aria-disabled`.
    Disabled,
}

impl Presentation {
    pub fn resolve(granted: bool, fallback: Fallback) -> Self {
        match (granted, fallback) {
            (true, _) => Presentation::Visible,
            (false, Fallback::Hide) => Presentation::Hidden,
            (false, Fallback::Disable) => Presentation::Disabled,
        }
    }

    pub fn occupies_layout(&self) -> bool {
        !matches!(self, Presentation::Hidden)
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Presentation::Visible)
    }

    pub fn is_dimmed(&self) -> bool {
        matches!(self, Presentation::Disabled)
    }

    /// Value for the element's `aria-disabled` attribute, if any.
    pub fn aria_disabled(&self) -> Option<&'static str> {
        self.is_dimmed().then_some("true")
    }
}

/// Declarative binding of one element, e.g. `{ "permissions": [...], "fallback": "disable" }`.
///
/// Single and list forms are merged. Permissions and roles must both hold;
/// an empty binding is always visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateBinding {
    pub permission: Option<Permission>,
    pub permissions: Vec<Permission>,
    pub role: Option<Role>,
    pub roles: Vec<Role>,
    pub require_all: bool,
    pub fallback: Fallback,
}

impl GateBinding {
    pub fn permission(key: impl Into<Permission>) -> Self {
        Self {
            permission: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn permissions<I, P>(keys: I, require_all: bool) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self {
            permissions: keys.into_iter().map(Into::into).collect(),
            require_all,
            ..Self::default()
        }
    }

    pub fn role(name: impl Into<Role>) -> Self {
        Self {
            role: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.permission.is_none()
            && self.permissions.is_empty()
            && self.role.is_none()
            && self.roles.is_empty()
    }

    pub fn is_granted(&self, evaluator: &PermissionEvaluator<'_>) -> bool {
        let permissions = self.permission.iter().chain(&self.permissions);
        let roles = self.role.iter().chain(&self.roles);

        evaluator.has_permissions(permissions, self.require_all)
            && evaluator.has_roles(roles, self.require_all)
    }

    pub fn evaluate(&self, evaluator: &PermissionEvaluator<'_>) -> Presentation {
        Presentation::resolve(self.is_granted(evaluator), self.fallback)
    }
}

/// Conditional render driven by an arbitrary predicate over the evaluator.
pub struct ConditionalRender<P> {
    predicate: P,
    fallback: Fallback,
}

impl<P> ConditionalRender<P> {
    pub fn new(predicate: P) -> Self
    where
        P: Fn(&PermissionEvaluator<'_>) -> bool,
    {
        Self {
            predicate,
            fallback: Fallback::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn evaluate(&self, evaluator: &PermissionEvaluator<'_>) -> Presentation
    where
        P: Fn(&PermissionEvaluator<'_>) -> bool,
    {
        Presentation::resolve((self.predicate)(evaluator), self.fallback)
    }
}

impl<P> core::fmt::Debug for ConditionalRender<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConditionalRender")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
