//! `backoffice-auth` — pure client-side authorization model.
//!
//! Session snapshot, permission evaluation, route access rules and UI gating
//! decisions. This crate is intentionally decoupled from HTTP, storage and
//! any rendering framework.

pub mod authorize;
pub mod catalog;
pub mod evaluator;
pub mod gating;
pub mod permissions;
pub mod roles;
pub mod routes;
pub mod session;

pub use authorize::{
    AuthorizationExplanation, AuthzError, RouteAccessRule, Unmet, authorize, explain,
};
pub use evaluator::PermissionEvaluator;
pub use gating::{ConditionalRender, Fallback, GateBinding, Presentation};
pub use permissions::Permission;
pub use roles::Role;
pub use routes::RouteTable;
pub use session::{Session, UserProfile};
