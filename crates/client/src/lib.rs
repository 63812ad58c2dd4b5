//! `backoffice-client`
//!
//! **Responsibility:** client-side session and access control for the
//! back-office dashboard.
//!
//! This crate provides:
//! - The session container (login/logout/token refresh/profile reload)
//! - Route guarding of navigation attempts
//! - Reactive UI gates
//! - A short-TTL permission cache with in-flight request coalescing
//!
//! The backend stays the authority; this crate only mirrors what it grants.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod guard;
pub mod session;
pub mod storage;

pub use backend::{AuthBackend, Credentials, HttpAuthBackend, LoginOutcome};
pub use cache::{Coalescer, PermissionCache};
pub use config::ClientConfig;
pub use error::AuthError;
pub use gate::Gate;
pub use guard::{GuardVerdict, Location, Navigation, NavigationGuard, Navigator, RouteGuard};
pub use session::{SessionContext, SessionEvent};
pub use storage::{FileTokenStore, MemoryTokenStore, PersistedSession, TokenStore};
