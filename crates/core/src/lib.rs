//! `backoffice-core` — shared building blocks for the back-office client.
//!
//! This crate contains identifiers and the validation error model only
//! (no IO, no HTTP, no storage).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
