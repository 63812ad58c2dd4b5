use thiserror::Error;

/// Failures of authentication flows and authenticated backend calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("two-factor verification required for {email}")]
    TwoFactorRequired { email: String },

    /// The backend rejected the token (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl AuthError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Unauthorized)
    }
}

impl From<backoffice_core::DomainError> for AuthError {
    fn from(value: backoffice_core::DomainError) -> Self {
        AuthError::Unknown(value.to_string())
    }
}
