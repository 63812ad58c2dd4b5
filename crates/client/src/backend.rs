//! REST backend client for authentication and profile calls.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use backoffice_auth::UserProfile;

use crate::config::ClientConfig;
use crate::error::AuthError;

/// Login form payload.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a successful credential exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated { token: String, user: UserProfile },
    /// A one-time code was sent to `email`; finish with `verify_two_factor`.
    TwoFactorRequired { email: String },
}

/// Backend endpoints the session container depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST /login`
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, AuthError>;

    /// `POST /verify-2fa`
    async fn verify_two_factor(&self, email: &str, code: &str) -> Result<LoginOutcome, AuthError>;

    /// `GET /profile`
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, AuthError>;

    /// `POST /refresh-token`, returns the replacement token.
    async fn refresh_token(&self, token: &str) -> Result<String, AuthError>;

    /// `POST /logout`
    async fn logout(&self, token: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LoginResponse {
    Token { token: String, user: UserProfile },
    TwoFactor { two_factor_required: bool, email: String },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    code: &'a str,
}

/// `reqwest`-backed implementation of [`AuthBackend`].
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    api_url: String,
    client: reqwest::Client,
}

impl HttpAuthBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::Unknown(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn exchange(&self, req: reqwest::RequestBuilder) -> Result<LoginOutcome, AuthError> {
        let resp = req.send().await.map_err(network)?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                return Err(AuthError::InvalidCredentials);
            }
            s if !s.is_success() => return Err(unexpected_status(resp).await),
            _ => {}
        }

        match resp.json::<LoginResponse>().await.map_err(decode)? {
            LoginResponse::Token { token, user } => Ok(LoginOutcome::Authenticated { token, user }),
            LoginResponse::TwoFactor {
                two_factor_required: true,
                email,
            } => Ok(LoginOutcome::TwoFactorRequired { email }),
            LoginResponse::TwoFactor { .. } => Err(AuthError::Unknown(
                "login response carried neither a token nor a two-factor challenge".to_string(),
            )),
        }
    }

    /// Send an authenticated request; 401 maps to [`AuthError::Unauthorized`].
    async fn authorized(
        &self,
        req: reqwest::RequestBuilder,
        token: &str,
    ) -> Result<reqwest::Response, AuthError> {
        let resp = req.bearer_auth(token).send().await.map_err(network)?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(AuthError::Unauthorized),
            s if s.is_success() => Ok(resp),
            _ => Err(unexpected_status(resp).await),
        }
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, AuthError> {
        tracing::debug!(email = %credentials.email, "POST /login");
        self.exchange(self.client.post(self.url("/login")).json(credentials)).await
    }

    async fn verify_two_factor(&self, email: &str, code: &str) -> Result<LoginOutcome, AuthError> {
        tracing::debug!(%email, "POST /verify-2fa");
        self.exchange(
            self.client
                .post(self.url("/verify-2fa"))
                .json(&VerifyRequest { email, code }),
        )
        .await
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, AuthError> {
        let resp = self.authorized(self.client.get(self.url("/profile")), token).await?;
        resp.json().await.map_err(decode)
    }

    async fn refresh_token(&self, token: &str) -> Result<String, AuthError> {
        let resp = self
            .authorized(self.client.post(self.url("/refresh-token")), token)
            .await?;
        let body: TokenResponse = resp.json().await.map_err(decode)?;
        Ok(body.token)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.authorized(self.client.post(self.url("/logout")), token).await?;
        Ok(())
    }
}

fn network(e: reqwest::Error) -> AuthError {
    AuthError::NetworkError(e.to_string())
}

fn decode(e: reqwest::Error) -> AuthError {
    AuthError::Unknown(format!("invalid response body: {e}"))
}

async fn unexpected_status(resp: reqwest::Response) -> AuthError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    AuthError::Unknown(format!("API error ({status}): {body}"))
}
