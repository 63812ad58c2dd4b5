//! Durable client-side storage of the session token and permission snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use backoffice_auth::{Session, UserProfile};

/// What survives a restart: the token and the last known profile.
///
/// The profile lets the dashboard render with the previous grants before the
/// first `GET /profile` completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl PersistedSession {
    /// Snapshot of a session; `None` when there is no token to keep.
    pub fn from_session(session: &Session) -> Option<Self> {
        let token = session.token()?.to_string();
        let user = session
            .is_authenticated()
            .then(|| session.user().cloned())
            .flatten();
        Some(Self { token, user })
    }

    pub fn into_session(self) -> Session {
        match self.user {
            Some(user) => Session::authenticated(self.token.clone(), user).unwrap_or_else(|e| {
                tracing::warn!("discarding persisted profile: {e}");
                Session::with_token(self.token)
            }),
            None => Session::with_token(self.token),
        }
    }
}

/// Client-local durable storage.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<PersistedSession>>;
    fn save(&self, session: &PersistedSession) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// JSON file store (default `{data_dir}/backoffice/session.json`).
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `path`, or at the OS default location when `None`.
    pub fn at(path: Option<PathBuf>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Ok(Self::new(path)),
            None => Ok(Self::new(default_session_path()?)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> anyhow::Result<Option<PersistedSession>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read session file at {:?}", self.path));
            }
        };

        let session = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse session file at {:?}", self.path))?;
        Ok(Some(session))
    }

    fn save(&self, session: &PersistedSession) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create session directory at {:?}", parent))?;
        }

        let payload = serde_json::to_string_pretty(session).context("failed to serialize session")?;
        std::fs::write(&self.path, payload)
            .with_context(|| format!("failed to write session file at {:?}", self.path))?;

        // The file holds a bearer token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to restrict permissions on {:?}", self.path))?;
        }

        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove session file at {:?}", self.path)),
        }
    }
}

/// Process-local store (tests, `--ephemeral` CLI runs).
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: Mutex<Option<PersistedSession>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(session: PersistedSession) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }

    pub fn snapshot(&self) -> Option<PersistedSession> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> anyhow::Result<Option<PersistedSession>> {
        Ok(self.snapshot())
    }

    fn save(&self, session: &PersistedSession) -> anyhow::Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Resolve `{app_data_dir}/backoffice/session.json`.
fn default_session_path() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory (no data_dir or home_dir)")?;

    dir.push("backoffice");
    dir.push("session.json");
    Ok(dir)
}
