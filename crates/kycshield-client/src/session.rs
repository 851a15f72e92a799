//! Session context
//!
//! Holds the bearer token obtained at login. A `Session` is handed to the
//! verification client at construction instead of being read from ambient
//! global state.

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::info;

/// Token pair returned by `POST /api/v1/auth/login` and `/refresh`
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AccessToken {
    /// Wrap a token obtained out of band (CLI flag, environment)
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_in: None,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Per-user session state
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<AccessToken>>,
}

impl Session {
    /// Unauthenticated session
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that already carries a token
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            token: RwLock::new(Some(token)),
        }
    }

    /// Store a token (login)
    pub fn set(&self, token: AccessToken) {
        info!(expires_in = ?token.expires_in, "Session authenticated");
        *self.token.write() = Some(token);
    }

    /// Drop the token (logout)
    pub fn clear(&self) {
        if self.token.write().take().is_some() {
            info!("Session cleared");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Raw bearer token value, if any
    pub fn bearer(&self) -> Option<String> {
        self.token.read().as_ref().map(|t| t.access_token.clone())
    }

    /// Refresh token from the last login, if the service issued one
    pub fn refresh_token(&self) -> Option<String> {
        self.token.read().as_ref().and_then(|t| t.refresh_token.clone())
    }
}
