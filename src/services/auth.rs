use crate::constants::TOKEN_MAX_AGE_SECONDS;
use crate::error::{ClientError, Result};
use crate::services::api::ApiClient;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub avatar_permanent_url: Option<String>,
    #[serde(default)]
    pub avatar_permanent_thumb_url: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub data: LoginData,
}

/// On-disk session file. The browser client kept the token in a 7-day
/// cookie; here it is a JSON file with an explicit expiry stamp.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    expires_at: i64,
}

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    user: Option<User>,
}

/// Process-wide auth session: the bearer token and the logged-in user.
/// Constructed once at startup and shared; the API client reads the token
/// from here and calls [`Session::invalidate`] on 401.
///
/// Store I/O never fails callers: unreadable, corrupt, or expired session
/// files degrade to "not logged in".
pub struct Session {
    state: Mutex<SessionState>,
    store_path: PathBuf,
}

impl Session {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Session {
            state: Mutex::new(SessionState::default()),
            store_path: store_path.into(),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.state.lock().expect("session state poisoned").token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.lock().expect("session state poisoned").user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let state = self.state.lock().expect("session state poisoned");
        state.token.is_some() && state.user.is_some()
    }

    /// Install a freshly issued token (and user) and persist it with a new
    /// 7-day expiry.
    pub fn establish(&self, token: String, user: User) {
        if let Err(e) = self.persist(&token) {
            tracing::warn!("Failed to persist session token: {}", e);
        }
        let mut state = self.state.lock().expect("session state poisoned");
        state.token = Some(token);
        state.user = Some(user);
    }

    /// Install a restored token without touching the stored expiry.
    pub(crate) fn adopt(&self, token: String) {
        self.state.lock().expect("session state poisoned").token = Some(token);
    }

    pub(crate) fn set_user(&self, user: User) {
        self.state.lock().expect("session state poisoned").user = Some(user);
    }

    /// Drop the in-memory session and the stored token.
    pub fn invalidate(&self) {
        {
            let mut state = self.state.lock().expect("session state poisoned");
            state.token = None;
            state.user = None;
        }
        if self.store_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.store_path) {
                tracing::warn!("Failed to remove session file: {}", e);
            }
        }
    }

    /// Read the stored token, discarding it when expired or unreadable.
    pub fn load_stored_token(&self) -> Option<String> {
        let raw = match std::fs::read_to_string(&self.store_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read session file: {}", e);
                return None;
            }
        };

        let stored: StoredToken = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Corrupt session file, ignoring: {}", e);
                return None;
            }
        };

        if OffsetDateTime::now_utc().unix_timestamp() >= stored.expires_at {
            tracing::info!("Stored session token expired");
            let _ = std::fs::remove_file(&self.store_path);
            return None;
        }

        Some(stored.access_token)
    }

    fn persist(&self, token: &str) -> Result<()> {
        let stored = StoredToken {
            access_token: token.to_string(),
            expires_at: OffsetDateTime::now_utc().unix_timestamp() + TOKEN_MAX_AGE_SECONDS,
        };
        let json = serde_json::to_string(&stored)
            .map_err(|e| ClientError::Cache(format!("session store encode: {}", e)))?;
        std::fs::write(&self.store_path, json)
            .map_err(|e| ClientError::Cache(format!("session store write: {}", e)))
    }
}

/// Login, logout, and session-restore flows over the auth endpoints.
pub struct AuthService {
    api: ApiClient,
    session: Arc<Session>,
}

impl AuthService {
    pub fn new(api: ApiClient, session: Arc<Session>) -> Self {
        AuthService { api, session }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let body = serde_json::json!({ "username": username, "password": password });

        let response: LoginResponse =
            self.api.post_json("/auth/login", &body).await.map_err(|e| match e {
                ClientError::Api { message, .. } => ClientError::Auth(message),
                other => other,
            })?;

        let user = response.data.user;
        self.session.establish(response.data.access_token, user.clone());
        tracing::info!("Logged in as {}", user.email);
        Ok(user)
    }

    /// Logout is best-effort on the wire: the local session is cleared even
    /// when the revocation call fails.
    pub async fn logout(&self) {
        if self.session.token().is_some() {
            if let Err(e) = self
                .api
                .post_json::<serde_json::Value, _>("/auth/logout", &serde_json::json!({}))
                .await
            {
                tracing::warn!("Logout call failed: {}", e);
            }
        }
        self.session.invalidate();
        tracing::info!("Session cleared");
    }

    pub async fn me(&self) -> Result<User> {
        self.api.get_json("/auth/me", &[]).await
    }

    /// Resume a persisted session: adopt the stored token, validate it via
    /// `/auth/me`, and discard it when the server rejects it.
    pub async fn restore(&self) -> Result<Option<User>> {
        let Some(token) = self.session.load_stored_token() else {
            return Ok(None);
        };

        self.session.adopt(token);

        match self.me().await {
            Ok(user) => {
                self.session.set_user(user.clone());
                tracing::info!("Restored session for {}", user.email);
                Ok(Some(user))
            }
            Err(e) => {
                tracing::warn!("Stored token rejected: {}", e);
                self.session.invalidate();
                Ok(None)
            }
        }
    }
}
