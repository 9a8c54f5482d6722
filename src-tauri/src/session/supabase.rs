use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{SessionInfo, SessionStore, TokenProvider};
use crate::config::AppConfig;
use crate::error::AppError;

/// Refresh this many seconds before the access token actually expires.
const REFRESH_MARGIN_SECS: i64 = 60;
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user_email: Option<String>,
}

impl Session {
    fn from_response(resp: TokenResponse, now: i64) -> Self {
        let expires_at = resp
            .expires_at
            .unwrap_or_else(|| now + resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));
        Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            expires_at,
            user_email: resp.user.and_then(|u| u.email),
        }
    }

    fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - now <= REFRESH_MARGIN_SECS
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            email: self.user_email.clone(),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<TokenUser>,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    #[serde(default)]
    email: Option<String>,
}

/// Pull a human-readable message out of a GoTrue error body.
fn auth_error_message(body: &str) -> String {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return "Sign-in failed".to_string(),
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .unwrap_or_else(|| "Sign-in failed".to_string())
}

/// Password sign-in against Supabase GoTrue, with transparent refresh.
///
/// The live session is held in memory; only the refresh token is persisted
/// through the [`SessionStore`].
pub struct SupabaseAuth {
    client: reqwest::Client,
    config: AppConfig,
    session: Mutex<Option<Session>>,
    store: Box<dyn SessionStore>,
}

impl SupabaseAuth {
    pub fn new(config: AppConfig, store: Box<dyn SessionStore>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent("FoodLoopsBackOffice/1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            session: Mutex::new(None),
            store,
        })
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionInfo, AppError> {
        info!("Signing in as {}", email);
        let session = self
            .token_request("password", json!({ "email": email, "password": password }))
            .await?;
        let info = session.info();
        self.persist(&session);
        *self.session.lock().await = Some(session);
        Ok(info)
    }

    /// Drops the session locally no matter what the logout call answers.
    pub async fn sign_out(&self) {
        let previous = self.session.lock().await.take();
        if let Some(session) = previous {
            let result = self
                .client
                .post(self.config.auth_url("logout"))
                .header("apikey", &self.config.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            if let Err(e) = result {
                warn!("Logout request failed: {}", e);
            }
        }
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear persisted session: {}", e);
        }
        info!("Signed out");
    }

    /// The live session, refreshed first when it is about to expire.
    /// A failed refresh signs the user out locally.
    pub async fn current_session(&self) -> Option<Session> {
        let mut guard = self.session.lock().await;
        let session = guard.as_ref()?;
        if !session.needs_refresh(Utc::now().timestamp()) {
            return Some(session.clone());
        }

        info!("Access token expiring, refreshing session");
        let refresh_token = session.refresh_token.clone();
        match self
            .token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(fresh) => {
                self.persist(&fresh);
                *guard = Some(fresh.clone());
                Some(fresh)
            }
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                *guard = None;
                if let Err(e) = self.store.clear() {
                    warn!("Failed to clear persisted session: {}", e);
                }
                None
            }
        }
    }

    /// Exchange a persisted refresh token for a live session at startup.
    /// Holds the session lock throughout so early lookups wait for it.
    pub async fn restore(&self) -> Option<SessionInfo> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return guard.as_ref().map(|s| s.info());
        }
        let refresh_token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not load persisted session: {}", e);
                return None;
            }
        };
        match self
            .token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
        {
            Ok(session) => {
                info!("Restored persisted session");
                let info = session.info();
                self.persist(&session);
                *guard = Some(session);
                Some(info)
            }
            Err(e) => {
                warn!("Persisted session is no longer valid: {}", e);
                if let Err(e) = self.store.clear() {
                    warn!("Failed to clear persisted session: {}", e);
                }
                None
            }
        }
    }

    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.current_session().await.map(|s| s.info())
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, AppError> {
        let url = self
            .config
            .auth_url(&format!("token?grant_type={}", grant_type));
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!("Auth {} grant failed ({}): {}", grant_type, status, text);
            return Err(AppError::Auth(auth_error_message(&text)));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Decode(e.to_string()))?;
        Ok(Session::from_response(token, Utc::now().timestamp()))
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(&session.refresh_token) {
            warn!("Failed to persist session: {}", e);
        }
    }
}

#[async_trait]
impl TokenProvider for SupabaseAuth {
    async fn access_token(&self) -> Option<String> {
        self.current_session().await.map(|s| s.access_token)
    }
}
