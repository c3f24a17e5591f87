//! Credential collaborators used by the request pipeline.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::AuthError;

/// Source of the credential attached to every request.
///
/// The client only reads, renews and drops credentials; issuing them is the
/// provider's business.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current access token, without any `Bearer ` prefix handling.
    async fn get_token(&self) -> Option<String>;

    /// Renews the access token and returns the new value.
    async fn refresh_token(&self) -> Result<String, AuthError>;

    /// Drops the session. Called when a refresh fails.
    async fn logout(&self);
}

#[derive(Clone, Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "token", alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

/// Shared session store, the default [`AuthProvider`].
///
/// Refreshes by POSTing `{"refresh_token": ...}` to the configured refresh
/// endpoint and expects `{"access_token": ..., "refresh_token": ...}` back.
pub struct SessionStore {
    http: reqwest::Client,
    refresh_url: Option<String>,
    timeout: Duration,
    session: RwLock<Session>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("refresh_url", &self.refresh_url)
            .field("session", &"<redacted>")
            .finish()
    }
}

impl SessionStore {
    /// Creates an empty store. Without a refresh URL every refresh fails.
    pub fn new(refresh_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            refresh_url,
            timeout: Duration::from_secs(10),
            session: RwLock::new(Session::default()),
        }
    }

    /// Creates a store already holding an access token.
    pub fn with_access_token(refresh_url: Option<String>, access_token: impl Into<String>) -> Self {
        Self::with_tokens(refresh_url, access_token, None)
    }

    /// Creates a store holding an access token and optionally a refresh token.
    pub fn with_tokens(
        refresh_url: Option<String>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            session: RwLock::new(Session {
                access_token: Some(access_token.into()),
                refresh_token,
            }),
            ..Self::new(refresh_url)
        }
    }

    /// Replaces both tokens, e.g. after a login call.
    pub async fn set_tokens(&self, access_token: impl Into<String>, refresh_token: Option<String>) {
        let mut session = self.session.write().await;
        session.access_token = Some(access_token.into());
        session.refresh_token = refresh_token;
    }

    /// Whether an access token is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.access_token.is_some()
    }
}

#[async_trait]
impl AuthProvider for SessionStore {
    async fn get_token(&self) -> Option<String> {
        self.session.read().await.access_token.clone()
    }

    async fn refresh_token(&self) -> Result<String, AuthError> {
        let refresh_token = self
            .session
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(AuthError::MissingRefreshToken)?;
        let refresh_url = self
            .refresh_url
            .as_deref()
            .ok_or(AuthError::MissingRefreshEndpoint)?;

        let response = self
            .http
            .post(refresh_url)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(AuthError::Transport)?;
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let renewed: RefreshResponse = serde_json::from_str(&body)
            .map_err(|err| AuthError::InvalidPayload(format!("{err}; body: {body}")))?;

        let mut session = self.session.write().await;
        session.access_token = Some(renewed.access_token.clone());
        if renewed.refresh_token.is_some() {
            session.refresh_token = renewed.refresh_token;
        }
        Ok(renewed.access_token)
    }

    async fn logout(&self) {
        let mut session = self.session.write().await;
        *session = Session::default();
    }
}

/// Coalesces concurrent refreshes into one provider call.
///
/// A caller passes the token its failed request carried; if the provider
/// already holds a different one, another request refreshed in the
/// meantime and that token is returned as is.
#[derive(Debug, Default)]
pub(crate) struct RefreshGate {
    lock: Mutex<()>,
}

impl RefreshGate {
    pub(crate) async fn refresh(
        &self,
        provider: &dyn AuthProvider,
        stale: Option<&str>,
    ) -> Result<String, AuthError> {
        let _guard = self.lock.lock().await;
        if let Some(current) = provider.get_token().await {
            if stale != Some(current.as_str()) {
                return Ok(current);
            }
        }
        provider.refresh_token().await
    }
}
