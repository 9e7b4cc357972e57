//! # Identity Provider Client
//!
//! Minimal client for the Clerk backend API. Only session lookups are needed:
//! the webhook handler fetches the session named in `session.created` events
//! and logs it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::AppConfig;

const USER_AGENT: &str = concat!("clerk-sync/", env!("CARGO_PKG_VERSION"));
const BODY_SNIPPET_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid identity provider url: {0}")]
    InvalidUrl(String),
}

/// Session as returned by `GET /v1/sessions/{id}`; timestamps are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_active_at: Option<i64>,
    #[serde(default)]
    pub expire_at: Option<i64>,
    #[serde(default)]
    pub abandon_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Lookup seam over the identity provider's backend API.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_session(&self, session_id: &str) -> Result<Session, IdentityError>;
}

/// reqwest-backed client for the Clerk backend API.
#[derive(Clone)]
pub struct ClerkClient {
    http: reqwest::Client,
    api_base: Url,
    secret_key: String,
}

impl std::fmt::Debug for ClerkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClerkClient")
            .field("api_base", &self.api_base.as_str())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

impl ClerkClient {
    pub fn new(
        api_base: &str,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let api_base =
            Url::parse(api_base).map_err(|err| IdentityError::InvalidUrl(err.to_string()))?;
        if api_base.cannot_be_a_base() {
            return Err(IdentityError::InvalidUrl(api_base.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            api_base,
            secret_key: secret_key.into(),
        })
    }

    /// Builds a client when a secret key is configured; `Ok(None)` otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, IdentityError> {
        let Some(secret_key) = config
            .secret_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
        else {
            return Ok(None);
        };

        Self::new(
            &config.api_base,
            secret_key,
            Duration::from_secs(config.http_timeout_seconds),
        )
        .map(Some)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::InvalidUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn get_session(&self, session_id: &str) -> Result<Session, IdentityError> {
        let url = self.endpoint(&["v1", "sessions", session_id])?;
        debug!(%url, "Fetching session from identity provider");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.secret_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(IdentityError::Http {
                status,
                body: body_snippet(&body),
            })
        }
    }
}

fn body_snippet(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
