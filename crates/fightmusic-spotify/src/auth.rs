//! OAuth authorization-code flow and token caching.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use directories::ProjectDirs;
use fightmusic_core::{Error, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::callback;
use crate::types::TokenResponse;

/// Scopes needed to read and control playback.
pub const SCOPES: &str = "user-modify-playback-state user-read-playback-state";

const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tokens are treated as expired this many seconds before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application credentials registered with Spotify.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
}

/// An access token with its refresh token and expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// Space separated granted scopes.
    #[serde(default)]
    pub scope: String,
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    /// Whether every scope in `required` was granted.
    pub fn covers(&self, required: &str) -> bool {
        let granted: Vec<&str> = self.scope.split_whitespace().collect();
        required.split_whitespace().all(|s| granted.contains(&s))
    }
}

/// JSON file holding the last token between runs.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache file in the platform cache directory.
    pub fn default_location() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "fightmusic", "FightMusic")
            .ok_or_else(|| Error::Config("Failed to determine cache directory".to_string()))?;
        Ok(Self::new(project_dirs.cache_dir().join("token.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token. A missing or unreadable file yields `None`.
    pub fn load(&self) -> Option<Token> {
        let bytes = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring corrupt token cache {}: {e}", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(token)?)?;
        debug!("Token cached at {}", self.path.display());
        Ok(())
    }
}

/// Obtains and refreshes access tokens.
pub struct Authenticator {
    http: reqwest::Client,
    credentials: Credentials,
    cache: Option<TokenCache>,
    token_url: String,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            credentials,
            cache: None,
            token_url: TOKEN_URL.to_string(),
        })
    }

    /// Persist tokens to `cache` and reuse them on later runs.
    #[must_use]
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// URL the user opens to grant access.
    #[allow(clippy::expect_used)] // Constant URL
    pub fn authorize_url(&self, state: &str) -> Url {
        let mut url = Url::parse(AUTHORIZE_URL).expect("valid authorize URL");
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.credentials.redirect_uri.as_str())
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        url
    }

    /// Get a usable token: cached, refreshed, or from a fresh authorization.
    pub async fn obtain_token(&self) -> Result<Token> {
        if let Some(cached) = self.cache.as_ref().and_then(TokenCache::load) {
            if !cached.covers(SCOPES) {
                info!("Cached token is missing required scopes, re-authorizing");
            } else if !cached.is_expired() {
                debug!("Using cached token");
                return Ok(cached);
            } else {
                match self.refresh(&cached).await {
                    Ok(token) => return Ok(token),
                    Err(e) => warn!("Cached token could not be refreshed: {e}"),
                }
            }
        }

        self.authorize_interactive().await
    }

    /// Run the browser authorization and exchange the returned code.
    pub async fn authorize_interactive(&self) -> Result<Token> {
        let state = random_state();
        let url = self.authorize_url(&state);

        info!("Open this URL in your browser to authorize Fight Music:\n\n    {url}\n");

        let code = callback::receive_code(&self.credentials.redirect_uri, &state).await?;
        self.exchange_code(&code).await
    }

    pub async fn exchange_code(&self, code: &str) -> Result<Token> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];
        let token = self.request_token(&form).await?.into_token(None);
        self.store(&token);
        Ok(token)
    }

    pub async fn refresh(&self, token: &Token) -> Result<Token> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Auth("no refresh token available".to_string()))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let mut fresh = self
            .request_token(&form)
            .await?
            .into_token(token.refresh_token.clone());

        // Refresh responses may omit the scope
        if fresh.scope.is_empty() {
            fresh.scope.clone_from(&token.scope);
        }

        debug!("Access token refreshed, expires at {}", fresh.expires_at);
        self.store(&fresh);
        Ok(fresh)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("invalid token response: {e}")))
    }

    fn store(&self, token: &Token) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(token) {
                warn!("Failed to cache token: {e}");
            }
        }
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
