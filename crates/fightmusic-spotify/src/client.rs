//! Spotify Web API client implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fightmusic_core::{Error, HttpError, Result};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::{Authenticator, Token};
use crate::types::ApiErrorResponse;

const BASE_URL: &str = "https://api.spotify.com/v1";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of attempts for idempotent reads.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_RETRY_DELAY_MS: u64 = 500;

/// Block window used when a 429 carries no `Retry-After`.
const DEFAULT_RATE_LIMIT_SECS: u64 = 5;

/// Spotify Web API client.
#[derive(Clone)]
pub struct SpotifyClient {
    /// HTTP client for making requests.
    http: reqwest::Client,
    /// API root, overridable for tests.
    base_url: String,
    /// Token issuer used for refreshes.
    auth: Arc<Authenticator>,
    /// Current access token.
    token: Arc<RwLock<Token>>,
    /// Rate limiter state.
    rate_limit_state: Arc<RwLock<RateLimitState>>,
}

#[derive(Debug, Default)]
struct RateLimitState {
    /// Time when we can make requests again (if rate limited).
    blocked_until: Option<Instant>,
}

impl RateLimitState {
    fn is_blocked(&self) -> bool {
        self.blocked_until.is_some_and(|until| Instant::now() < until)
    }

    fn block_for(&mut self, duration: Duration) {
        self.blocked_until = Some(Instant::now() + duration);
    }

    fn remaining_secs(&self) -> Option<u64> {
        self.blocked_until
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
    }
}

impl SpotifyClient {
    /// Authorize (cached token, refresh, or browser flow) and build a client.
    pub async fn connect(auth: Authenticator) -> Result<Self> {
        let token = auth.obtain_token().await?;
        Self::with_token(auth, token)
    }

    /// Build a client around an already obtained token.
    pub fn with_token(auth: Authenticator, token: Token) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            auth: Arc::new(auth),
            token: Arc::new(RwLock::new(token)),
            rate_limit_state: Arc::new(RwLock::new(RateLimitState::default())),
        })
    }

    /// Point the client at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// GET a JSON resource. Returns `None` on 204 No Content.
    ///
    /// Reads are idempotent and retried with exponential backoff.
    pub(crate) async fn get<R>(&self, path: &str, query: &[(&str, String)]) -> Result<Option<R>>
    where
        R: DeserializeOwned,
    {
        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
                debug!("Retry attempt {attempt} for {path} after {delay:?}");
            }

            match self.execute(Method::GET, path, query, Vec::new()).await {
                Ok(Some(bytes)) => {
                    return serde_json::from_slice(&bytes)
                        .map(Some)
                        .map_err(|e| Error::Parse(format!("{path}: {e}")));
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    warn!("Request to {path} failed (attempt {attempt}): {e}");

                    // Don't retry non-retryable errors; retries inside a
                    // rate-limit window would only short-circuit
                    if !e.is_retryable() || e.is_rate_limited() {
                        return Err(e);
                    }

                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Network("Request failed".to_string())))
    }

    /// PUT a command. Single attempt so that fades keep their cadence.
    pub(crate) async fn put<T>(&self, path: &str, query: &[(&str, String)], body: Option<&T>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let body = body.map(serde_json::to_vec).transpose()?.unwrap_or_default();
        self.execute(Method::PUT, path, query, body).await?;
        Ok(())
    }

    /// Send one request, refreshing the token and replaying once on 401.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Vec<u8>,
    ) -> Result<Option<Vec<u8>>> {
        {
            let state = self.rate_limit_state.read();
            if state.is_blocked() {
                return Err(Error::RateLimited {
                    retry_after_secs: state.remaining_secs(),
                });
            }
        }

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let access_token = self.access_token().await?;

        let result = match self
            .do_request(method.clone(), &url, query, &access_token, body.clone())
            .await
        {
            Err(e) if e.is_unauthorized() => {
                debug!("Access token rejected for {path}, refreshing");
                let access_token = self.force_refresh().await?;
                self.do_request(method, &url, query, &access_token, body)
                    .await
            }
            other => other,
        };

        // Applies to the replayed request too
        if let Err(Error::RateLimited { retry_after_secs }) = &result {
            let secs = retry_after_secs.unwrap_or(DEFAULT_RATE_LIMIT_SECS);
            warn!("Rate limited on {path}, holding requests for {secs}s");
            self.rate_limit_state.write().block_for(Duration::from_secs(secs));
        }

        result
    }

    async fn do_request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        access_token: &str,
        body: Vec<u8>,
    ) -> Result<Option<Vec<u8>>> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .query(query);

        // PUT without a body still needs a Content-Length
        if method != Method::GET {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(HttpError::Timeout)
            } else if e.is_connect() {
                Error::Http(HttpError::ConnectionFailed(e.to_string()))
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());

            return Err(Error::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, &message));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))?;

        Ok((!bytes.is_empty()).then(|| bytes.to_vec()))
    }

    async fn access_token(&self) -> Result<String> {
        let token = self.token.read().clone();
        if !token.is_expired() {
            return Ok(token.access_token);
        }
        self.refresh_with(&token).await
    }

    async fn force_refresh(&self) -> Result<String> {
        let token = self.token.read().clone();
        self.refresh_with(&token).await
    }

    async fn refresh_with(&self, stale: &Token) -> Result<String> {
        let fresh = self.auth.refresh(stale).await?;
        let access_token = fresh.access_token.clone();
        *self.token.write() = fresh;
        Ok(access_token)
    }
}

/// Map an unsuccessful response to an error, surfacing Spotify's message.
fn status_error(status: StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();

    if status == StatusCode::NOT_FOUND
        && parsed
            .as_ref()
            .and_then(|p| p.error.reason.as_deref())
            .is_some_and(|r| r == "NO_ACTIVE_DEVICE")
    {
        return Error::NoDevice;
    }

    let message = parsed.map_or_else(|| body.to_string(), |p| p.error.message);
    Error::Http(HttpError::StatusError {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::{Credentials, SCOPES};
    use axum::http::header::{AUTHORIZATION, RETRY_AFTER};
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use chrono::{TimeDelta, Utc};
    use fightmusic_core::TrackUri;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_uri: Url::parse("http://localhost:8888/callback").unwrap(),
        }
    }

    fn token(access_token: &str, refresh_token: Option<&str>) -> Token {
        Token {
            access_token: access_token.into(),
            refresh_token: refresh_token.map(Into::into),
            expires_at: Utc::now() + TimeDelta::seconds(3600),
            scope: SCOPES.into(),
        }
    }

    fn client() -> SpotifyClient {
        let auth = Authenticator::new(credentials()).unwrap();
        SpotifyClient::with_token(auth, token("access", None)).unwrap()
    }

    /// Client pointed at a local server, holding a stale token that the
    /// server's `/api/token` route refreshes.
    fn local_client(root: &str) -> SpotifyClient {
        let auth = Authenticator::new(credentials())
            .unwrap()
            .with_token_url(format!("{root}/api/token"));
        SpotifyClient::with_token(auth, token("stale", Some("refresh")))
            .unwrap()
            .with_base_url(format!("{root}/v1"))
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn bearer(headers: &HeaderMap) -> &str {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn hits(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn token_route(counter: &Arc<AtomicUsize>) -> Router {
        let counter = Arc::clone(counter);
        Router::new().route(
            "/api/token",
            post(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({"access_token": "fresh", "expires_in": 3600}))
            }),
        )
    }

    fn devices_body() -> Response {
        Json(json!({"devices": [
            {"id": "d1", "name": "Desk", "is_active": true, "volume_percent": 40}
        ]}))
        .into_response()
    }

    #[test]
    fn test_base_url_override() {
        let client = client().with_base_url("http://127.0.0.1:9/v1/");
        assert_eq!(client.base_url, "http://127.0.0.1:9/v1");
    }

    #[test]
    fn test_status_error_uses_api_message() {
        let body = r#"{"error": {"status": 403, "message": "Player command failed: Premium required", "reason": "PREMIUM_REQUIRED"}}"#;
        match status_error(StatusCode::FORBIDDEN, body) {
            Error::Http(HttpError::StatusError { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Player command failed: Premium required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_error_no_active_device() {
        let body = r#"{"error": {"status": 404, "message": "Player command failed: No active device found", "reason": "NO_ACTIVE_DEVICE"}}"#;
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, body),
            Error::NoDevice
        ));
    }

    #[test]
    fn test_status_error_plain_body() {
        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_rate_limit_state() {
        let mut state = RateLimitState::default();
        assert!(!state.is_blocked());

        state.block_for(Duration::from_secs(30));
        assert!(state.is_blocked());
        assert!(state.remaining_secs().unwrap() <= 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_client_short_circuits() {
        let client = client();
        client
            .rate_limit_state
            .write()
            .block_for(Duration::from_secs(60));

        let result = client.get::<serde_json::Value>("me/player", &[]).await;
        assert!(matches!(result, Err(Error::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_and_replayed_once() {
        let refreshes = counter();
        let requests = counter();
        let seen = Arc::clone(&requests);
        let app = token_route(&refreshes).route(
            "/v1/me/player/devices",
            get(move |headers: HeaderMap| async move {
                seen.fetch_add(1, Ordering::SeqCst);
                if bearer(&headers) == "Bearer fresh" {
                    devices_body()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        );
        let client = local_client(&serve(app).await);

        let devices = client.list_devices().await.unwrap();
        assert_eq!(devices[0].id, "d1");
        assert_eq!(hits(&refreshes), 1);
        assert_eq!(hits(&requests), 2);
        assert_eq!(client.token.read().access_token, "fresh");
    }

    #[tokio::test]
    async fn test_replay_is_not_repeated_when_still_rejected() {
        let refreshes = counter();
        let requests = counter();
        let seen = Arc::clone(&requests);
        let app = token_route(&refreshes).route(
            "/v1/me/player/devices",
            get(move || async move {
                seen.fetch_add(1, Ordering::SeqCst);
                StatusCode::UNAUTHORIZED
            }),
        );
        let client = local_client(&serve(app).await);

        let err = client.list_devices().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(hits(&refreshes), 1);
        assert_eq!(hits(&requests), 2);
    }

    #[tokio::test]
    async fn test_reads_retry_server_errors() {
        let requests = counter();
        let seen = Arc::clone(&requests);
        let app = Router::new().route(
            "/v1/me/player/devices",
            get(move || async move {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                } else {
                    devices_body()
                }
            }),
        );
        let client = local_client(&serve(app).await);

        let devices = client.list_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(hits(&requests), 3);
    }

    #[tokio::test]
    async fn test_commands_are_not_retried() {
        let requests = counter();
        let seen = Arc::clone(&requests);
        let app = Router::new().route(
            "/v1/me/player/volume",
            put(move || async move {
                seen.fetch_add(1, Ordering::SeqCst);
                StatusCode::SERVICE_UNAVAILABLE
            }),
        );
        let client = local_client(&serve(app).await);

        let err = client.put_volume(50, None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(hits(&requests), 1);
    }

    #[tokio::test]
    async fn test_retry_after_blocks_later_requests() {
        let requests = counter();
        let seen = Arc::clone(&requests);
        let app = Router::new().route(
            "/v1/me/player/pause",
            put(move || async move {
                seen.fetch_add(1, Ordering::SeqCst);
                (StatusCode::TOO_MANY_REQUESTS, [(RETRY_AFTER, "30")])
            }),
        );
        let client = local_client(&serve(app).await);

        let err = client.pause_playback(None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::RateLimited {
                retry_after_secs: Some(30)
            }
        ));

        let err = client.pause_playback(None).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(hits(&requests), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_replay_blocks_later_requests() {
        let refreshes = counter();
        let requests = counter();
        let seen = Arc::clone(&requests);
        let app = token_route(&refreshes).route(
            "/v1/me/player/devices",
            get(move |headers: HeaderMap| async move {
                seen.fetch_add(1, Ordering::SeqCst);
                if bearer(&headers) == "Bearer fresh" {
                    (StatusCode::TOO_MANY_REQUESTS, [(RETRY_AFTER, "30")]).into_response()
                } else {
                    StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        );
        let client = local_client(&serve(app).await);

        let err = client.list_devices().await.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(client.rate_limit_state.read().is_blocked());
        assert_eq!(hits(&requests), 2);
    }

    #[tokio::test]
    async fn test_no_active_device_response() {
        let app = Router::new().route(
            "/v1/me/player/play",
            put(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"error": {
                        "status": 404,
                        "message": "Player command failed: No active device found",
                        "reason": "NO_ACTIVE_DEVICE"
                    }})),
                )
            }),
        );
        let client = local_client(&serve(app).await);
        let uri = TrackUri::parse("spotify:track:ABC123").unwrap();

        let err = client.play_track("d1", &uri, 30_000).await.unwrap_err();
        assert!(matches!(err, Error::NoDevice));
    }
}
