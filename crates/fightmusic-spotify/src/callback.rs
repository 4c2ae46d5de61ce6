//! Receiving the authorization redirect.
//!
//! Loopback redirect URIs are served by a one-shot local HTTP listener.
//! Any other redirect URI falls back to asking the user to paste the URL
//! the browser ended up on.

use std::time::Duration;

use axum::extract::State;
use axum::http::uri::PathAndQuery;
use axum::http::{StatusCode, Uri};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use fightmusic_core::{Error, HttpError, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::{Host, Url};

/// How long the user has to complete the browser authorization.
const AUTHORIZE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the listener may keep draining connections after the redirect.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_PAGE: &str = "<html><body><h1>Fight Music authorized</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h1>Fight Music was not authorized</h1>\
<p>Check the terminal for details.</p></body></html>";

/// Wait for the authorization code for a request made with `expected_state`.
pub async fn receive_code(redirect_uri: &Url, expected_state: &str) -> Result<String> {
    tokio::time::timeout(AUTHORIZE_TIMEOUT, wait_for_redirect(redirect_uri, expected_state))
        .await
        .map_err(|_| {
            Error::Auth(format!(
                "no authorization received within {}s",
                AUTHORIZE_TIMEOUT.as_secs()
            ))
        })?
}

async fn wait_for_redirect(redirect_uri: &Url, expected_state: &str) -> Result<String> {
    if is_loopback(redirect_uri) {
        let port = redirect_uri.port_or_known_default().ok_or_else(|| {
            Error::Http(HttpError::InvalidUrl(format!(
                "redirect URI has no port: {redirect_uri}"
            )))
        })?;
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        info!("Waiting for the authorization redirect on port {port}");
        serve_redirect(listener, redirect_uri, expected_state).await
    } else {
        read_redirect_from_stdin(redirect_uri, expected_state).await
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[derive(Clone)]
struct RedirectState {
    base: Url,
    expected_state: String,
    results: mpsc::Sender<Result<String>>,
}

/// Serve the redirect path until the first redirect arrives, then shut the
/// listener down. Other paths (favicon, probes) get a 404.
pub async fn serve_redirect(
    listener: TcpListener,
    redirect_uri: &Url,
    expected_state: &str,
) -> Result<String> {
    let (results_tx, mut results_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route(redirect_uri.path(), get(handle_redirect))
        .with_state(RedirectState {
            base: redirect_uri.clone(),
            expected_state: expected_state.to_string(),
            results: results_tx,
        });

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let server = tokio::spawn(async move { server.await });
    let abort = server.abort_handle();

    let Some(result) = results_rx.recv().await else {
        return match server.await {
            Ok(Err(e)) => Err(e.into()),
            _ => Err(Error::Auth(
                "redirect listener stopped before authorization completed".to_string(),
            )),
        };
    };

    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Err(e))) => warn!("Redirect listener failed during shutdown: {e}"),
        Ok(_) => debug!("Redirect listener closed"),
        Err(_) => {
            debug!("Redirect listener still has open connections, closing it");
            abort.abort();
        }
    }

    result
}

async fn handle_redirect(
    State(state): State<RedirectState>,
    uri: Uri,
) -> (StatusCode, Html<&'static str>) {
    let target = uri.path_and_query().map_or("/", PathAndQuery::as_str);
    let result = state
        .base
        .join(target)
        .map_err(|e| Error::Auth(format!("invalid redirect request {target}: {e}")))
        .and_then(|url| parse_redirect(&url, &state.expected_state));

    let response = match &result {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_PAGE)),
        Err(e) => {
            warn!("Authorization redirect rejected: {e}");
            (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
        }
    };

    if state.results.try_send(result).is_err() {
        debug!("Authorization redirect already received, ignoring repeat");
    }
    response
}

async fn read_redirect_from_stdin(redirect_uri: &Url, expected_state: &str) -> Result<String> {
    info!("After authorizing, paste the URL you were redirected to ({redirect_uri}...):");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| Error::Auth("no redirect URL entered".to_string()))?;

    let url = Url::parse(line.trim())
        .map_err(|e| Error::Auth(format!("invalid redirect URL: {e}")))?;
    parse_redirect(&url, expected_state)
}

/// Extract the authorization code from a redirect URL.
pub fn parse_redirect(url: &Url, expected_state: &str) -> Result<String> {
    let mut code = None;
    let mut state = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return Err(Error::Auth(format!("authorization denied: {value}"))),
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(Error::Auth("state mismatch in redirect".to_string()));
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Auth("redirect is missing the authorization code".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn redirect() -> Url {
        Url::parse("http://localhost:8888/callback").unwrap()
    }

    #[test]
    fn test_parse_redirect() {
        let url = Url::parse("http://localhost:8888/callback?code=abc&state=s1").unwrap();
        assert_eq!(parse_redirect(&url, "s1").unwrap(), "abc");
    }

    #[test]
    fn test_parse_redirect_rejects_bad_state() {
        let url = Url::parse("http://localhost:8888/callback?code=abc&state=other").unwrap();
        assert!(matches!(parse_redirect(&url, "s1"), Err(Error::Auth(_))));

        let url = Url::parse("http://localhost:8888/callback?code=abc").unwrap();
        assert!(matches!(parse_redirect(&url, "s1"), Err(Error::Auth(_))));
    }

    #[test]
    fn test_parse_redirect_reports_denial() {
        let url = Url::parse("http://localhost:8888/callback?error=access_denied&state=s1").unwrap();
        let err = parse_redirect(&url, "s1").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback(&redirect()));
        assert!(is_loopback(&Url::parse("http://127.0.0.1:9000/cb").unwrap()));
        assert!(is_loopback(&Url::parse("http://[::1]:9000/cb").unwrap()));
        assert!(!is_loopback(&Url::parse("https://example.com/cb").unwrap()));
    }

    async fn send(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request =
            format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_serve_redirect_returns_code() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            serve_redirect(listener, &redirect(), "s1").await
        });

        let not_found = send(port, "/favicon.ico").await;
        assert!(not_found.starts_with("HTTP/1.1 404"));

        let ok = send(port, "/callback?code=the-code&state=s1").await;
        assert!(ok.starts_with("HTTP/1.1 200"));
        assert!(ok.contains("Fight Music authorized"));

        assert_eq!(server.await.unwrap().unwrap(), "the-code");
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_block_redirect() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            serve_redirect(listener, &redirect(), "s1").await
        });

        // Browsers open spare connections that never send a request
        let _idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let ok = send(port, "/callback?code=the-code&state=s1").await;
        assert!(ok.starts_with("HTTP/1.1 200"));

        let code = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("redirect handled while an idle connection is open")
            .unwrap()
            .unwrap();
        assert_eq!(code, "the-code");
    }

    #[tokio::test]
    async fn test_denied_redirect_fails_authorization() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            serve_redirect(listener, &redirect(), "s1").await
        });

        let response = send(port, "/callback?error=access_denied&state=s1").await;
        assert!(response.starts_with("HTTP/1.1 400"));
        assert!(response.contains("not authorized"));

        let err = server.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
