//! Error types for Fight Music.

use thiserror::Error;

/// Result type alias using Fight Music's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Fight Music.
#[derive(Error, Debug)]
pub enum Error {
    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Network error: {0}")]
    Network(String),

    // Spotify Web API errors
    #[error("Spotify API error: {0}")]
    Api(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    // Playback errors
    #[error("No playback device available")]
    NoDevice,

    #[error("Invalid track identifier: {0}")]
    InvalidTrack(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP-specific errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed with status {status}: {message}")]
    StatusError { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// Returns true if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::RateLimited { .. }
                | Self::Http(HttpError::ConnectionFailed(_) | HttpError::Timeout)
        ) || self.is_server_error()
    }

    /// Returns true if this is a rate limit error.
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true if the access token was rejected.
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http(HttpError::StatusError { status: 401, .. }))
    }

    const fn is_server_error(&self) -> bool {
        matches!(self, Self::Http(HttpError::StatusError { status, .. }) if *status >= 500)
    }
}
