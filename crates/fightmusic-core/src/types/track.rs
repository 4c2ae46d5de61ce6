//! Track types: playlist entries and their canonical identifiers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

const URI_PREFIX: &str = "spotify:track:";
const WEB_HOST: &str = "open.spotify.com";

/// Canonical Spotify track identifier (`spotify:track:<id>`).
///
/// Accepts either the URI form or a web URL such as
/// `https://open.spotify.com/track/<id>?si=...`. Web URLs are normalized by
/// taking the path segment after `track`; the query string is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackUri(String);

impl TrackUri {
    /// Parse a track identifier in URI or web URL form.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Some(id) = input.strip_prefix(URI_PREFIX) {
            return Self::from_id(id).ok_or_else(|| Error::InvalidTrack(input.to_string()));
        }

        if input.contains(WEB_HOST) {
            return Self::from_web_url(input);
        }

        Err(Error::InvalidTrack(input.to_string()))
    }

    /// Build a URI from a bare track ID.
    pub fn from_id(id: &str) -> Option<Self> {
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| Self(format!("{URI_PREFIX}{id}")))
    }

    fn from_web_url(input: &str) -> Result<Self> {
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{input}")
        };

        let url = Url::parse(&with_scheme).map_err(|e| Error::InvalidTrack(format!("{input}: {e}")))?;

        if url.host_str() != Some(WEB_HOST) {
            return Err(Error::InvalidTrack(input.to_string()));
        }

        // Locale prefixes like /intl-de/ may precede the track marker
        let id = url
            .path_segments()
            .and_then(|mut segments| {
                segments.by_ref().find(|s| *s == "track")?;
                segments.next()
            })
            .ok_or_else(|| Error::InvalidTrack(input.to_string()))?;

        Self::from_id(id).ok_or_else(|| Error::InvalidTrack(input.to_string()))
    }

    /// The bare track ID.
    pub fn id(&self) -> &str {
        &self.0[URI_PREFIX.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrackUri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TrackUri> for String {
    fn from(uri: TrackUri) -> Self {
        uri.0
    }
}

/// A playlist entry: a track and where playback should start within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Canonical track URI.
    pub uri: TrackUri,
    /// Playback start position in milliseconds.
    pub start_offset_ms: u64,
}

impl Track {
    pub const fn new(uri: TrackUri, start_offset_ms: u64) -> Self {
        Self {
            uri,
            start_offset_ms,
        }
    }

    /// Start position as a duration.
    pub const fn start_offset(&self) -> Duration {
        Duration::from_millis(self.start_offset_ms)
    }
}

/// Display metadata for a track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track title.
    pub name: String,
    /// Artist names, primary first.
    pub artists: Vec<String>,
}

impl TrackInfo {
    /// Get the primary artist name.
    pub fn artist_name(&self) -> &str {
        self.artists.first().map_or("", String::as_str)
    }
}
