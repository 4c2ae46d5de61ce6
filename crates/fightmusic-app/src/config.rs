//! Startup configuration.
//!
//! Read once from a TOML file; credentials may be overridden from the
//! environment so they can stay out of the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use fightmusic_core::{Error, Playlist, Result, Track, TrackUri};
use fightmusic_player::FadeSettings;
use fightmusic_spotify::Credentials;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::input::TriggerButton;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "FIGHT_MUSIC_CONFIG";

const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";
const REDIRECT_URI_ENV: &str = "SPOTIFY_REDIRECT_URI";

const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";

/// Longest accepted fade, in seconds.
const MAX_FADE_SECS: f64 = 600.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub fade: FadeConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default = "default_tracks")]
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub steps: u32,
}

impl Default for FadeConfig {
    fn default() -> Self {
        let defaults = FadeSettings::default();
        Self {
            fade_in_secs: defaults.fade_in.as_secs_f64(),
            fade_out_secs: defaults.fade_out.as_secs_f64(),
            steps: defaults.steps,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub button: TriggerButton,
}

/// A configured track: Spotify URI or `open.spotify.com` URL, plus where
/// to start playing.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackEntry {
    pub uri: String,
    #[serde(default)]
    pub start_ms: u64,
}

fn default_tracks() -> Vec<TrackEntry> {
    [
        ("spotify:track:4cOdK2wGLETKBW3PvgPWqT", 30_000),
        ("spotify:track:7GhIk7Il098yCjg4BQjzvb", 45_000),
        ("spotify:track:0VjIjW4GlUZAMYd2vXMi3b", 60_000),
    ]
    .into_iter()
    .map(|(uri, start_ms)| TrackEntry {
        uri: uri.to_string(),
        start_ms,
    })
    .collect()
}

impl Config {
    /// Load from `$FIGHT_MUSIC_CONFIG` or the platform config directory.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path.
    pub fn path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let project_dirs = ProjectDirs::from("com", "fightmusic", "FightMusic")
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read {} ({e}); copy config.example.toml there or set {CONFIG_PATH_ENV}",
                path.display()
            ))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Override credentials from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());

        if let Some(id) = non_empty(CLIENT_ID_ENV) {
            self.spotify.client_id = id;
        }
        if let Some(secret) = non_empty(CLIENT_SECRET_ENV) {
            self.spotify.client_secret = secret;
        }
        if let Some(uri) = non_empty(REDIRECT_URI_ENV) {
            self.spotify.redirect_uri = uri;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.spotify.client_id.trim().is_empty() {
            return Err(Error::Config(format!(
                "spotify.client_id is not set (or set {CLIENT_ID_ENV})"
            )));
        }
        if self.spotify.client_secret.trim().is_empty() {
            return Err(Error::Config(format!(
                "spotify.client_secret is not set (or set {CLIENT_SECRET_ENV})"
            )));
        }
        self.credentials()?;

        for (name, secs) in [
            ("fade.fade_in_secs", self.fade.fade_in_secs),
            ("fade.fade_out_secs", self.fade.fade_out_secs),
        ] {
            if !(secs > 0.0 && secs <= MAX_FADE_SECS) {
                return Err(Error::Config(format!(
                    "{name} must be in (0, {MAX_FADE_SECS}] seconds, got {secs}"
                )));
            }
        }
        if self.fade.steps == 0 {
            return Err(Error::Config("fade.steps must be at least 1".to_string()));
        }

        self.playlist()?;
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let redirect_uri = Url::parse(&self.spotify.redirect_uri).map_err(|e| {
            Error::Config(format!(
                "invalid redirect URI '{}': {e}",
                self.spotify.redirect_uri
            ))
        })?;

        Ok(Credentials {
            client_id: self.spotify.client_id.clone(),
            client_secret: self.spotify.client_secret.clone(),
            redirect_uri,
        })
    }

    pub fn fade_settings(&self) -> FadeSettings {
        FadeSettings {
            fade_in: Duration::from_secs_f64(self.fade.fade_in_secs),
            fade_out: Duration::from_secs_f64(self.fade.fade_out_secs),
            steps: self.fade.steps,
        }
    }

    /// Normalize the configured tracks into a playlist.
    pub fn playlist(&self) -> Result<Playlist> {
        let tracks = self
            .tracks
            .iter()
            .map(|entry| {
                TrackUri::parse(&entry.uri)
                    .map(|uri| Track::new(uri, entry.start_ms))
                    .map_err(|e| Error::Config(format!("track '{}': {e}", entry.uri)))
            })
            .collect::<Result<Vec<_>>>()?;

        Playlist::new(tracks)
    }
}
