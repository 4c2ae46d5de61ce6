//! Spotify Web API request and response structures.

use chrono::{Duration, Utc};
use fightmusic_core::{Device, PlaybackSnapshot, TrackInfo};
use serde::{Deserialize, Serialize};

use crate::auth::Token;

/// Response of `GET /me/player/devices`.
#[derive(Debug, Clone, Deserialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<RawDevice>,
}

/// Device object as returned by the player endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDevice {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
    pub volume_percent: Option<u32>,
}

impl RawDevice {
    /// Convert into a core device. Devices without an ID cannot be targeted.
    pub fn into_device(self) -> Option<Device> {
        Some(Device {
            id: self.id?,
            name: self.name,
            is_active: self.is_active,
            volume_percent: self.volume_percent.map(|v| v.min(100) as u8),
        })
    }
}

impl DevicesResponse {
    /// Devices that accept commands, in the order the API listed them.
    pub fn into_devices(self) -> Vec<Device> {
        self.devices
            .into_iter()
            .filter(|d| !d.is_restricted)
            .filter_map(RawDevice::into_device)
            .collect()
    }
}

/// Response of `GET /me/player`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaybackState {
    pub device: Option<RawDevice>,
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
}

impl From<RawPlaybackState> for PlaybackSnapshot {
    fn from(raw: RawPlaybackState) -> Self {
        Self {
            device: raw.device.and_then(RawDevice::into_device),
            is_playing: raw.is_playing,
            progress_ms: raw.progress_ms,
        }
    }
}

/// Response of `GET /tracks/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtist {
    pub name: String,
}

impl From<RawTrack> for TrackInfo {
    fn from(raw: RawTrack) -> Self {
        Self {
            name: raw.name,
            artists: raw.artists.into_iter().map(|a| a.name).collect(),
        }
    }
}

/// Body of `PUT /me/player/play`.
#[derive(Debug, Clone, Serialize)]
pub struct StartPlaybackBody {
    pub uris: Vec<String>,
    pub position_ms: u64,
}

/// Error envelope returned by the Web API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    pub reason: Option<String>,
}

/// Response of the accounts token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Convert into a token, keeping `previous_refresh` when the response
    /// does not rotate the refresh token.
    pub fn into_token(self, previous_refresh: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            scope: self.scope.unwrap_or_default(),
        }
    }
}
