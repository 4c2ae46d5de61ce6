//! Player endpoints: devices, playback state and playback commands.

use fightmusic_core::{Device, PlaybackSnapshot, Result, TrackUri};
use tracing::debug;

use crate::types::{DevicesResponse, RawPlaybackState, StartPlaybackBody};
use crate::SpotifyClient;

impl SpotifyClient {
    /// List the user's available devices.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let response: Option<DevicesResponse> = self.get("me/player/devices", &[]).await?;
        let devices = response.map(DevicesResponse::into_devices).unwrap_or_default();
        debug!("Found {} playback device(s)", devices.len());
        Ok(devices)
    }

    /// Get the current playback state. `None` when nothing is active.
    pub async fn playback_state(&self) -> Result<Option<PlaybackSnapshot>> {
        let response: Option<RawPlaybackState> = self.get("me/player", &[]).await?;
        Ok(response.map(PlaybackSnapshot::from))
    }

    /// Start playing a single track on a device from `position_ms`.
    pub async fn play_track(&self, device_id: &str, uri: &TrackUri, position_ms: u64) -> Result<()> {
        let body = StartPlaybackBody {
            uris: vec![uri.to_string()],
            position_ms,
        };
        self.put(
            "me/player/play",
            &[("device_id", device_id.to_string())],
            Some(&body),
        )
        .await
    }

    /// Set the volume (clamped to 0-100).
    pub async fn put_volume(&self, volume: u8, device_id: Option<&str>) -> Result<()> {
        let mut query = vec![("volume_percent", volume.min(100).to_string())];
        if let Some(id) = device_id {
            query.push(("device_id", id.to_string()));
        }
        self.put::<()>("me/player/volume", &query, None).await
    }

    /// Pause playback.
    pub async fn pause_playback(&self, device_id: Option<&str>) -> Result<()> {
        let query: Vec<(&str, String)> = device_id
            .map(|id| ("device_id", id.to_string()))
            .into_iter()
            .collect();
        self.put::<()>("me/player/pause", &query, None).await
    }
}
