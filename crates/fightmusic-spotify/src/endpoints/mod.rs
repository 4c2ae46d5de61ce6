//! Web API endpoints used by the trigger.

pub mod player;
pub mod tracks;

use fightmusic_core::{Device, PlaybackClient, PlaybackSnapshot, Result, TrackInfo, TrackUri};

use crate::SpotifyClient;

impl PlaybackClient for SpotifyClient {
    async fn devices(&self) -> Result<Vec<Device>> {
        self.list_devices().await
    }

    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>> {
        self.playback_state().await
    }

    async fn start_playback(&self, device_id: &str, uri: &TrackUri, position_ms: u64) -> Result<()> {
        self.play_track(device_id, uri, position_ms).await
    }

    async fn set_volume(&self, volume: u8, device_id: Option<&str>) -> Result<()> {
        self.put_volume(volume, device_id).await
    }

    async fn pause(&self, device_id: Option<&str>) -> Result<()> {
        self.pause_playback(device_id).await
    }

    async fn track_info(&self, uri: &TrackUri) -> Result<TrackInfo> {
        self.get_track(uri).await
    }
}
