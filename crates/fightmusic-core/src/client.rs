//! The playback service seam.
//!
//! Everything that talks to the remote player goes through [`PlaybackClient`],
//! so the state machine can run against the real Spotify client or an
//! in-memory fake.

use std::future::Future;

use crate::{Device, PlaybackSnapshot, Result, TrackInfo, TrackUri};

/// Remote playback control operations. All calls are fallible.
pub trait PlaybackClient: Send + Sync + 'static {
    /// List available playback devices.
    fn devices(&self) -> impl Future<Output = Result<Vec<Device>>> + Send;

    /// Current playback, or `None` when nothing is playing anywhere.
    fn current_playback(&self) -> impl Future<Output = Result<Option<PlaybackSnapshot>>> + Send;

    /// Start playing `uri` on `device_id` at `position_ms`.
    fn start_playback(
        &self,
        device_id: &str,
        uri: &TrackUri,
        position_ms: u64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Set the output volume (0-100), optionally scoped to a device.
    fn set_volume(
        &self,
        volume: u8,
        device_id: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Pause playback, optionally scoped to a device.
    fn pause(&self, device_id: Option<&str>) -> impl Future<Output = Result<()>> + Send;

    /// Fetch display metadata for a track.
    fn track_info(&self, uri: &TrackUri) -> impl Future<Output = Result<TrackInfo>> + Send;

    /// The device that should receive commands.
    fn active_device(&self) -> impl Future<Output = Result<Option<Device>>> + Send {
        async move { Ok(select_active_device(self.devices().await?)) }
    }
}

/// Prefer the device flagged active, else the first one listed.
pub fn select_active_device(devices: Vec<Device>) -> Option<Device> {
    let active = devices.iter().position(|d| d.is_active).unwrap_or(0);
    devices.into_iter().nth(active)
}
