//! Playback devices and playback snapshots.

use serde::{Deserialize, Serialize};

/// Default volume assumed when a device does not report one.
pub const FULL_VOLUME: u8 = 100;

/// A Spotify Connect playback endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device ID used to scope playback commands.
    pub id: String,
    /// Human readable device name.
    pub name: String,
    /// Whether this device is currently receiving commands.
    pub is_active: bool,
    /// Current output volume (0-100), if the device reports one.
    pub volume_percent: Option<u8>,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: false,
            volume_percent: None,
        }
    }

    #[must_use]
    pub const fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    #[must_use]
    pub const fn with_volume(mut self, volume: u8) -> Self {
        self.volume_percent = Some(volume);
        self
    }
}

/// Current playback state as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    /// Device the playback is on.
    pub device: Option<Device>,
    /// Whether audio is playing.
    pub is_playing: bool,
    /// Position in the current item.
    pub progress_ms: Option<u64>,
}

impl PlaybackSnapshot {
    /// Device volume, if known.
    pub fn volume(&self) -> Option<u8> {
        self.device.as_ref()?.volume_percent
    }
}
