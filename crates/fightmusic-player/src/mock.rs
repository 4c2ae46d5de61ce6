//! Recording in-memory playback client for tests.

use std::sync::atomic::{AtomicBool, Ordering};

use fightmusic_core::{
    Device, Error, PlaybackClient, PlaybackSnapshot, Result, TrackInfo, TrackUri,
};
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Devices,
    CurrentPlayback,
    Start {
        device_id: String,
        uri: TrackUri,
        position_ms: u64,
    },
    Volume {
        volume: u8,
        device_id: Option<String>,
    },
    Pause {
        device_id: Option<String>,
    },
    TrackInfo,
}

#[derive(Debug, Default)]
pub struct MockClient {
    pub devices: Mutex<Vec<Device>>,
    /// Volume reported by `current_playback`; follows successful sets.
    pub volume: Mutex<Option<u8>>,
    pub fail_start: AtomicBool,
    pub fail_volume: AtomicBool,
    pub fail_pause: AtomicBool,
    pub fail_playback_query: AtomicBool,
    calls: Mutex<Vec<(Instant, Call)>>,
}

impl MockClient {
    pub fn with_device() -> Self {
        let client = Self::default();
        *client.devices.lock() = vec![Device::new("desk", "Desktop").active()];
        client
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, Call)> {
        self.calls.lock().clone()
    }

    /// Volumes in the order they were requested.
    pub fn volumes(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Volume { volume, .. } => Some(volume),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push((Instant::now(), call));
    }

    fn failure(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::Api(format!("{what} failed")))
        } else {
            Ok(())
        }
    }
}

impl PlaybackClient for MockClient {
    async fn devices(&self) -> Result<Vec<Device>> {
        self.record(Call::Devices);
        Ok(self.devices.lock().clone())
    }

    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>> {
        self.record(Call::CurrentPlayback);
        Self::failure(&self.fail_playback_query, "playback query")?;

        let volume = *self.volume.lock();
        Ok(volume.map(|v| PlaybackSnapshot {
            device: Some(Device::new("desk", "Desktop").active().with_volume(v)),
            is_playing: true,
            progress_ms: None,
        }))
    }

    async fn start_playback(&self, device_id: &str, uri: &TrackUri, position_ms: u64) -> Result<()> {
        self.record(Call::Start {
            device_id: device_id.to_string(),
            uri: uri.clone(),
            position_ms,
        });
        Self::failure(&self.fail_start, "start")
    }

    async fn set_volume(&self, volume: u8, device_id: Option<&str>) -> Result<()> {
        self.record(Call::Volume {
            volume,
            device_id: device_id.map(str::to_string),
        });
        Self::failure(&self.fail_volume, "volume")?;
        *self.volume.lock() = Some(volume);
        Ok(())
    }

    async fn pause(&self, device_id: Option<&str>) -> Result<()> {
        self.record(Call::Pause {
            device_id: device_id.map(str::to_string),
        });
        Self::failure(&self.fail_pause, "pause")
    }

    async fn track_info(&self, _uri: &TrackUri) -> Result<TrackInfo> {
        self.record(Call::TrackInfo);
        Ok(TrackInfo {
            name: "Test Song".into(),
            artists: vec!["Test Artist".into()],
        })
    }
}
