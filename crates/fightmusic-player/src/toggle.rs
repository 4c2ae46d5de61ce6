//! The play/stop toggle driven by trigger presses.

use std::sync::Arc;

use fightmusic_core::{Error, PlaybackClient, Playlist, Result, Track};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::fade::{self, FadeSettings};
use crate::state::{FadeTask, PlaybackState, Session};

/// What a single press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    /// A track started and is fading in.
    Started(Track),
    /// The playing track began fading out.
    FadingOut,
    /// A fade-out is already running; the press was dropped.
    Ignored,
    /// No playback device was available. State stays idle.
    NoDevice,
    /// A remote call failed while starting. State stays idle.
    Failed,
}

/// Interprets trigger presses as play/stop.
///
/// Presses must be delivered one at a time (the caller awaits
/// [`on_press`](Self::on_press) before handing over the next one). Fades run
/// on spawned tasks, so `on_press` only waits for the remote calls needed to
/// start playback.
pub struct ToggleController<C> {
    client: Arc<C>,
    playlist: Playlist,
    settings: FadeSettings,
    session: Arc<Mutex<Session>>,
    rng: Mutex<StdRng>,
}

impl<C: PlaybackClient> ToggleController<C> {
    pub fn new(client: Arc<C>, playlist: Playlist, settings: FadeSettings) -> Self {
        Self {
            client,
            playlist,
            settings,
            session: Arc::new(Mutex::new(Session::default())),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Use a deterministic track picker.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.session.lock().state
    }

    pub const fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Handle one trigger press.
    pub async fn on_press(&self) -> PressOutcome {
        let state = self.state();
        match state {
            PlaybackState::Idle => self.start().await,
            PlaybackState::Playing => self.begin_fade_out(),
            PlaybackState::FadingOut => {
                debug!("Fade-out in progress, ignoring press");
                PressOutcome::Ignored
            }
        }
    }

    /// Wait for a running fade-out to finish.
    pub async fn wait_for_fade_out(&self) {
        let handle = self.session.lock().fade_out.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Fade-out task ended abnormally: {e}");
            }
        }
    }

    async fn start(&self) -> PressOutcome {
        let device = match self.client.active_device().await {
            Ok(Some(device)) => device,
            Ok(None) | Err(Error::NoDevice) => {
                warn!("No Spotify device found! Open Spotify and play something first.");
                return PressOutcome::NoDevice;
            }
            Err(e) => {
                error!("Failed to list playback devices: {e}");
                return PressOutcome::Failed;
            }
        };

        let track = self.playlist.choose(&mut *self.rng.lock()).clone();
        debug!("Picked {} on device {} ({})", track.uri, device.name, device.id);

        match self.begin_playback(&device.id, &track).await {
            Ok(()) => {}
            Err(Error::NoDevice) => {
                warn!("No Spotify device found! Open Spotify and play something first.");
                return PressOutcome::NoDevice;
            }
            Err(e) => {
                error!("Spotify error: {e}");
                return PressOutcome::Failed;
            }
        }

        self.spawn_fade_in(device.id);
        self.announce(&track);
        PressOutcome::Started(track)
    }

    /// Silence the device, then start the track at its offset.
    async fn begin_playback(&self, device_id: &str, track: &Track) -> Result<()> {
        self.client.set_volume(0, Some(device_id)).await?;
        self.client
            .start_playback(device_id, &track.uri, track.start_offset_ms)
            .await
    }

    fn spawn_fade_in(&self, device_id: String) {
        let cancel = CancellationToken::new();
        let client = Arc::clone(&self.client);
        let settings = self.settings;
        let task_cancel = cancel.clone();
        let task_device = device_id.clone();

        let mut session = self.session.lock();
        let handle = tokio::spawn(async move {
            fade::fade_in(&*client, &settings, Some(task_device.as_str()), &task_cancel).await
        });

        session.state = PlaybackState::Playing;
        session.device_id = Some(device_id);
        session.fade_in = Some(FadeTask::new(cancel, handle));
    }

    fn begin_fade_out(&self) -> PressOutcome {
        let mut session = self.session.lock();
        if session.state != PlaybackState::Playing {
            return PressOutcome::Ignored;
        }

        session.state = PlaybackState::FadingOut;
        let fade_in = session.fade_in.take();
        let device_id = session.device_id.clone();

        // Stop the fade-in before the fade-out touches the volume
        if let Some(task) = &fade_in {
            task.cancel();
        }

        info!("Fading out...");

        let client = Arc::clone(&self.client);
        let shared = Arc::clone(&self.session);
        let settings = self.settings;

        session.fade_out = Some(tokio::spawn(async move {
            if let Some(task) = fade_in {
                task.finish().await;
            }

            fade::fade_out(&*client, &settings, device_id.as_deref()).await;

            let mut session = shared.lock();
            session.state = PlaybackState::Idle;
            session.device_id = None;
            debug!("Fade-out complete, idle");
        }));

        PressOutcome::FadingOut
    }

    /// Log the track name in the background; metadata is display only.
    fn announce(&self, track: &Track) {
        let client = Arc::clone(&self.client);
        let uri = track.uri.clone();
        let offset = track.start_offset();

        tokio::spawn(async move {
            match client.track_info(&uri).await {
                Ok(info) => info!(
                    "Playing: {} by {} from {offset:?}",
                    info.name,
                    info.artist_name()
                ),
                Err(e) => debug!("Could not fetch track info for {uri}: {e}"),
            }
        });
    }
}
