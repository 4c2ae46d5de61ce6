//! Playback state shared between the toggle and its fade tasks.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::fade::FadeOutcome;

/// Where the toggle is in its play/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing playing; the next press starts a track.
    #[default]
    Idle,
    /// A track is audible; a fade-in may still be running.
    Playing,
    /// Fade-out in progress; presses are ignored until it ends.
    FadingOut,
}

/// Mutable session owned by the toggle. Always accessed under one mutex.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub state: PlaybackState,
    /// Device the current track was started on.
    pub device_id: Option<String>,
    /// Running fade-in, if any.
    pub fade_in: Option<FadeTask>,
    /// Running fade-out, if any.
    pub fade_out: Option<JoinHandle<()>>,
}

/// A spawned fade with its cancellation handle.
#[derive(Debug)]
pub(crate) struct FadeTask {
    cancel: CancellationToken,
    handle: JoinHandle<FadeOutcome>,
}

impl FadeTask {
    pub const fn new(cancel: CancellationToken, handle: JoinHandle<FadeOutcome>) -> Self {
        Self { cancel, handle }
    }

    /// Ask the fade to stop at its next step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the fade task to exit.
    pub async fn finish(self) -> Option<FadeOutcome> {
        match self.handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Fade task ended abnormally: {e}");
                None
            }
        }
    }
}
