//! Linear volume fades.
//!
//! A fade is a fixed number of discrete volume steps spread evenly over a
//! duration. Every step issues one remote volume call; a failed call is
//! logged and the ramp carries on. Fade-ins stop early when their
//! cancellation token fires; fade-outs always run to the end.

use std::time::Duration;

use fightmusic_core::{PlaybackClient, FULL_VOLUME};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default fade-in duration.
pub const DEFAULT_FADE_IN: Duration = Duration::from_secs(2);

/// Default fade-out duration.
pub const DEFAULT_FADE_OUT: Duration = Duration::from_secs(3);

/// Default number of volume steps per fade.
pub const DEFAULT_FADE_STEPS: u32 = 20;

/// Direction of a volume ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    /// 0 up to full volume.
    In,
    /// Starting volume down to 0.
    Out,
}

/// Fade timings shared by every press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeSettings {
    pub fade_in: Duration,
    pub fade_out: Duration,
    pub steps: u32,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            fade_in: DEFAULT_FADE_IN,
            fade_out: DEFAULT_FADE_OUT,
            steps: DEFAULT_FADE_STEPS,
        }
    }
}

impl FadeSettings {
    pub const fn job(&self, direction: FadeDirection) -> FadeJob {
        let duration = match direction {
            FadeDirection::In => self.fade_in,
            FadeDirection::Out => self.fade_out,
        };
        FadeJob::new(direction, duration, self.steps)
    }
}

/// One fade invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeJob {
    pub direction: FadeDirection,
    pub duration: Duration,
    /// Number of intervals; the ramp issues `steps + 1` volume calls.
    pub steps: u32,
}

impl FadeJob {
    /// Create a job. Zero steps is treated as one.
    pub const fn new(direction: FadeDirection, duration: Duration, steps: u32) -> Self {
        Self {
            direction,
            duration,
            steps: if steps == 0 { 1 } else { steps },
        }
    }

    /// Sleep between consecutive steps.
    pub fn step_interval(&self) -> Duration {
        self.duration / self.steps
    }

    /// Volume at `step` (0..=steps), rounded to the nearest integer.
    ///
    /// Fade-in: `100 * i / N`. Fade-out: `start * (1 - i / N)`.
    pub fn volume_at(&self, step: u32, start_volume: u8) -> u8 {
        let n = u64::from(self.steps);
        let i = u64::from(step.min(self.steps));
        let numerator = match self.direction {
            FadeDirection::In => u64::from(FULL_VOLUME) * i,
            FadeDirection::Out => u64::from(start_volume) * (n - i),
        };
        // round(numerator / n) without floating point
        ((2 * numerator + n) / (2 * n)) as u8
    }

    /// The full volume sequence for this job.
    pub fn volumes(&self, start_volume: u8) -> impl Iterator<Item = u8> + '_ {
        (0..=self.steps).map(move |step| self.volume_at(step, start_volume))
    }
}

/// How a fade ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// Every step was issued.
    Completed { last_volume: u8 },
    /// Stopped early; `last_volume` is the last volume requested, if any.
    Cancelled { last_volume: Option<u8> },
}

/// Drive `job` against the client, one volume call per step.
pub async fn run<C: PlaybackClient>(
    client: &C,
    job: &FadeJob,
    start_volume: u8,
    device_id: Option<&str>,
    cancel: &CancellationToken,
) -> FadeOutcome {
    let interval = job.step_interval();
    let mut last_volume = None;

    for step in 0..=job.steps {
        if cancel.is_cancelled() {
            debug!("{:?} fade cancelled at step {step}/{}", job.direction, job.steps);
            return FadeOutcome::Cancelled { last_volume };
        }

        let volume = job.volume_at(step, start_volume);
        trace!("{:?} fade step {step}/{}: volume {volume}", job.direction, job.steps);

        // Best effort: a missed step only makes the ramp coarser
        if let Err(e) = client.set_volume(volume, device_id).await {
            debug!("Volume step {step} ({volume}%) failed: {e}");
        }
        last_volume = Some(volume);

        if step < job.steps {
            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                () = cancel.cancelled() => {}
            }
        }
    }

    FadeOutcome::Completed {
        last_volume: last_volume.unwrap_or(start_volume),
    }
}

/// Ramp from 0 to full volume until done or cancelled.
pub async fn fade_in<C: PlaybackClient>(
    client: &C,
    settings: &FadeSettings,
    device_id: Option<&str>,
    cancel: &CancellationToken,
) -> FadeOutcome {
    let job = settings.job(FadeDirection::In);
    run(client, &job, 0, device_id, cancel).await
}

/// Ramp from the device's current volume to 0, then pause.
pub async fn fade_out<C: PlaybackClient>(
    client: &C,
    settings: &FadeSettings,
    device_id: Option<&str>,
) -> FadeOutcome {
    let start_volume = current_volume(client).await;
    debug!("Fading out from {start_volume}%");

    let job = settings.job(FadeDirection::Out);
    let outcome = run(client, &job, start_volume, device_id, &CancellationToken::new()).await;

    if let Err(e) = client.pause(device_id).await {
        warn!("Failed to pause playback: {e}");
    }

    outcome
}

/// Current device volume, or full volume when it cannot be read.
async fn current_volume<C: PlaybackClient>(client: &C) -> u8 {
    match client.current_playback().await {
        Ok(snapshot) => snapshot
            .and_then(|s| s.volume())
            .unwrap_or(FULL_VOLUME),
        Err(e) => {
            debug!("Could not read current volume, assuming {FULL_VOLUME}%: {e}");
            FULL_VOLUME
        }
    }
}
