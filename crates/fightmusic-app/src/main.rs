//! # Fight Music
//!
//! Press the side mouse button to fade in a random track on Spotify from
//! its configured start point; press it again to fade it out and pause.

mod config;
mod input;

use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use config::Config;
use fightmusic_core::PlaybackClient;
use fightmusic_player::ToggleController;
use fightmusic_spotify::{Authenticator, SpotifyClient, TokenCache};
use input::Press;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fightmusic=info,fightmusic_app=info,fightmusic_player=info,fightmusic_spotify=info"
                    .into()
            }),
        )
        .init();

    info!("Starting Fight Music v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("Failed to load configuration")?;
    let playlist = config.playlist()?;
    info!("Loaded {} track(s)", playlist.len());

    // Authorization is the only failure allowed to stop the program
    let auth = Authenticator::new(config.credentials()?)?.with_cache(TokenCache::default_location()?);
    let client = SpotifyClient::connect(auth)
        .await
        .context("Spotify authorization failed")?;
    info!("Spotify authenticated successfully!");

    let toggle = ToggleController::new(Arc::new(client), playlist, config.fade_settings());
    let presses =
        input::spawn_listener(config.trigger.button).context("Failed to start the mouse listener")?;

    info!("Fight Music Controller Started");
    info!("Press {} to play/stop music", config.trigger.button);
    info!("Make sure Spotify is open and active!");
    info!("Press Ctrl+C to exit");

    run(&toggle, presses, tokio::signal::ctrl_c()).await
}

/// Handle presses in order until `shutdown` resolves.
///
/// Shutdown is observed even while a press is waiting on remote calls.
async fn run<C: PlaybackClient>(
    toggle: &ToggleController<C>,
    mut presses: UnboundedReceiver<Press>,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    let handle_presses = async {
        while let Some(Press) = presses.recv().await {
            let outcome = toggle.on_press().await;
            debug!("Press handled: {outcome:?}");
        }
    };

    tokio::select! {
        () = handle_presses => bail!("Mouse listener stopped"),
        signal = shutdown => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("Shutting down");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::future::pending;
    use std::time::Duration;

    use fightmusic_core::{Device, PlaybackSnapshot, Playlist, Track, TrackInfo, TrackUri};
    use fightmusic_player::FadeSettings;
    use tokio::sync::mpsc;

    /// A remote player that never answers.
    struct Unresponsive;

    impl PlaybackClient for Unresponsive {
        fn devices(&self) -> impl Future<Output = fightmusic_core::Result<Vec<Device>>> + Send {
            pending()
        }

        fn current_playback(
            &self,
        ) -> impl Future<Output = fightmusic_core::Result<Option<PlaybackSnapshot>>> + Send {
            pending()
        }

        fn start_playback(
            &self,
            _device_id: &str,
            _uri: &TrackUri,
            _position_ms: u64,
        ) -> impl Future<Output = fightmusic_core::Result<()>> + Send {
            pending()
        }

        fn set_volume(
            &self,
            _volume: u8,
            _device_id: Option<&str>,
        ) -> impl Future<Output = fightmusic_core::Result<()>> + Send {
            pending()
        }

        fn pause(
            &self,
            _device_id: Option<&str>,
        ) -> impl Future<Output = fightmusic_core::Result<()>> + Send {
            pending()
        }

        fn track_info(
            &self,
            _uri: &TrackUri,
        ) -> impl Future<Output = fightmusic_core::Result<TrackInfo>> + Send {
            pending()
        }
    }

    fn toggle() -> ToggleController<Unresponsive> {
        let uri = TrackUri::parse("spotify:track:ABC123").unwrap();
        let playlist = Playlist::new(vec![Track::new(uri, 0)]).unwrap();
        ToggleController::new(Arc::new(Unresponsive), playlist, FadeSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_stalled_press() {
        let toggle = toggle();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Press).unwrap();

        let shutdown = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        };

        tokio::time::timeout(Duration::from_secs(60), run(&toggle, rx, shutdown))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_listener_is_an_error() {
        let toggle = toggle();
        let (tx, rx) = mpsc::unbounded_channel::<Press>();
        drop(tx);

        let err = run(&toggle, rx, pending()).await.unwrap_err();
        assert!(err.to_string().contains("Mouse listener stopped"));
    }
}
