//! # fightmusic-player
//!
//! The play/stop toggle and the volume fades behind it.
//!
//! A press while idle starts a random track at volume 0 and fades it in;
//! a press while playing fades it out and pauses. Fades run on spawned
//! tokio tasks so the input source is never blocked.

pub mod fade;
pub mod state;
pub mod toggle;

#[cfg(test)]
pub(crate) mod mock;

pub use fade::{FadeDirection, FadeJob, FadeOutcome, FadeSettings};
pub use state::PlaybackState;
pub use toggle::{PressOutcome, ToggleController};
