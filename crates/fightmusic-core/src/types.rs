//! Core domain types for Fight Music.

pub mod device;
pub mod playlist;
pub mod track;

pub use device::{Device, PlaybackSnapshot, FULL_VOLUME};
pub use playlist::Playlist;
pub use track::{Track, TrackInfo, TrackUri};
