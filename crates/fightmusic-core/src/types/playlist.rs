//! The configured track list.

use rand::seq::SliceRandom;
use rand::Rng;

use super::Track;
use crate::{Error, Result};

/// Fixed, non-empty list of tracks to pick from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    /// Create a playlist. Fails when `tracks` is empty.
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(Error::Config("track list is empty".to_string()));
        }
        Ok(Self { tracks })
    }

    /// Pick a track uniformly at random. Picks are independent.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &Track {
        // Non-empty by construction
        self.tracks.choose(rng).unwrap_or(&self.tracks[0])
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.tracks.contains(track)
    }
}
