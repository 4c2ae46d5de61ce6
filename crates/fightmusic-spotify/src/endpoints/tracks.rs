//! Track metadata endpoint.

use fightmusic_core::{Error, Result, TrackInfo, TrackUri};

use crate::types::RawTrack;
use crate::SpotifyClient;

impl SpotifyClient {
    /// Get display metadata for a track.
    pub async fn get_track(&self, uri: &TrackUri) -> Result<TrackInfo> {
        let path = format!("tracks/{}", uri.id());
        let track: Option<RawTrack> = self.get(&path, &[]).await?;
        track
            .map(TrackInfo::from)
            .ok_or_else(|| Error::Api(format!("empty response for {uri}")))
    }
}
