use crate::playback::media_source::MediaErrorKind;
use serde::{Deserialize, Serialize};

/// Metadata for the loaded track. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_art: String,
}

impl Default for TrackMeta {
    fn default() -> Self {
        Self {
            title: "Midnight Dreams".to_string(),
            artist: "The Cosmic Band".to_string(),
            album: "Stellar Journeys".to_string(),
            cover_art: "/api/placeholder/300/300".to_string(),
        }
    }
}

/// Where the player is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// Duration not known yet
    Idle,
    /// Duration known, playback never started
    Ready,
    Playing,
    Paused,
    /// Reached the end of the track
    Ended,
}

/// Snapshot of everything the UI renders from.
///
/// Owned by the controller; everyone else sees clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Seconds, always within `0..=duration`
    pub current_time: f64,
    /// Seconds, 0 while unknown
    pub duration: f64,
    /// Last user-set level in `0..=1`, kept while muted
    pub volume: f64,
    pub is_muted: bool,
    pub is_repeat: bool,
    pub is_shuffle: bool,
    pub is_liked: bool,
    pub track: TrackMeta,
    pub phase: PlaybackPhase,
    /// Last error reported by the media source, cleared once playback starts again
    pub error: Option<MediaErrorKind>,
}

impl PlaybackState {
    pub fn new(track: TrackMeta) -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: 1.0,
            is_muted: false,
            is_repeat: false,
            is_shuffle: false,
            is_liked: false,
            track,
            phase: PlaybackPhase::Idle,
            error: None,
        }
    }

    /// The level actually written to the media source
    pub fn effective_volume(&self) -> f64 {
        if self.is_muted {
            0.0
        } else {
            self.volume
        }
    }

    pub fn is_duration_known(&self) -> bool {
        self.duration > 0.0
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(TrackMeta::default())
    }
}
