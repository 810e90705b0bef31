use super::format::format_time;
use crate::playback::{PlaybackPhase, PlaybackState};
use serde::Serialize;

/// What the main transport button should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayIndicator {
    Play,
    Pause,
    /// The source reported an error. Pressing play still retries.
    Unavailable,
}

/// Everything a now-playing bar renders, derived from one state snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlayingView {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_art: String,
    pub elapsed: String,
    pub total: String,
    /// Position as a fraction of the duration, 0 while the duration is unknown
    pub progress: f64,
    /// Value for the volume slider: 0 while muted
    pub slider_volume: f64,
    pub play_indicator: PlayIndicator,
    pub phase: PlaybackPhase,
    pub is_muted: bool,
    pub is_repeat: bool,
    pub is_shuffle: bool,
    pub is_liked: bool,
    pub error: Option<String>,
}

impl NowPlayingView {
    pub fn from_state(state: &PlaybackState) -> Self {
        let progress = if state.is_duration_known() {
            (state.current_time / state.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let play_indicator = if state.is_playing {
            PlayIndicator::Pause
        } else if state.error.is_some() {
            PlayIndicator::Unavailable
        } else {
            PlayIndicator::Play
        };

        Self {
            title: state.track.title.clone(),
            artist: state.track.artist.clone(),
            album: state.track.album.clone(),
            cover_art: state.track.cover_art.clone(),
            elapsed: format_time(Some(state.current_time)),
            total: format_time(Some(state.duration)),
            progress,
            slider_volume: state.effective_volume(),
            play_indicator,
            phase: state.phase,
            is_muted: state.is_muted,
            is_repeat: state.is_repeat,
            is_shuffle: state.is_shuffle,
            is_liked: state.is_liked,
            error: state.error.as_ref().map(|e| e.to_string()),
        }
    }
}

impl From<&PlaybackState> for NowPlayingView {
    fn from(state: &PlaybackState) -> Self {
        Self::from_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::MediaErrorKind;

    #[test]
    fn test_fresh_state_view() {
        let view = NowPlayingView::from_state(&PlaybackState::default());

        assert_eq!(view.title, "Midnight Dreams");
        assert_eq!(view.artist, "The Cosmic Band");
        assert_eq!(view.elapsed, "0:00");
        assert_eq!(view.total, "0:00");
        assert_eq!(view.progress, 0.0);
        assert_eq!(view.slider_volume, 1.0);
        assert_eq!(view.play_indicator, PlayIndicator::Play);
        assert_eq!(view.phase, PlaybackPhase::Idle);
    }

    #[test]
    fn test_playing_view() {
        let mut state = PlaybackState::default();
        state.duration = 200.0;
        state.current_time = 50.0;
        state.is_playing = true;
        state.phase = PlaybackPhase::Playing;

        let view = NowPlayingView::from_state(&state);
        assert_eq!(view.elapsed, "0:50");
        assert_eq!(view.total, "3:20");
        assert_eq!(view.progress, 0.25);
        assert_eq!(view.play_indicator, PlayIndicator::Pause);
    }

    #[test]
    fn test_muted_slider_shows_zero() {
        let mut state = PlaybackState::default();
        state.volume = 0.6;
        state.is_muted = true;

        let view = NowPlayingView::from_state(&state);
        assert_eq!(view.slider_volume, 0.0);
        assert!(view.is_muted);
    }

    #[test]
    fn test_error_marks_play_unavailable() {
        let mut state = PlaybackState::default();
        state.error = Some(MediaErrorKind::PlaybackRefused("autoplay blocked".to_string()));

        let view = NowPlayingView::from_state(&state);
        assert_eq!(view.play_indicator, PlayIndicator::Unavailable);
        assert_eq!(
            view.error.as_deref(),
            Some("Playback refused: autoplay blocked")
        );
    }

    #[test]
    fn test_serializes_for_host_ui() {
        let view = NowPlayingView::from_state(&PlaybackState::default());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["play_indicator"], "play");
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["elapsed"], "0:00");
    }
}
