use crate::playback::TrackMeta;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Player configuration
/// In debug builds: loads a .env file first if one exists
#[derive(Clone, Debug)]
pub struct Config {
    /// Audio file to play
    pub track_path: Option<PathBuf>,
    /// Metadata shown for the track
    pub track: TrackMeta,
    /// Interval between time updates while playing
    pub position_update_interval: Duration,
    /// Silence the output device (tests, CI)
    pub mute_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            track_path: None,
            track: TrackMeta::default(),
            position_update_interval: Duration::from_millis(250),
            mute_output: false,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Config: loaded .env file");
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |name: &str, default: String| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };

        let track = TrackMeta {
            title: text("DECKPLAY_TRACK_TITLE", defaults.track.title),
            artist: text("DECKPLAY_TRACK_ARTIST", defaults.track.artist),
            album: text("DECKPLAY_TRACK_ALBUM", defaults.track.album),
            cover_art: text("DECKPLAY_COVER_ART", defaults.track.cover_art),
        };

        let track_path = lookup("DECKPLAY_TRACK_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let position_update_interval = match lookup("DECKPLAY_POSITION_INTERVAL_MS") {
            Some(value) => parse_interval("DECKPLAY_POSITION_INTERVAL_MS", &value)?,
            None => defaults.position_update_interval,
        };

        let mute_output = match lookup("DECKPLAY_MUTE_OUTPUT") {
            Some(value) => parse_bool("DECKPLAY_MUTE_OUTPUT", &value)?,
            None => defaults.mute_output,
        };

        if let Some(path) = &track_path {
            info!("Config: track path {}", path.display());
        }

        Ok(Self {
            track_path,
            track,
            position_update_interval,
            mute_output,
        })
    }
}

fn parse_interval(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let millis: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason: "expected milliseconds",
    })?;

    if millis == 0 {
        return Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "must be greater than zero",
        });
    }

    Ok(Duration::from_millis(millis))
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}
