// Library exports for the player binary and integration tests

pub mod config;
pub mod playback;
pub mod ui;

pub use config::{Config, ConfigError};
pub use playback::{PlaybackHandle, PlaybackService, PlaybackState};
