pub mod controller;
#[cfg(feature = "cpal-output")]
pub mod cpal_source;
pub mod media_source;
pub mod progress;
pub mod service;
pub mod state;
pub mod symphonia_decoder;

pub use controller::PlaybackController;
#[cfg(feature = "cpal-output")]
pub use cpal_source::{CpalMediaSource, CpalSourceOptions};
pub use media_source::{MediaErrorKind, MediaEvent, MediaEventSender, MediaSource};
pub use progress::{StateNotifier, StateSubscription};
pub use service::{PlaybackHandle, PlaybackService, PlaybackServiceError};
pub use state::{PlaybackPhase, PlaybackState, TrackMeta};
pub use symphonia_decoder::{DecoderError, TrackDecoder};
