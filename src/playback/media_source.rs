use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc as tokio_mpsc;

/// Errors a media source can report. None of them are fatal to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MediaErrorKind {
    /// The source could not be resolved or decoded
    #[error("Failed to load media: {0}")]
    LoadError(String),
    /// The device blocked playback or the host interrupted it
    #[error("Playback refused: {0}")]
    PlaybackRefused(String),
}

/// Events pushed by a media source
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    MetadataLoaded { duration: f64 },
    TimeUpdate { time: f64 },
    Started,
    Paused,
    Ended,
    Error(MediaErrorKind),
}

/// Sending half handed to a media source on subscribe.
///
/// Safe to call from any thread; events are queued for the controller's owner.
#[derive(Debug, Clone)]
pub struct MediaEventSender {
    tx: tokio_mpsc::UnboundedSender<MediaEvent>,
}

impl MediaEventSender {
    pub fn new(tx: tokio_mpsc::UnboundedSender<MediaEvent>) -> Self {
        Self { tx }
    }

    /// Create a connected sender/receiver pair
    pub fn channel() -> (Self, tokio_mpsc::UnboundedReceiver<MediaEvent>) {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue an event. Returns false once the controller is gone.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// A playable resource driven by the controller.
///
/// Commands are requests: the source acknowledges them (or not) through
/// events sent to the subscribed [`MediaEventSender`].
pub trait MediaSource: Send + 'static {
    fn play(&mut self);
    fn pause(&mut self);
    fn set_current_time(&mut self, seconds: f64);
    fn set_volume(&mut self, level: f64);

    /// Start delivering events to `events`
    fn subscribe(&mut self, events: MediaEventSender);

    /// Stop delivering events. No event may be sent after this returns.
    fn unsubscribe(&mut self);
}

impl<S: MediaSource + ?Sized> MediaSource for Box<S> {
    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn set_current_time(&mut self, seconds: f64) {
        (**self).set_current_time(seconds)
    }

    fn set_volume(&mut self, level: f64) {
        (**self).set_volume(level)
    }

    fn subscribe(&mut self, events: MediaEventSender) {
        (**self).subscribe(events)
    }

    fn unsubscribe(&mut self) {
        (**self).unsubscribe()
    }
}
