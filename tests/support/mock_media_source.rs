use deckplay::playback::{MediaEvent, MediaEventSender, MediaSource};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One request the controller made of the source
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Subscribe,
    Unsubscribe,
    Play,
    Pause,
    SetCurrentTime(f64),
    SetVolume(f64),
    Released,
}

#[derive(Default)]
struct Shared {
    calls: Vec<MockCall>,
    events: Option<MediaEventSender>,
}

/// In-memory media source for service tests.
///
/// Records every call. With `responsive()`, play and pause are acknowledged
/// immediately the way a healthy device would.
pub struct MockMediaSource {
    shared: Arc<Mutex<Shared>>,
    responsive: bool,
}

/// Test-side view of a [`MockMediaSource`] after it moved into the service
#[derive(Clone)]
pub struct MockSourceHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MockMediaSource {
    /// A source that never acknowledges anything on its own
    pub fn new() -> (Self, MockSourceHandle) {
        Self::build(false)
    }

    /// A source that answers play with `Started` and pause with `Paused`
    pub fn responsive() -> (Self, MockSourceHandle) {
        Self::build(true)
    }

    fn build(responsive: bool) -> (Self, MockSourceHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: shared.clone(),
                responsive,
            },
            MockSourceHandle { shared },
        )
    }

    fn record(&self, call: MockCall) -> Option<MediaEventSender> {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(call);
        shared.events.clone()
    }
}

impl MediaSource for MockMediaSource {
    fn play(&mut self) {
        let events = self.record(MockCall::Play);
        if self.responsive {
            if let Some(events) = events {
                events.emit(MediaEvent::Started);
            }
        }
    }

    fn pause(&mut self) {
        let events = self.record(MockCall::Pause);
        if self.responsive {
            if let Some(events) = events {
                events.emit(MediaEvent::Paused);
            }
        }
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.record(MockCall::SetCurrentTime(seconds));
    }

    fn set_volume(&mut self, level: f64) {
        self.record(MockCall::SetVolume(level));
    }

    fn subscribe(&mut self, events: MediaEventSender) {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(MockCall::Subscribe);
        shared.events = Some(events);
    }

    fn unsubscribe(&mut self) {
        let mut shared = self.shared.lock().unwrap();
        shared.calls.push(MockCall::Unsubscribe);
        shared.events = None;
    }
}

impl Drop for MockMediaSource {
    fn drop(&mut self) {
        debug!("MockMediaSource released");
        self.shared.lock().unwrap().calls.push(MockCall::Released);
    }
}

impl MockSourceHandle {
    /// Push an event as if the source produced it.
    /// Returns false when nobody is subscribed.
    pub fn emit(&self, event: MediaEvent) -> bool {
        let events = self.shared.lock().unwrap().events.clone();
        match events {
            Some(events) => events.emit(event),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.lock().unwrap().events.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.calls().contains(&MockCall::Released)
    }
}
