use crate::playback::media_source::{MediaErrorKind, MediaEvent, MediaEventSender, MediaSource};
use crate::playback::progress::{StateNotifier, StateSubscription};
use crate::playback::state::{PlaybackPhase, PlaybackState, TrackMeta};
use tracing::{debug, info, warn};

/// Translates UI commands into media source requests and media source
/// events into [`PlaybackState`].
///
/// Every method takes `&mut self`: whoever owns the controller is the single
/// writer. Commands never touch `is_playing`; only `Started`/`Paused`/
/// `Ended`/`Error` events do.
///
/// Dropping the controller unsubscribes from the media source before the
/// source itself is released, then closes all state subscriptions.
pub struct PlaybackController<S: MediaSource> {
    source: S,
    state: PlaybackState,
    notifier: StateNotifier,
    /// Set by the first `Started`
    has_started: bool,
}

impl<S: MediaSource> PlaybackController<S> {
    /// Take ownership of `source` and subscribe `events` to it
    pub fn mount(mut source: S, track: TrackMeta, events: MediaEventSender) -> Self {
        info!("Mounting playback controller for '{}'", track.title);
        source.subscribe(events);

        Self {
            source,
            state: PlaybackState::new(track),
            notifier: StateNotifier::new(),
            has_started: false,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state.clone()
    }

    pub fn subscribe(&self) -> StateSubscription {
        self.notifier.subscribe()
    }

    /// Shared handle to the state-changed signal
    pub fn notifier(&self) -> StateNotifier {
        self.notifier.clone()
    }

    /// Tear down explicitly. Same as dropping.
    pub fn unmount(self) {
        drop(self);
    }

    // ===== Commands =====

    /// Request play or pause depending on the current state.
    /// The state itself follows once the source acknowledges.
    pub fn toggle_play_pause(&mut self) {
        if self.state.is_playing {
            debug!("Requesting pause");
            self.source.pause();
        } else {
            debug!("Requesting play");
            self.source.play();
        }
    }

    pub fn seek(&mut self, target_seconds: f64) {
        self.commit(|this| this.seek_to(target_seconds));
    }

    pub fn set_volume(&mut self, level: f64) {
        self.commit(|this| {
            if level.is_nan() {
                warn!("Ignoring NaN volume");
                return;
            }
            // Adding 0.0 turns -0.0 into 0.0
            let level = level.clamp(0.0, 1.0) + 0.0;
            this.state.volume = level;
            this.state.is_muted = level == 0.0;
            debug!("Volume set to {:.2} (muted: {})", level, this.state.is_muted);
            this.apply_volume();
        });
    }

    pub fn toggle_mute(&mut self) {
        self.commit(|this| {
            this.state.is_muted = !this.state.is_muted;
            debug!("Mute toggled: {}", this.state.is_muted);
            this.apply_volume();
        });
    }

    pub fn toggle_repeat(&mut self) {
        self.commit(|this| this.state.is_repeat = !this.state.is_repeat);
    }

    pub fn toggle_shuffle(&mut self) {
        self.commit(|this| this.state.is_shuffle = !this.state.is_shuffle);
    }

    pub fn toggle_liked(&mut self) {
        self.commit(|this| this.state.is_liked = !this.state.is_liked);
    }

    // ===== Media source events =====

    pub fn handle_event(&mut self, event: MediaEvent) {
        debug!("Media event: {:?}", event);
        self.commit(|this| match event {
            MediaEvent::MetadataLoaded { duration } => this.on_metadata_loaded(duration),
            MediaEvent::TimeUpdate { time } => this.on_time_update(time),
            MediaEvent::Started => this.on_started(),
            MediaEvent::Paused => this.on_paused(),
            MediaEvent::Ended => this.on_ended(),
            MediaEvent::Error(kind) => this.on_error(kind),
        });
    }

    fn on_metadata_loaded(&mut self, duration: f64) {
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            if duration != 0.0 {
                warn!("Unusable duration {}, treating as unknown", duration);
            }
            0.0
        };

        self.state.duration = duration;
        self.state.current_time = clamp_time(self.state.current_time, duration);

        // An error before the first start leaves the track unplayed, not paused
        let unplayed = self.state.phase == PlaybackPhase::Idle
            || (self.state.phase == PlaybackPhase::Paused && !self.has_started);
        if duration > 0.0 && unplayed {
            info!("Track ready, duration {:.1}s", duration);
            self.state.phase = PlaybackPhase::Ready;
        }
    }

    fn on_time_update(&mut self, time: f64) {
        if !time.is_finite() {
            warn!("Ignoring non-finite time update {}", time);
            return;
        }
        self.state.current_time = clamp_time(time, self.state.duration);
    }

    fn on_started(&mut self) {
        self.has_started = true;
        self.state.is_playing = true;
        self.state.phase = PlaybackPhase::Playing;
        self.state.error = None;
    }

    fn on_paused(&mut self) {
        self.state.is_playing = false;
        if self.state.phase == PlaybackPhase::Playing {
            self.state.phase = PlaybackPhase::Paused;
        }
    }

    fn on_ended(&mut self) {
        self.state.is_playing = false;
        self.state.current_time = self.state.duration;
        self.state.phase = PlaybackPhase::Ended;

        if self.state.is_repeat {
            info!("Track ended, repeating");
            self.seek_to(0.0);
            self.source.play();
        } else {
            info!("Track ended");
        }
    }

    fn on_error(&mut self, kind: MediaErrorKind) {
        warn!("Media source error: {}", kind);
        self.state.is_playing = false;
        self.state.phase = PlaybackPhase::Paused;
        self.state.error = Some(kind);
    }

    // ===== Internals =====

    fn seek_to(&mut self, target_seconds: f64) {
        if target_seconds.is_nan() {
            warn!("Ignoring NaN seek target");
            return;
        }

        let position = clamp_time(target_seconds, self.state.duration);
        debug!("Seeking to {:.2}s (requested {:.2}s)", position, target_seconds);
        self.source.set_current_time(position);
        self.state.current_time = position;

        if self.state.phase == PlaybackPhase::Ended {
            self.state.phase = PlaybackPhase::Paused;
        }
    }

    fn apply_volume(&mut self) {
        self.source.set_volume(self.state.effective_volume());
    }

    /// Run one handler and publish the result if it changed anything
    fn commit<F: FnOnce(&mut Self)>(&mut self, handler: F) {
        let before = self.state.clone();
        handler(self);
        if self.state != before {
            self.notifier.publish(&self.state);
        }
    }
}

impl<S: MediaSource> Drop for PlaybackController<S> {
    fn drop(&mut self) {
        info!("Unmounting playback controller");
        self.source.unsubscribe();
        self.notifier.close();
    }
}

/// Clamp into `0..=duration`. `duration` is never negative or NaN.
fn clamp_time(time: f64, duration: f64) -> f64 {
    time.clamp(0.0, duration) + 0.0
}
