use crate::playback::controller::PlaybackController;
use crate::playback::media_source::{MediaEvent, MediaEventSender, MediaSource};
use crate::playback::progress::{StateNotifier, StateSubscription};
use crate::playback::state::{PlaybackState, TrackMeta};
use thiserror::Error;
use tokio::sync::{mpsc as tokio_mpsc, oneshot};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PlaybackServiceError {
    #[error("Playback service has stopped")]
    Stopped,
}

/// Playback commands sent to the service
#[derive(Debug)]
pub enum PlaybackCommand {
    TogglePlayPause,
    Seek(f64), // seconds
    SetVolume(f64),
    ToggleMute,
    ToggleRepeat,
    ToggleShuffle,
    ToggleLiked,
    Snapshot(oneshot::Sender<PlaybackState>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the playback service for sending commands.
///
/// All command methods return immediately; the resulting state arrives
/// through [`PlaybackHandle::subscribe`]. The service stops once every
/// handle is dropped or [`PlaybackHandle::shutdown`] is called.
#[derive(Clone)]
pub struct PlaybackHandle {
    command_tx: tokio_mpsc::UnboundedSender<PlaybackCommand>,
    notifier: StateNotifier,
}

impl PlaybackHandle {
    pub fn toggle_play_pause(&self) {
        self.send(PlaybackCommand::TogglePlayPause);
    }

    pub fn seek(&self, seconds: f64) {
        self.send(PlaybackCommand::Seek(seconds));
    }

    pub fn set_volume(&self, level: f64) {
        self.send(PlaybackCommand::SetVolume(level));
    }

    pub fn toggle_mute(&self) {
        self.send(PlaybackCommand::ToggleMute);
    }

    pub fn toggle_repeat(&self) {
        self.send(PlaybackCommand::ToggleRepeat);
    }

    pub fn toggle_shuffle(&self) {
        self.send(PlaybackCommand::ToggleShuffle);
    }

    pub fn toggle_liked(&self) {
        self.send(PlaybackCommand::ToggleLiked);
    }

    /// Current state, after every command sent before this call was applied
    pub async fn snapshot(&self) -> Result<PlaybackState, PlaybackServiceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(PlaybackCommand::Snapshot(reply_tx))
            .map_err(|_| PlaybackServiceError::Stopped)?;
        reply_rx.await.map_err(|_| PlaybackServiceError::Stopped)
    }

    pub fn subscribe(&self) -> StateSubscription {
        self.notifier.subscribe()
    }

    /// Current state plus a subscription to every change after it.
    /// Subscribes first, so no change falls between the two.
    pub async fn watch(
        &self,
    ) -> Result<(PlaybackState, StateSubscription), PlaybackServiceError> {
        let subscription = self.subscribe();
        let state = self.snapshot().await?;
        Ok((state, subscription))
    }

    /// Stop the service and wait until the media source is released
    pub async fn shutdown(&self) -> Result<(), PlaybackServiceError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.command_tx
            .send(PlaybackCommand::Shutdown(ack_tx))
            .map_err(|_| PlaybackServiceError::Stopped)?;
        ack_rx.await.map_err(|_| PlaybackServiceError::Stopped)
    }

    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }

    fn send(&self, command: PlaybackCommand) {
        if let Err(e) = self.command_tx.send(command) {
            debug!("Playback service stopped, dropping {:?}", e.0);
        }
    }
}

/// Owns the controller on a single task.
///
/// Commands and media events are both queued and applied one at a time,
/// so no two mutations of the playback state ever interleave.
pub struct PlaybackService<S: MediaSource> {
    controller: PlaybackController<S>,
    command_rx: tokio_mpsc::UnboundedReceiver<PlaybackCommand>,
    event_rx: tokio_mpsc::UnboundedReceiver<MediaEvent>,
}

impl<S: MediaSource> PlaybackService<S> {
    pub fn start(
        source: S,
        track: TrackMeta,
        runtime_handle: tokio::runtime::Handle,
    ) -> PlaybackHandle {
        let (command_tx, command_rx) = tokio_mpsc::unbounded_channel();
        let (events, event_rx) = MediaEventSender::channel();

        let controller = PlaybackController::mount(source, track, events);
        let handle = PlaybackHandle {
            command_tx,
            notifier: controller.notifier(),
        };

        let service = PlaybackService {
            controller,
            command_rx,
            event_rx,
        };
        runtime_handle.spawn(service.run());

        handle
    }

    async fn run(mut self) {
        info!("PlaybackService started");

        let shutdown_ack = loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(PlaybackCommand::Shutdown(ack)) => break Some(ack),
                    Some(command) => self.apply(command),
                    None => {
                        info!("All playback handles dropped");
                        break None;
                    }
                },
                Some(event) = self.event_rx.recv() => {
                    self.controller.handle_event(event);
                }
            }
        };

        // Unsubscribe and release the source before anything else is dropped
        let PlaybackService {
            controller,
            command_rx,
            event_rx,
        } = self;
        drop(command_rx);
        controller.unmount();
        drop(event_rx);

        info!("PlaybackService stopped");

        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
    }

    fn apply(&mut self, command: PlaybackCommand) {
        debug!("Playback command: {:?}", command);
        match command {
            PlaybackCommand::TogglePlayPause => self.controller.toggle_play_pause(),
            PlaybackCommand::Seek(seconds) => self.controller.seek(seconds),
            PlaybackCommand::SetVolume(level) => self.controller.set_volume(level),
            PlaybackCommand::ToggleMute => self.controller.toggle_mute(),
            PlaybackCommand::ToggleRepeat => self.controller.toggle_repeat(),
            PlaybackCommand::ToggleShuffle => self.controller.toggle_shuffle(),
            PlaybackCommand::ToggleLiked => self.controller.toggle_liked(),
            PlaybackCommand::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
            // Handled by the run loop
            PlaybackCommand::Shutdown(_) => {}
        }
    }
}
