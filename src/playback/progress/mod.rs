pub mod handle;

use crate::playback::state::PlaybackState;
use handle::SubscriptionId;
pub use handle::StateNotifier;
use tokio::sync::mpsc as tokio_mpsc;

/// Receiving end of a state subscription.
///
/// Yields one snapshot per committed mutation. Yields `None` once the
/// controller has been torn down and all pending snapshots were read.
pub struct StateSubscription {
    id: SubscriptionId,
    rx: tokio_mpsc::UnboundedReceiver<PlaybackState>,
    notifier: StateNotifier,
}

impl StateSubscription {
    pub(crate) fn new(
        id: SubscriptionId,
        rx: tokio_mpsc::UnboundedReceiver<PlaybackState>,
        notifier: StateNotifier,
    ) -> Self {
        Self { id, rx, notifier }
    }

    pub async fn recv(&mut self) -> Option<PlaybackState> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for callers outside an async context
    pub fn try_recv(&mut self) -> Option<PlaybackState> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for StateSubscription {
    fn drop(&mut self) {
        self.notifier.remove(self.id);
    }
}
