use super::StateSubscription;
use crate::playback::state::PlaybackState;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, info};

pub(crate) type SubscriptionId = u64;

struct Subscription {
    tx: tokio_mpsc::UnboundedSender<PlaybackState>,
}

/// Fan-out of state snapshots to every live subscriber
#[derive(Clone)]
pub struct StateNotifier {
    subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>>,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl StateNotifier {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to state changes.
    /// The subscription is removed when the returned value is dropped.
    pub fn subscribe(&self) -> StateSubscription {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut subs = self.lock();
        // Once closed, hand out a subscription that is already at its end
        if !self.closed.load(Ordering::SeqCst) {
            subs.insert(id, Subscription { tx });
            debug!("State subscription {} added", id);
        }
        drop(subs);

        StateSubscription::new(id, rx, self.clone())
    }

    /// Deliver one snapshot to all subscribers
    pub fn publish(&self, state: &PlaybackState) {
        let mut subs = self.lock();
        let mut to_remove = Vec::new();

        for (id, subscription) in subs.iter() {
            // If send fails, receiver was dropped - mark for removal
            if subscription.tx.send(state.clone()).is_err() {
                to_remove.push(*id);
            }
        }

        for id in to_remove {
            subs.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every subscription; receivers see the end of their stream
    pub fn close(&self) {
        let mut subs = self.lock();
        self.closed.store(true, Ordering::SeqCst);
        if !subs.is_empty() {
            info!("Closing {} state subscription(s)", subs.len());
        }
        subs.clear();
    }

    pub(crate) fn remove(&self, id: SubscriptionId) {
        if self.lock().remove(&id).is_some() {
            debug!("State subscription {} removed", id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateNotifier {
    fn default() -> Self {
        Self::new()
    }
}
