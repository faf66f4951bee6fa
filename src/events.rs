//! Activity feed for claim and save commits.
//!
//! Sessions publish an [`ActivityEvent`] after every committed mutation so a
//! presentation layer can refresh its views without polling the store.
//! Each subscriber gets a bounded queue; subscribers that fall behind or go
//! away are dropped on the next publish.

use crate::types::{Revision, Timestamp, ValidatorId};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Default number of events buffered per subscriber.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Something a validator committed.
#[derive(Clone, Debug, PartialEq)]
pub enum ActivityEvent {
    /// Rows moved from unassigned to `user`.
    Claimed {
        user: ValidatorId,
        rows: Vec<usize>,
        revision: Revision,
        at: Timestamp,
    },
    /// A label was saved for one row.
    Saved {
        user: ValidatorId,
        row: usize,
        revision: Revision,
        at: Timestamp,
    },
}

impl ActivityEvent {
    pub fn revision(&self) -> Revision {
        match self {
            ActivityEvent::Claimed { revision, .. } | ActivityEvent::Saved { revision, .. } => {
                *revision
            }
        }
    }
}

/// Receiving end of a subscription.
pub struct EventHandle {
    pub id: SubscriptionId,
    receiver: Receiver<ActivityEvent>,
}

impl EventHandle {
    /// Next event without blocking.
    pub fn try_recv(&self) -> Option<ActivityEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ActivityEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything currently queued.
    pub fn drain(&self) -> Vec<ActivityEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Fan-out of activity events to subscribers.
pub struct EventBus {
    subscribers: RwLock<HashMap<SubscriptionId, Sender<ActivityEvent>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe with a queue of `buffer_size` events.
    pub fn subscribe(&self, buffer_size: usize) -> EventHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(buffer_size.max(1));
        self.subscribers.write().insert(id, sender);
        EventHandle { id, receiver }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event` to every subscriber, dropping those that can't keep up.
    pub fn publish(&self, event: ActivityEvent) {
        let mut dropped = Vec::new();
        {
            let subs = self.subscribers.read();
            for (id, sender) in subs.iter() {
                if sender.try_send(event.clone()).is_err() {
                    dropped.push(*id);
                }
            }
        }

        if !dropped.is_empty() {
            let mut subs = self.subscribers.write();
            for id in dropped {
                warn!(subscription = id.0, "dropping slow or closed subscriber");
                subs.remove(&id);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
