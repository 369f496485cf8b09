//! Fan-out of status events to subscribers.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{StatusEvent, StatusSubscription, SubscriptionId};

/// Default buffered events per subscriber.
pub const DEFAULT_BUFFER_SIZE: usize = 64;

/// Broadcasts status events. Slow subscribers are dropped, never waited on.
pub struct StatusBroadcaster {
    subscribers: RwLock<HashMap<SubscriptionId, Sender<StatusEvent>>>,
    next_id: AtomicU64,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> StatusSubscription {
        self.subscribe_with_buffer(DEFAULT_BUFFER_SIZE)
    }

    pub fn subscribe_with_buffer(&self, buffer_size: usize) -> StatusSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(buffer_size.max(1));
        self.subscribers.write().insert(id, sender);
        StatusSubscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Send to every subscriber, removing those that are full or gone.
    pub fn broadcast(&self, event: StatusEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscribers.read();
            for (id, sender) in subs.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                        to_remove.push(*id);
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                if let Some(sender) = subs.remove(&id) {
                    debug!(subscription = id.0, "dropping status subscriber");
                    let _ = sender.try_send(StatusEvent::Dropped);
                }
            }
        }
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SaveStatus;
    use crate::types::DocumentId;

    fn pending() -> StatusEvent {
        StatusEvent::Status {
            document: DocumentId::from("d"),
            status: SaveStatus::Pending,
        }
    }

    #[test]
    fn test_broadcast_reaches_all_subscribers() {
        let broadcaster = StatusBroadcaster::new();
        let a = broadcaster.subscribe();
        let b = broadcaster.subscribe();

        broadcaster.broadcast(pending());

        assert_eq!(a.try_recv().unwrap(), pending());
        assert_eq!(b.try_recv().unwrap(), pending());
    }

    #[test]
    fn test_full_subscriber_is_dropped() {
        let broadcaster = StatusBroadcaster::new();
        let slow = broadcaster.subscribe_with_buffer(1);

        broadcaster.broadcast(pending());
        broadcaster.broadcast(pending());

        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(slow.drain(), vec![pending()]);
    }

    #[test]
    fn test_disconnected_subscriber_is_removed() {
        let broadcaster = StatusBroadcaster::new();
        let sub = broadcaster.subscribe();
        drop(sub);
        broadcaster.broadcast(pending());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
