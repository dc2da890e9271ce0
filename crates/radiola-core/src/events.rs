//! Notification bus for state/level/device change events
//!
//! Every subscriber owns a bounded crossbeam channel. Publishing is a
//! `try_send` to each of them, so a slow subscriber only loses its own
//! events and never stalls the publisher (which may be the fade worker or
//! a lifecycle call racing the audio callback).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crossbeam::channel::{Receiver, Sender, TrySendError};

/// Default per-subscriber queue depth
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fan-out event bus
///
/// Subscribers receive value snapshots (`T: Clone`), never references into
/// the publishing component.
pub struct EventBus<T> {
    subscribers: Mutex<Vec<Sender<T>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T: Clone> EventBus<T> {
    /// Create a new event bus with the given per-subscriber capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = crossbeam::channel::bounded(self.capacity);
        self.lock().push(tx);
        rx
    }

    /// Publish an event to every live subscriber (never blocks)
    pub fn publish(&self, event: T) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Events lost because a subscriber queue was full
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<T>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(7u32);

        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_full_subscriber_does_not_block_publisher() {
        let bus = EventBus::new(1);
        let rx = bus.subscribe();

        bus.publish(1u32);
        bus.publish(2u32);

        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.dropped_events(), 1);
    }

    #[test]
    fn test_disconnected_subscribers_are_pruned() {
        let bus = EventBus::new(4);
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(rx);
        bus.publish(1u32);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
