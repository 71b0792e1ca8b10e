//! Per-subscriber event fan-out
//!
//! Every subscriber gets its own bucket with an independent mailbox. Dispatch
//! appends a copy of each event to every current bucket under that bucket's
//! own lock, so a slow subscriber never blocks dispatch to the others. The
//! mailbox is unbounded; subscribers are expected to drain it continuously.

use super::Event;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// A single subscriber's mailbox.
pub struct EventBucket {
    id: Uuid,
    mailbox: Mutex<VecDeque<Event>>,
}

impl EventBucket {
    fn new(id: Uuid) -> Self {
        EventBucket {
            id,
            mailbox: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.mailbox.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailbox.lock().unwrap().is_empty()
    }

    fn push_all(&self, events: &[Event]) {
        let mut mailbox = self.mailbox.lock().unwrap();
        mailbox.extend(events.iter().cloned());
    }

    /// Atomically remove and return all queued events in FIFO order.
    pub fn drain(&self) -> Vec<Event> {
        let mut mailbox = self.mailbox.lock().unwrap();
        mailbox.drain(..).collect()
    }
}

/// In-process pub/sub fan-out.
#[derive(Default)]
pub struct EventBus {
    buckets: Mutex<HashMap<Uuid, Arc<EventBucket>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty bucket and register it for dispatch.
    pub fn subscribe(&self) -> Arc<EventBucket> {
        let bucket = Arc::new(EventBucket::new(Uuid::new_v4()));
        self.buckets
            .lock()
            .unwrap()
            .insert(bucket.id(), Arc::clone(&bucket));
        debug!("event bucket {} subscribed", bucket.id());
        bucket
    }

    /// Remove a bucket. Further dispatches silently skip it; the subscriber
    /// keeps sole ownership of whatever was still queued.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.buckets.lock().unwrap().remove(&id).is_some();
        if removed {
            debug!("event bucket {} unsubscribed", id);
        }
        removed
    }

    /// Append a copy of each event, in order, to every current bucket.
    pub fn dispatch(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        // Snapshot the bucket set so no global lock is held while appending.
        let targets: Vec<Arc<EventBucket>> =
            self.buckets.lock().unwrap().values().cloned().collect();
        for bucket in targets {
            bucket.push_all(events);
        }
    }

    /// Dispatch a single event.
    pub fn emit(&self, event: Event) {
        self.dispatch(std::slice::from_ref(&event));
    }

    pub fn subscriber_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn ev(name: &str) -> Event {
        Event::new(name, Map::new())
    }

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn fan_out_preserves_order_per_bucket() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.dispatch(&[ev("A"), ev("B"), ev("C")]);

        assert_eq!(names(&a.drain()), ["A", "B", "C"]);
        assert_eq!(names(&b.drain()), ["A", "B", "C"]);

        // Drained means gone.
        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());
    }

    #[test]
    fn unsubscribed_bucket_is_skipped() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        assert!(bus.unsubscribe(a.id()));
        bus.dispatch(&[ev("D")]);

        assert!(a.is_empty());
        assert_eq!(names(&b.drain()), ["D"]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn dispatch_with_no_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.dispatch(&[ev("A")]);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn late_subscriber_only_sees_later_events() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        bus.emit(ev("early"));
        let b = bus.subscribe();
        bus.emit(ev("late"));

        assert_eq!(names(&a.drain()), ["early", "late"]);
        assert_eq!(names(&b.drain()), ["late"]);
    }
}
