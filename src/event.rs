//! # event.rs - Coalescing event box
//!
//! The event box is the only synchronisation primitive connecting the
//! reader, the coordinator and the display side. It is a map from event
//! type to the latest value posted for that type, guarded by a mutex and a
//! condition variable.
//!
//! The defining property is **coalescing**: multiple rapid `set` calls for
//! the same type collapse to one entry, and the consumer observes only the
//! latest value. A burst of `ReadNew` notifications therefore wakes the
//! coordinator once instead of queueing up. Ordering between distinct
//! event types is not preserved; the consumer drains all pending types
//! atomically inside `wait`.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::merger::Merger;
use crate::pattern::Pattern;

/// The event kinds flowing through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The reader appended new items to the chunk store
    ReadNew,
    /// The producer reached EOF (or failed; see `Value::Error`)
    ReadFin,
    /// The query changed; payload is the new pattern
    SearchNew,
    /// A search is running; payload is the completed percentage
    SearchProgress,
    /// A search finished; payload is the new merger
    SearchFin,
    /// Header records diverted by `--header-lines`
    Header,
    /// Shut the pipeline down
    Close,
}

/// Payload attached to an event. `None` for pure notifications.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    /// Completed percentage of a running search
    Progress(u8),
    /// A parsed pattern for `SearchNew`
    Pattern(Arc<Pattern>),
    /// The merger produced by a finished search
    Merger(Arc<Merger>),
    /// Error annotation, e.g. on `ReadFin`
    Error(String),
    /// Diverted header records
    Header(Vec<String>),
}

/// Coalescing multi-producer / single-consumer event queue.
#[derive(Default)]
pub struct EventBox {
    events: Mutex<HashMap<EventType, Value>>,
    cond: Condvar,
}

impl EventBox {
    pub fn new() -> Self {
        EventBox::default()
    }

    /// Post an event, overwriting any pending value for the same type, and
    /// wake one waiter.
    pub fn set(&self, event: EventType, value: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.insert(event, value);
            self.cond.notify_one();
        }
    }

    /// Block until at least one event is pending, then run `handler` with
    /// the map while the lock is held. The handler typically drains the
    /// map; entries it leaves in place stay pending for the next wait.
    pub fn wait<F>(&self, handler: F)
    where
        F: FnOnce(&mut HashMap<EventType, Value>),
    {
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        while events.is_empty() {
            events = match self.cond.wait(events) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
        handler(&mut events);
    }

    /// Non-blocking peek: is an event of this type pending?
    pub fn peek(&self, event: EventType) -> bool {
        self.events
            .lock()
            .map(|events| events.contains_key(&event))
            .unwrap_or(false)
    }

    /// Non-blocking snapshot of all pending events. The box keeps them.
    pub fn poll(&self) -> Vec<(EventType, Value)> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(t, v)| (*t, v.clone())).collect())
            .unwrap_or_default()
    }

    /// Remove and return the pending value for one event type.
    pub fn take(&self, event: EventType) -> Option<Value> {
        self.events.lock().ok()?.remove(&event)
    }

    /// Drop all pending events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_coalescing_keeps_last_value() {
        let events = EventBox::new();
        for pct in [10u8, 35, 70, 99] {
            events.set(EventType::SearchProgress, Value::Progress(pct));
        }

        let mut seen = None;
        events.wait(|map| {
            assert_eq!(map.len(), 1, "repeated sets must coalesce to one entry");
            seen = map.remove(&EventType::SearchProgress);
        });

        match seen {
            Some(Value::Progress(99)) => {}
            other => panic!("expected the last posted value, got {:?}", other),
        }
    }

    #[test]
    fn test_distinct_types_coexist() {
        let events = EventBox::new();
        events.set(EventType::ReadNew, Value::None);
        events.set(EventType::ReadFin, Value::None);

        let mut types = Vec::new();
        events.wait(|map| {
            types = map.keys().copied().collect();
            map.clear();
        });
        types.sort_by_key(|t| format!("{:?}", t));
        assert_eq!(types.len(), 2, "distinct types must not coalesce");
    }

    #[test]
    fn test_wait_blocks_until_set() {
        let events = Arc::new(EventBox::new());
        let producer = {
            let events = Arc::clone(&events);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                events.set(EventType::Close, Value::None);
            })
        };

        let mut got_close = false;
        events.wait(|map| {
            got_close = map.remove(&EventType::Close).is_some();
        });
        producer.join().expect("producer should not panic");
        assert!(got_close, "wait must observe the event posted by the producer");
    }

    #[test]
    fn test_peek_and_clear() {
        let events = EventBox::new();
        assert!(!events.peek(EventType::ReadNew));
        events.set(EventType::ReadNew, Value::None);
        assert!(events.peek(EventType::ReadNew), "peek should see pending events");
        assert_eq!(events.poll().len(), 1, "poll should snapshot without draining");
        assert!(events.peek(EventType::ReadNew), "poll must not consume");
        events.clear();
        assert!(!events.peek(EventType::ReadNew), "clear should drop everything");
    }

    #[test]
    fn test_take_removes_single_type() {
        let events = EventBox::new();
        events.set(EventType::ReadNew, Value::None);
        events.set(EventType::SearchProgress, Value::Progress(50));
        let taken = events.take(EventType::SearchProgress);
        assert!(matches!(taken, Some(Value::Progress(50))));
        assert!(events.peek(EventType::ReadNew), "take must leave other types pending");
        assert!(events.take(EventType::SearchProgress).is_none());
    }
}
