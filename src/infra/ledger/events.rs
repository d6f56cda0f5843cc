//! Committed ledger events awaiting delivery.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::infra::lock::mutex_lock;

const SOURCE: &str = "marquee::ledger::events";

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Monotonic position of an event within this process.
pub type Epoch = u64;

/// An event whose transaction has been committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedEvent {
    pub id: Uuid,
    pub epoch: Epoch,
    pub block: u64,
    pub tx_id: String,
    pub name: String,
    /// Decoded JSON when the payload is JSON, otherwise a string.
    pub payload: Value,
}

/// Bounded FIFO of committed events. When full, the oldest event is dropped.
pub struct EventQueue {
    queue: Mutex<VecDeque<CommittedEvent>>,
    epoch_counter: AtomicU64,
    capacity: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::new_with_limit(DEFAULT_EVENT_CAPACITY)
    }

    pub fn new_with_limit(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn publish(&self, block: u64, tx_id: &str, name: &str, payload: &[u8]) {
        let payload = serde_json::from_slice(payload)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()));
        let event = CommittedEvent {
            id: Uuid::new_v4(),
            epoch: self.next_epoch(),
            block,
            tx_id: tx_id.to_string(),
            name: name.to_string(),
            payload,
        };

        info!(
            target = SOURCE,
            event_id = %event.id,
            event_epoch = event.epoch,
            event_name = %event.name,
            tx_id,
            block,
            "ledger event published"
        );
        counter!("marquee_events_published_total", "event" => event.name.clone()).increment(1);

        let mut queue = mutex_lock(&self.queue, SOURCE, "publish");
        if queue.len() >= self.capacity
            && let Some(dropped) = queue.pop_front()
        {
            counter!("marquee_events_dropped_total").increment(1);
            warn!(
                target = SOURCE,
                event_id = %dropped.id,
                event_name = %dropped.name,
                capacity = self.capacity,
                "event queue full; dropped oldest event"
            );
        }
        queue.push_back(event);
        gauge!("marquee_event_queue_len").set(queue.len() as f64);
    }

    /// Removes up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<CommittedEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained = queue.drain(..count).collect();
        gauge!("marquee_event_queue_len").set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_drain_in_publish_order() {
        let queue = EventQueue::new();
        queue.publish(1, "tx-a", "ContentRequested", br#"{"catalog_id":"tt1375666"}"#);
        queue.publish(2, "tx-b", "ContentApproved", br#"{"catalog_id":"tt1375666"}"#);

        let events = queue.drain(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "ContentRequested");
        assert_eq!(events[1].name, "ContentApproved");
        assert!(events[0].epoch < events[1].epoch);
        assert_eq!(events[0].payload["catalog_id"], "tt1375666");
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_drops_the_oldest_event() {
        let queue = EventQueue::new_with_limit(2);
        for (block, name) in ["A", "B", "C"].into_iter().enumerate() {
            queue.publish(block as u64, "tx", name, b"{}");
        }

        let names: Vec<_> = queue.drain(10).into_iter().map(|event| event.name).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn non_json_payloads_are_kept_as_text() {
        let queue = EventQueue::new();
        queue.publish(1, "tx", "Raw", b"plain text");
        assert_eq!(queue.drain(1)[0].payload, Value::String("plain text".into()));
    }
}
