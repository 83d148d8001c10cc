//! Priority bus — the ordered, multi-producer queue between cells.
//!
//! Entries are ordered by a `(key, seq)` pair. A declared priority `p`
//! in `[1, 5]` maps to key `6 - p`, so priority 5 drains first, and the
//! bus-wide monotonically increasing sequence number resolves equal keys
//! in submission order. Coordinator lifecycle broadcasts share key 1
//! with priority-5 cell traffic and therefore interleave with it
//! deterministically instead of colliding; message contents are never
//! compared.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use cytokine_core::cell::MessageSender;
use cytokine_core::message::{Message, PRIORITY_MAX, PRIORITY_MIN};

/// Ordering key for coordinator lifecycle broadcasts (drains soonest).
pub const LIFECYCLE_KEY: u8 = 1;

/// Map a declared priority to its bus ordering key.
pub fn ordering_key(priority: u8) -> u8 {
    PRIORITY_MAX + 1 - priority.clamp(PRIORITY_MIN, PRIORITY_MAX)
}

struct Entry {
    key: u8,
    seq: u64,
    message: Message,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // BinaryHeap is a max-heap; reversed so the smallest (key, seq)
    // pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.key, other.seq).cmp(&(self.key, self.seq))
    }
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

/// Multi-producer, single-consumer ordered queue of pending messages.
pub struct PriorityBus {
    state: Mutex<State>,
    available: Condvar,
}

impl PriorityBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: Condvar::new(),
        }
    }

    /// Enqueue a cell-originated message under its declared priority.
    pub fn push(&self, message: Message) {
        self.push_with_key(ordering_key(message.priority), message);
    }

    /// Enqueue under an explicit ordering key. Used by the coordinator
    /// for `system_start` / `system_stop` traffic.
    pub fn push_with_key(&self, key: u8, message: Message) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry { key, seq, message });
        self.available.notify_one();
    }

    /// Pop the smallest-keyed entry, waiting up to `timeout` for one to
    /// arrive. Returns `None` on timeout.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(entry) = state.heap.pop() {
                return Some(entry.message);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .heap
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriorityBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSender for PriorityBus {
    fn send(&self, message: Message) -> bool {
        self.push(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cytokine_core::types::{MessageKind, Target};
    use serde_json::Value;

    fn msg(kind: &str, priority: i32) -> Message {
        Message::new(kind, "test", Target::Broadcast, Value::Null, priority)
    }

    #[test]
    fn higher_priority_drains_first() {
        let bus = PriorityBus::new();
        bus.push(msg("low", 1));
        bus.push(msg("urgent", 5));
        bus.push(msg("mid", 3));

        let timeout = Duration::from_millis(10);
        assert_eq!(bus.pop_timeout(timeout).unwrap().kind.as_str(), "urgent");
        assert_eq!(bus.pop_timeout(timeout).unwrap().kind.as_str(), "mid");
        assert_eq!(bus.pop_timeout(timeout).unwrap().kind.as_str(), "low");
    }

    #[test]
    fn equal_priority_drains_in_submission_order() {
        let bus = PriorityBus::new();
        for i in 0..10 {
            bus.push(msg(&format!("m{}", i), 3));
        }
        for i in 0..10 {
            let popped = bus.pop_timeout(Duration::from_millis(10)).unwrap();
            assert_eq!(popped.kind.as_str(), format!("m{}", i));
        }
    }

    #[test]
    fn lifecycle_key_ties_with_priority_five_resolve_by_submission() {
        let bus = PriorityBus::new();
        bus.push(msg("user_urgent", 5));
        bus.push_with_key(LIFECYCLE_KEY, msg("system_stop", 5));
        bus.push(msg("late_urgent", 5));

        let timeout = Duration::from_millis(10);
        assert_eq!(bus.pop_timeout(timeout).unwrap().kind.as_str(), "user_urgent");
        assert_eq!(
            bus.pop_timeout(timeout).unwrap().kind,
            MessageKind::SystemStop
        );
        assert_eq!(bus.pop_timeout(timeout).unwrap().kind.as_str(), "late_urgent");
    }

    #[test]
    fn pop_times_out_on_empty_bus() {
        let bus = PriorityBus::new();
        let start = Instant::now();
        assert!(bus.pop_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn pop_wakes_on_concurrent_push() {
        let bus = std::sync::Arc::new(PriorityBus::new());
        let producer = std::sync::Arc::clone(&bus);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(msg("late", 3));
        });

        let popped = bus.pop_timeout(Duration::from_secs(2));
        handle.join().unwrap();
        assert_eq!(popped.unwrap().kind.as_str(), "late");
    }

    #[test]
    fn ordering_key_inverts_priority() {
        assert_eq!(ordering_key(5), 1);
        assert_eq!(ordering_key(1), 5);
        assert_eq!(ordering_key(3), 3);
    }

    #[test]
    fn len_tracks_pending_entries() {
        let bus = PriorityBus::new();
        assert!(bus.is_empty());
        bus.push(msg("a", 1));
        bus.push(msg("b", 2));
        assert_eq!(bus.len(), 2);
        bus.pop_timeout(Duration::from_millis(10));
        assert_eq!(bus.len(), 1);
    }
}
