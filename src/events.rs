//! External event queue (spec §3 `World`, §4.11, Design Note §9
//! "event-queue polymorphism"): message create / priority-create / delete /
//! relay as one tagged union with a single ordering, rather than a family of
//! event classes. `World::apply_event` (in `world.rs`) is the single
//! dispatch function Design Note §9 calls for.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::message::{Priority, Ttl};

#[derive(Debug, Clone)]
pub enum ExternalEvent {
    CreateMessage { time: f64, id: String, from: u32, to: Option<u32>, size: u64, priority: Priority, ttl: Ttl, sub_id: Option<u32> },
    /// Same payload as `CreateMessage`, but jumps ahead of ordinary events
    /// scheduled at the identical timestamp.
    CreatePriorityMessage { time: f64, id: String, from: u32, to: Option<u32>, size: u64, priority: Priority, ttl: Ttl, sub_id: Option<u32> },
    DeleteMessage { time: f64, id: String, host: u32 },
    RelayMessage { time: f64, id: String, from: u32, to: u32 },
}

impl ExternalEvent {
    pub fn time(&self) -> f64 {
        match self {
            ExternalEvent::CreateMessage { time, .. }
            | ExternalEvent::CreatePriorityMessage { time, .. }
            | ExternalEvent::DeleteMessage { time, .. }
            | ExternalEvent::RelayMessage { time, .. } => *time,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ExternalEvent::CreatePriorityMessage { .. } => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
struct QueuedEvent {
    event: ExternalEvent,
    sequence: u64,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}
impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse time/rank/sequence so `pop`
        // yields the earliest-scheduled, highest-rank, first-inserted event.
        other
            .event
            .time()
            .total_cmp(&self.event.time())
            .then_with(|| other.event.rank().cmp(&self.event.rank()))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// The ordered external-event queue a `World` polls each tick.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn schedule(&mut self, event: ExternalEvent) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedEvent { event, sequence });
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|q| q.event.time())
    }

    pub fn pop(&mut self) -> Option<ExternalEvent> {
        self.heap.pop().map(|q| q.event)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_at(time: f64, id: &str) -> ExternalEvent {
        ExternalEvent::CreateMessage { time, id: id.to_string(), from: 0, to: None, size: 10, priority: Priority::Low, ttl: Ttl::Infinite, sub_id: None }
    }

    #[test]
    fn pops_in_time_order() {
        let mut q = EventQueue::new();
        q.schedule(create_at(5.0, "B"));
        q.schedule(create_at(1.0, "A"));
        q.schedule(create_at(3.0, "C"));
        assert_eq!(q.pop().unwrap().time(), 1.0);
        assert_eq!(q.pop().unwrap().time(), 3.0);
        assert_eq!(q.pop().unwrap().time(), 5.0);
    }

    #[test]
    fn same_timestamp_ties_break_by_insertion_order() {
        let mut q = EventQueue::new();
        q.schedule(create_at(1.0, "first"));
        q.schedule(create_at(1.0, "second"));
        let a = q.pop().unwrap();
        let b = q.pop().unwrap();
        match (a, b) {
            (ExternalEvent::CreateMessage { id: id_a, .. }, ExternalEvent::CreateMessage { id: id_b, .. }) => {
                assert_eq!(id_a, "first");
                assert_eq!(id_b, "second");
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn priority_create_jumps_ahead_of_same_timestamp_events() {
        let mut q = EventQueue::new();
        q.schedule(create_at(1.0, "ordinary"));
        q.schedule(ExternalEvent::CreatePriorityMessage {
            time: 1.0,
            id: "urgent".to_string(),
            from: 0,
            to: None,
            size: 10,
            priority: Priority::High,
            ttl: Ttl::Infinite,
            sub_id: None,
        });
        let first = q.pop().unwrap();
        assert!(matches!(first, ExternalEvent::CreatePriorityMessage { .. }));
    }

    #[test]
    fn peek_time_does_not_remove() {
        let mut q = EventQueue::new();
        q.schedule(create_at(2.0, "A"));
        assert_eq!(q.peek_time(), Some(2.0));
        assert_eq!(q.len(), 1);
    }
}
