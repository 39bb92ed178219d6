//! Message identity, mutable forwarding state, and the property bag.
//!
//! Grounded on the teacher's `simulation::types::Node` bookkeeping style
//! (bounded history pushes, explicit invariant comments) but modeling the
//! spec's `Message` value type: immutable identity plus mutable
//! path/TTL/forward-count/property state (spec §3, §4.2).

use std::collections::HashMap;
use std::fmt;

/// Priority level; higher variants are more important. A closed enum per
/// Design Note §9 ("strategy pluggability" / tagged unions over raw ints);
/// the numeric settings code (spec §6, `cachingPrioritizationStrategy` and
/// friends use small int codes) maps onto this at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn from_code(code: u8) -> Option<Priority> {
        match code {
            0 => Some(Priority::Low),
            1 => Some(Priority::Medium),
            2 => Some(Priority::High),
            _ => None,
        }
    }
}

/// Opaque values carried in a message's extension property map — for
/// application-plugin data that the core router does not itself interpret.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Message properties: the two well-known ones named by the spec
/// (subscription id, Spray-and-Wait copy count) as typed fields, plus an
/// opaque extension map for everything else (Design Note §9).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageProperties {
    pub sub_id: Option<u32>,
    pub spray_copies: Option<u32>,
    pub extra: HashMap<String, PropertyValue>,
}

/// Time-to-live: either a creation-relative deadline in minutes, or
/// infinite (the spec's `INFINITE` sentinel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ttl {
    Minutes(f64),
    Infinite,
}

impl Ttl {
    /// Absolute deadline in simulation seconds, or `None` if infinite.
    ///
    /// The stored value is a creation-relative deadline, not ticked: this
    /// recomputes the same deadline every call rather than counting down a
    /// stateful remaining-TTL field (spec §3 invariant).
    pub fn deadline(&self, creation_time: f64) -> Option<f64> {
        match self {
            Ttl::Minutes(minutes) => Some(creation_time + minutes * 60.0),
            Ttl::Infinite => None,
        }
    }

    pub fn is_expired(&self, creation_time: f64, now: f64) -> bool {
        match self.deadline(creation_time) {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// Remaining TTL in minutes, the `getTtl()` contract from spec §4.2.
    pub fn remaining_minutes(&self, creation_time: f64, now: f64) -> Option<f64> {
        match self.deadline(creation_time) {
            Some(deadline) => Some((deadline - now) / 60.0),
            None => None,
        }
    }
}

/// A DTN message: stable identity plus mutable forwarding state.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Unique (across a run) identifier.
    pub id: String,
    pub from: u32,
    /// `None` for topic/subscription messages with no single named
    /// recipient.
    pub to: Option<u32>,
    pub size: u64,
    pub priority: Priority,
    pub creation_time: f64,
    pub receive_time: Option<f64>,
    /// 0 means no response requested.
    pub response_size: u64,
    /// Set on a message generated as the reply to a request.
    pub is_response: bool,
    pub ttl: Ttl,
    forward_count: u32,
    /// Ordered hop path; `hops[0]` is always `from` (spec §3 invariant).
    hops: Vec<u32>,
    pub properties: MessageProperties,
}

impl Message {
    pub fn new(id: impl Into<String>, from: u32, to: Option<u32>, size: u64, priority: Priority, creation_time: f64, ttl: Ttl) -> Self {
        Message {
            id: id.into(),
            from,
            to,
            size,
            priority,
            creation_time,
            receive_time: None,
            response_size: 0,
            is_response: false,
            ttl,
            forward_count: 0,
            hops: vec![from],
            properties: MessageProperties::default(),
        }
    }

    pub fn forward_count(&self) -> u32 {
        self.forward_count
    }

    pub fn hops(&self) -> &[u32] {
        &self.hops
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }

    /// Replicate this message: a distinct clone with identical fields.
    /// Used whenever a message crosses onto a connection or into a new
    /// buffer, so mutation on one side never bleeds into the other.
    pub fn replicate(&self) -> Message {
        self.clone()
    }

    /// Deep-copy all mutable state from `other` into `self`, keeping this
    /// message's own identity fields (`id`, `from`, `to`) untouched is not
    /// implied — per spec §4.2 `copyFrom` overwrites everything, including
    /// collections, so this is a full field copy.
    pub fn copy_from(&mut self, other: &Message) {
        *self = other.clone();
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.properties.extra.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.extra.get(key)
    }

    pub fn add_node_on_path(&mut self, host: u32) {
        self.hops.push(host);
    }

    pub fn increment_forward_times(&mut self) {
        self.forward_count += 1;
    }

    pub fn set_receive_time(&mut self, time: f64) {
        self.receive_time = Some(time);
    }

    /// Mark this message as requesting a response of `size` bytes.
    pub fn set_request(&mut self, response_size: u64) {
        self.response_size = response_size;
    }

    pub fn is_response(&self) -> bool {
        self.is_response
    }

    pub fn ttl_deadline(&self) -> Option<f64> {
        self.ttl.deadline(self.creation_time)
    }

    pub fn is_expired(&self, now: f64) -> bool {
        self.ttl.is_expired(self.creation_time, now)
    }

    pub fn get_ttl(&self, now: f64) -> Option<f64> {
        self.ttl.remaining_minutes(self.creation_time, now)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}->{:?}, {}B]", self.id, self.from, self.to, self.size)
    }
}
