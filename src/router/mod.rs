//! Router framework (spec §4.9): the shared admit/transfer/finalize/abort/
//! TTL-expire contract, broadcast-capable forwarding helpers, and the
//! subscription-aware epidemic and Spray-and-Wait variants.
//!
//! Per Design Note §9 ("deep inheritance"), `Router → BroadcastEnabledRouter
//! → EpidemicBroadcastRouterWithSubscriptions → ...` collapses into one
//! struct with a tagged [`RouterKind`] plus shared state, instead of a class
//! hierarchy. Broadcast-vs-unicast is not modeled as a separate layer since
//! every router kind this crate implements is broadcast-capable; unicast
//! send primitives live on [`crate::network_interface::NetworkInterface`].
//!
//! A `Router` does not own connections, interfaces, or listeners — it is
//! driven by [`crate::host::DTNHost`], which owns those, and reports back
//! what happened as a `Vec<RouterEvent>` for the caller to forward to
//! [`crate::reporting::ReportListener`]. This keeps the router testable in
//! isolation (see the tests below) without constructing a whole host/world.

pub mod hello;
pub mod spray_and_wait;
pub mod subscription;

use std::collections::HashSet;

use rand::Rng;

use crate::interference::ReceptionStatus;
use crate::message::{Message, Priority};
use crate::message_cache::MessageCacheManager;
use crate::network_interface::ReceiveOutcome;
use subscription::SubscriptionPolicy;

/// Interval between TTL sweeps of the buffer (spec §4.9).
pub const TTL_SWEEP_INTERVAL: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Removed,
    Dropped,
    Discarded,
    TtlExpiration,
}

/// Everything a router operation may need to report to listeners. Routers
/// never call listener methods themselves (they don't own the listener
/// list); callers drain and forward these.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterEvent {
    NewMessage { message: Message },
    TransmissionPerformed { message_id: String, source_interface: u32 },
    TransferStarted { message_id: String, from: u32, to: u32 },
    Transferred { message_id: String, from: u32, to: u32, first_delivery: bool, final_target: bool },
    TransferAborted { message_id: String, from: u32, to: u32, cause: String },
    TransmissionInterfered { message_id: String, from: u32, to: u32 },
    Deleted { message_id: String, host: u32, mode: DeleteMode, cause: String },
}

/// Router algorithm, as a tagged union (Design Note §9: "strategy
/// pluggability").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    EpidemicBroadcastWithSubscriptions,
    SprayAndWaitWithSubscriptions { binary_mode: bool, initial_copies: u32 },
}

/// The shared router state plus its algorithm tag. One `Router` per host.
pub struct Router {
    host: u32,
    kind: RouterKind,
    cache: MessageCacheManager,
    subscription: SubscriptionPolicy,
    delete_delivered: bool,
    delivered: HashSet<String>,
    last_ttl_sweep: f64,
}

impl Router {
    pub fn new(host: u32, kind: RouterKind, cache: MessageCacheManager, subscription: SubscriptionPolicy, delete_delivered: bool) -> Self {
        Router {
            host,
            kind,
            cache,
            subscription,
            delete_delivered,
            delivered: HashSet::new(),
            last_ttl_sweep: 0.0,
        }
    }

    pub fn host(&self) -> u32 {
        self.host
    }

    pub fn cache(&self) -> &MessageCacheManager {
        &self.cache
    }

    pub fn sorted_for_forwarding(&self, rng: &mut impl Rng) -> Vec<Message> {
        self.cache.sort_for_forwarding(rng)
    }

    fn spray_active_for(&self, msg: &Message) -> bool {
        matches!(self.kind, RouterKind::SprayAndWaitWithSubscriptions { .. }) && spray_and_wait::is_spraying(msg.properties.spray_copies.unwrap_or(1))
    }

    /// `createNewMessage` (spec §4.9): stamps Spray-and-Wait's initial copy
    /// count if applicable, makes room if needed, and admits.
    pub fn create_new_message(&mut self, mut msg: Message, protected: &HashSet<String>) -> Vec<RouterEvent> {
        if let RouterKind::SprayAndWaitWithSubscriptions { initial_copies, .. } = self.kind {
            msg.properties.spray_copies = Some(initial_copies);
        }

        let mut events = Vec::new();
        if let Some(evicted) = self.cache.make_room(msg.size, msg.priority, protected) {
            for id in evicted {
                events.push(RouterEvent::Deleted { message_id: id, host: self.host, mode: DeleteMode::Dropped, cause: "buffer full".to_string() });
            }
        }
        events.push(RouterEvent::NewMessage { message: msg.clone() });
        self.cache.add(msg);
        events
    }

    /// Pre-transfer admission check (TTL / duplicate), run before the
    /// interference-level reception begins (spec §4.9 base `receiveMessage`
    /// policy). Space checks happen later, at [`Router::message_transferred`],
    /// since buffer admission is a post-transfer decision (a dissemination
    /// policy rejection also happens post-transfer, per spec §7's failure
    /// semantics summary: "removes the partial transfer").
    pub fn pre_admit(&self, msg: &Message, now: f64) -> ReceiveOutcome {
        if msg.is_expired(now) {
            return ReceiveOutcome::DeniedTtl;
        }
        if self.cache.has(&msg.id) || self.delivered.contains(&msg.id) {
            return ReceiveOutcome::DeniedOld;
        }
        ReceiveOutcome::RcvOk
    }

    /// `messageTransferred` (spec §4.9): queries the interference status the
    /// caller observed, then runs the subscription accept/reject decision,
    /// Spray-and-Wait copy handoff, delivery bookkeeping, and buffer
    /// admission.
    pub fn message_transferred(&mut self, mut msg: Message, status: ReceptionStatus, from: u32, now: f64, protected: &HashSet<String>, rng: &mut impl Rng) -> Vec<RouterEvent> {
        if status == ReceptionStatus::Interference || status == ReceptionStatus::OutOfSynch {
            return vec![RouterEvent::TransmissionInterfered { message_id: msg.id.clone(), from, to: self.host }];
        }
        if status != ReceptionStatus::Ok {
            return Vec::new();
        }

        msg.set_receive_time(now);
        msg.add_node_on_path(self.host);

        let spray_active = self.spray_active_for(&msg);
        if !self.subscription.decide_receive(&msg, spray_active, rng) {
            return vec![RouterEvent::Deleted {
                message_id: msg.id.clone(),
                host: self.host,
                mode: DeleteMode::Discarded,
                cause: self.subscription.mode_name().to_string(),
            }];
        }

        if let RouterKind::SprayAndWaitWithSubscriptions { binary_mode, .. } = self.kind {
            let sender_copies_before = msg.properties.spray_copies.unwrap_or(1);
            msg.properties.spray_copies = Some(spray_and_wait::receiver_copies_on_admit(sender_copies_before, binary_mode));
        }

        // A message with no sub_id is a direct unicast addressed by host
        // (spec Scenario 1); only fall back to subscription matching for
        // topic-disseminated traffic.
        let is_final = match msg.properties.sub_id {
            Some(_) => self.subscription.subscribes(msg.properties.sub_id),
            None => msg.to == Some(self.host),
        };
        let first_delivery = is_final && !self.delivered.contains(&msg.id);
        if first_delivery {
            self.delivered.insert(msg.id.clone());
        }

        let mut events = vec![RouterEvent::Transferred {
            message_id: msg.id.clone(),
            from,
            to: self.host,
            first_delivery,
            final_target: is_final,
        }];

        let keep = !(is_final && self.delete_delivered);
        if keep && !self.cache.has(&msg.id) {
            if let Some(evicted) = self.cache.make_room(msg.size, msg.priority, protected) {
                for id in evicted {
                    events.push(RouterEvent::Deleted { message_id: id, host: self.host, mode: DeleteMode::Dropped, cause: "buffer full".to_string() });
                }
                self.cache.add(msg);
            }
        }

        events
    }

    pub fn message_aborted(&mut self, msg_id: &str, from: u32, _remaining: u64) -> Vec<RouterEvent> {
        vec![RouterEvent::TransferAborted { message_id: msg_id.to_string(), from, to: self.host, cause: "partial transfer".to_string() }]
    }

    pub fn message_interfered(&mut self, msg_id: &str, from: u32) -> Vec<RouterEvent> {
        vec![RouterEvent::TransmissionInterfered { message_id: msg_id.to_string(), from, to: self.host }]
    }

    pub fn delete_message(&mut self, id: &str, mode: DeleteMode, cause: &str) -> Vec<RouterEvent> {
        self.cache.remove(id);
        vec![RouterEvent::Deleted { message_id: id.to_string(), host: self.host, mode, cause: cause.to_string() }]
    }

    /// Hook fired after an interface's connection set changes; flushes the
    /// semi-porous send filter (spec §4.9).
    pub fn changed_connection(&mut self) {
        self.subscription.neighbor_set_changed();
    }

    /// Offer-to-peer decision for broadcast forwarding.
    ///
    /// The originating host always offers a message it created itself,
    /// bypassing the dissemination filter: STRICT/SEMI_POROUS gate whether a
    /// non-destination *relays a message it received*, not whether a
    /// publisher can inject its own message into the network (spec §4.9
    /// names the filter as a relay policy; a publisher that happened not to
    /// sample its own topic would otherwise orphan every message it
    /// creates).
    pub fn should_offer(&mut self, msg: &Message, peer: u32, rng: &mut impl Rng) -> bool {
        if msg.from == self.host {
            return true;
        }
        let spray_active = self.spray_active_for(msg);
        self.subscription.decide_send(msg, peer, spray_active, rng)
    }

    /// Called once a broadcast send actually goes out on the wire:
    /// increments the stored copy's forward-count and, for Spray-and-Wait,
    /// halves/decrements its local copy count (spec §4.9
    /// `tryBroadcastOneMessage`).
    pub fn on_broadcast_sent(&mut self, msg_id: &str, source_interface: u32) -> Vec<RouterEvent> {
        if let Some(msg) = self.cache.get_mut(msg_id) {
            msg.increment_forward_times();
            if let RouterKind::SprayAndWaitWithSubscriptions { binary_mode, .. } = self.kind {
                let before = msg.properties.spray_copies.unwrap_or(1);
                msg.properties.spray_copies = Some(spray_and_wait::sender_copies_after_spray(before, binary_mode));
            }
        }
        vec![RouterEvent::TransmissionPerformed { message_id: msg_id.to_string(), source_interface }]
    }

    /// TTL sweep, run at most once per [`TTL_SWEEP_INTERVAL`] simulated
    /// seconds (spec §4.9).
    pub fn update(&mut self, now: f64) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        while self.last_ttl_sweep + TTL_SWEEP_INTERVAL <= now {
            self.last_ttl_sweep += TTL_SWEEP_INTERVAL;
            let sweep_time = self.last_ttl_sweep;
            let expired: Vec<String> = self.cache.iter().filter(|m| m.is_expired(sweep_time)).map(|m| m.id.clone()).collect();
            for id in expired {
                events.extend(self.delete_message(&id, DeleteMode::TtlExpiration, "ttl expired"));
            }
        }
        events
    }
}
