//! The simulation orchestrator (spec §3 `World`, §4.11): owns the dense
//! host vector, the connection table, the per-interface interference
//! models, the per-interface-type connectivity grids, and the external
//! event queue; drives the per-tick update algorithm.
//!
//! Per Design Note §9, hosts/interfaces/connections are index-addressable
//! rather than linked by owned references — `World` is the one place that
//! resolves an interface address to its owning host or a connection id to
//! its `Connection`.

use std::collections::HashMap;

use rand::seq::SliceRandom;

use crate::connection::Connection;
use crate::connectivity_optimizer::ConnectivityOptimizer;
use crate::context::SimulationContext;
use crate::coord::in_range;
use crate::events::{EventQueue, ExternalEvent};
use crate::host::DTNHost;
use crate::interference::InterferenceModel;
use crate::message::Message;
use crate::network_interface::{begin_reception, ReceiveOutcome};
use crate::reporting::ReportListener;
use crate::router::{DeleteMode, RouterEvent};

/// Whether newly established connections of an interface-type run at a
/// fixed bit rate or a variable one re-derived each tick (spec §4.5). Not
/// itself a named setting in spec §6's surface, but required to pick which
/// `Connection` constructor a freshly discovered link uses; exposed as
/// `Interface.<name>.transferMode` and documented as a settings addition in
/// DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Cbr,
    Vbr,
}

pub struct World {
    hosts: Vec<DTNHost>,
    connections: HashMap<u64, Connection>,
    /// One interference model per *receiving* interface address — the
    /// naive model's contention check (spec §4.4) only makes sense scoped
    /// to a single receiver.
    interference_models: HashMap<u32, InterferenceModel>,
    /// One connectivity grid per interface-type name (spec §4.7).
    grids: HashMap<String, ConnectivityOptimizer>,
    /// interface address -> owning host address, built once at construction
    /// (interfaces never move between hosts after binding).
    interface_owner: HashMap<u32, u32>,
    link_modes: HashMap<String, LinkMode>,
    events: EventQueue,
    context: SimulationContext,
    clock: crate::clock::Clock,
    last_update_time: f64,
    update_interval: f64,
    randomize_update_order: bool,
    vbr_tick_scaled: bool,
    listeners: Vec<Box<dyn ReportListener>>,
    cancel: bool,
}

impl World {
    pub fn new(hosts: Vec<DTNHost>, grids: HashMap<String, ConnectivityOptimizer>, context: SimulationContext, update_interval: f64, randomize_update_order: bool) -> Self {
        let mut interface_owner = HashMap::new();
        for host in &hosts {
            for iface in &host.interfaces {
                interface_owner.insert(iface.address, host.address);
            }
        }
        World {
            hosts,
            connections: HashMap::new(),
            interference_models: HashMap::new(),
            grids,
            interface_owner,
            link_modes: HashMap::new(),
            events: EventQueue::new(),
            context,
            clock: crate::clock::Clock::new(),
            last_update_time: 0.0,
            update_interval,
            randomize_update_order,
            vbr_tick_scaled: false,
            listeners: Vec::new(),
            cancel: false,
        }
    }

    pub fn set_link_mode(&mut self, interface_type: impl Into<String>, mode: LinkMode) {
        self.link_modes.insert(interface_type.into(), mode);
    }

    pub fn set_vbr_tick_scaled(&mut self, scaled: bool) {
        self.vbr_tick_scaled = scaled;
    }

    pub fn add_listener(&mut self, listener: Box<dyn ReportListener>) {
        self.listeners.push(listener);
    }

    pub fn schedule_event(&mut self, event: ExternalEvent) {
        self.events.schedule(event);
    }

    pub fn hosts(&self) -> &[DTNHost] {
        &self.hosts
    }

    pub fn hosts_mut(&mut self) -> &mut [DTNHost] {
        &mut self.hosts
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
    }

    fn link_mode_for(&self, interface_type: &str) -> LinkMode {
        self.link_modes.get(interface_type).copied().unwrap_or(LinkMode::Cbr)
    }

    /// Warm-up (spec §4.11): time runs backward from `-duration` toward
    /// zero, moving hosts but never processing events or calling router
    /// update.
    pub fn warm_up(&mut self, duration: f64, step: f64) {
        self.clock.set(-duration);
        while self.clock.now() < 0.0 {
            let dt = step.min(-self.clock.now());
            self.move_hosts(dt);
            self.clock.advance(dt);
        }
        self.clock.set(0.0);
        self.last_update_time = 0.0;
    }

    fn move_hosts(&mut self, dt: f64) {
        for host in &mut self.hosts {
            host.move_host(dt, &mut self.context.update_order_rng);
        }
    }

    /// One `World::update()` tick (spec §4.11).
    pub fn update(&mut self) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        let run_until = self.clock.now() + self.update_interval;

        loop {
            if self.cancel {
                return events;
            }
            match self.events.peek_time() {
                Some(t) if t <= run_until => {
                    self.clock.set(t);
                    let event = self.events.pop().expect("peeked Some above");
                    events.extend(self.apply_event(event));
                    events.extend(self.update_all_hosts());
                }
                _ => break,
            }
        }

        let remaining = (run_until - self.clock.now()).max(0.0);
        if remaining > 0.0 {
            self.move_hosts(remaining);
        }
        self.clock.set(run_until);
        events.extend(self.update_all_hosts());
        self.dispatch(&events);
        events
    }

    fn host_update_order(&mut self) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.hosts.len() as u32).collect();
        if self.randomize_update_order {
            order.shuffle(&mut self.context.update_order_rng);
        }
        order
    }

    fn apply_event(&mut self, event: ExternalEvent) -> Vec<RouterEvent> {
        match event {
            ExternalEvent::CreateMessage { time: _, id, from, to, size, priority, ttl, sub_id } | ExternalEvent::CreatePriorityMessage { time: _, id, from, to, size, priority, ttl, sub_id } => {
                let mut msg = Message::new(id, from, to, size, priority, self.clock.now(), ttl);
                msg.properties.sub_id = sub_id;
                let protected = Default::default();
                self.hosts[from as usize].router.create_new_message(msg, &protected)
            }
            ExternalEvent::DeleteMessage { time: _, id, host } => self.hosts[host as usize].router.delete_message(&id, DeleteMode::Removed, "external delete event"),
            ExternalEvent::RelayMessage { time: _, id, from, to } => self.force_relay(&id, from, to),
        }
    }

    /// An external event forcing an immediate relay between two named
    /// hosts, bypassing the normal scan cadence (spec §3: events "may
    /// create/delete messages or force connections").
    fn force_relay(&mut self, message_id: &str, from: u32, to: u32) -> Vec<RouterEvent> {
        let Some((iface_a, iface_b)) = self.shared_interface_pair(from, to) else {
            return Vec::new();
        };
        let already_connected = self.hosts[from as usize].interface(iface_a).map(|i| i.connections.iter().any(|&cid| self.connections[&cid].to_interface == iface_b || self.connections[&cid].from_interface == iface_b)).unwrap_or(false);
        if !already_connected {
            self.connect(from, iface_a, to, iface_b);
        }
        let Some(msg) = self.hosts[from as usize].router.cache().get(message_id).cloned() else {
            return Vec::new();
        };
        let conn_id = self.connection_between(from, iface_a, to, iface_b);
        match conn_id {
            Some(cid) => self.start_transfer(cid, from, msg),
            None => Vec::new(),
        }
    }

    fn shared_interface_pair(&self, host_a: u32, host_b: u32) -> Option<(u32, u32)> {
        let a = &self.hosts[host_a as usize];
        let b = &self.hosts[host_b as usize];
        for ia in &a.interfaces {
            for ib in &b.interfaces {
                if ia.interface_type == ib.interface_type {
                    return Some((ia.address, ib.address));
                }
            }
        }
        None
    }

    fn connection_between(&self, host_a: u32, iface_a: u32, host_b: u32, iface_b: u32) -> Option<u64> {
        let _ = (host_a, host_b);
        self.connections
            .values()
            .find(|c| (c.from_interface == iface_a && c.to_interface == iface_b) || (c.from_interface == iface_b && c.to_interface == iface_a))
            .map(|c| c.id)
    }

    fn connect(&mut self, host_a: u32, iface_a: u32, host_b: u32, iface_b: u32) -> u64 {
        let id = self.context.allocate_connection_id();
        let type_name = self.hosts[host_a as usize].interface(iface_a).map(|i| i.interface_type.clone()).unwrap_or_default();
        let speed_a = self.hosts[host_a as usize].interface(iface_a).map(|i| i.transmit_speed).unwrap_or(0.0);
        let speed_b = self.hosts[host_b as usize].interface(iface_b).map(|i| i.transmit_speed).unwrap_or(0.0);
        let connection = match self.link_mode_for(&type_name) {
            LinkMode::Cbr => Connection::new_cbr(id, host_a, iface_a, host_b, iface_b, speed_a.min(speed_b)),
            LinkMode::Vbr => Connection::new_vbr(id, host_a, iface_a, host_b, iface_b),
        };
        self.connections.insert(id, connection);
        if let Some(i) = self.hosts[host_a as usize].interface_mut(iface_a) {
            i.connections.push(id);
        }
        if let Some(i) = self.hosts[host_b as usize].interface_mut(iface_b) {
            i.connections.push(id);
        }
        self.hosts[host_a as usize].router.changed_connection();
        self.hosts[host_b as usize].router.changed_connection();
        id
    }

    /// Tear down a connection: finalizes a completed-but-unfinalized
    /// transfer, aborts an in-progress one, and notifies both routers
    /// (spec §4.6 "Bidirectional connect/disconnect").
    fn disconnect(&mut self, conn_id: u64) -> Vec<RouterEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();
        if let Some(conn) = self.connections.get(&conn_id) {
            if conn.transfer.is_some() {
                events.extend(if conn.is_message_transferred(now) { self.finalize(conn_id) } else { self.abort(conn_id) });
            }
        }
        if let Some(conn) = self.connections.remove(&conn_id) {
            if let Some(i) = self.hosts[conn.from_host as usize].interface_mut(conn.from_interface) {
                i.connections.retain(|&id| id != conn_id);
            }
            if let Some(i) = self.hosts[conn.to_host as usize].interface_mut(conn.to_interface) {
                i.connections.retain(|&id| id != conn_id);
            }
            self.hosts[conn.from_host as usize].router.changed_connection();
            self.hosts[conn.to_host as usize].router.changed_connection();
        }
        events
    }

    fn receiver_of(&self, conn: &Connection) -> (u32, u32, u32) {
        // Returns (sender_host, receiver_host, receiver_interface).
        let sender_host = conn.transfer.as_ref().map(|t| t.sender_host).unwrap_or(conn.from_host);
        if sender_host == conn.from_host {
            (conn.from_host, conn.to_host, conn.to_interface)
        } else {
            (conn.to_host, conn.from_host, conn.from_interface)
        }
    }

    fn start_transfer(&mut self, conn_id: u64, sender_host: u32, msg: Message) -> Vec<RouterEvent> {
        let now = self.clock.now();
        let msg_id = msg.id.clone();
        let (receiver_host, receiver_interface) = {
            let conn = &self.connections[&conn_id];
            if conn.from_host == sender_host {
                (conn.to_host, conn.to_interface)
            } else {
                (conn.from_host, conn.from_interface)
            }
        };
        let receiver_decision = self.hosts[receiver_host as usize].router.pre_admit(&msg, now);

        let conn = self.connections.get_mut(&conn_id).expect("connection exists");
        conn.start_transfer(now, sender_host, msg);
        let snapshot = conn.handle_at(now);
        let model = self.interference_models.entry(receiver_interface).or_default();
        let other_in_progress = model.any_reception_in_progress_excluding(conn_id);
        let status = if other_in_progress { ReceiveOutcome::DeniedInterference } else { receiver_decision };
        let (effective, proceeds) = begin_reception(model, self.connections.get(&conn_id).unwrap(), &self.connections[&conn_id].transfer.as_ref().unwrap().message.clone(), now, status);
        let _ = effective;

        if !proceeds {
            let conn = self.connections.get_mut(&conn_id).expect("connection exists");
            conn.abort_transfer(now);
            return Vec::new();
        }

        let _ = snapshot;
        vec![RouterEvent::TransferStarted { message_id: msg_id, from: sender_host, to: receiver_host }]
    }

    fn finalize(&mut self, conn_id: u64) -> Vec<RouterEvent> {
        let now = self.clock.now();
        let (sender_host, receiver_host, receiver_interface) = {
            let conn = &self.connections[&conn_id];
            self.receiver_of(conn)
        };
        let msg_id = self.connections[&conn_id].transfer.as_ref().map(|t| t.message.id.clone()).unwrap_or_default();

        let status = {
            let conn = &self.connections[&conn_id];
            let snapshot = conn.handle_at(now);
            let model = self.interference_models.entry(receiver_interface).or_default();
            let status = model.is_message_transferred_correctly(&msg_id, &snapshot);
            model.retrieve_transferred_message(&msg_id, &snapshot);
            status
        };

        let conn = self.connections.get_mut(&conn_id).expect("connection exists");
        let delivered = conn.finalize_transfer(now);

        let protected = Default::default();
        let mut rng = rand::thread_rng();
        self.hosts[receiver_host as usize].router.message_transferred(delivered, status, sender_host, now, &protected, &mut rng)
    }

    fn abort(&mut self, conn_id: u64) -> Vec<RouterEvent> {
        let now = self.clock.now();
        let (_, receiver_host, _) = {
            let conn = &self.connections[&conn_id];
            self.receiver_of(conn)
        };
        let conn = self.connections.get_mut(&conn_id).expect("connection exists");
        let sender_interface_addr = conn.handle_at(now).sender_interface_address;
        let (msg, remaining) = conn.abort_transfer(now);

        if let Some(model) = self.interference_models.get_mut(&sender_interface_addr) {
            model.abort_message_reception(&msg.id, sender_interface_addr);
        }

        self.hosts[receiver_host as usize].router.message_aborted(&msg.id, conn.from_host, remaining)
    }

    /// Refresh one interface's connection set: scan for new in-range
    /// neighbors and drop ones that have wandered out of range (spec §4.6).
    fn refresh_connectivity(&mut self, host_addr: u32, iface_addr: u32) -> Vec<RouterEvent> {
        let now = self.clock.now();
        let (interface_type, position, range, should_scan) = {
            let host = &self.hosts[host_addr as usize];
            let iface = host.interface(iface_addr).expect("interface belongs to this host");
            (iface.interface_type.clone(), host.location, iface.transmit_range, iface.is_scanning(now))
        };

        let mut events = Vec::new();

        // Drop connections that are now out of range.
        let connection_ids: Vec<u64> = self.hosts[host_addr as usize].interface(iface_addr).expect("interface exists").connections.clone();
        for conn_id in connection_ids {
            let Some(conn) = self.connections.get(&conn_id) else { continue };
            let (peer_host, peer_iface) = if conn.from_interface == iface_addr { (conn.to_host, conn.to_interface) } else { (conn.from_host, conn.from_interface) };
            let peer_pos = self.hosts[peer_host as usize].location;
            let peer_range = self.hosts[peer_host as usize].interface(peer_iface).map(|i| i.transmit_range).unwrap_or(0.0);
            if !in_range(&position, range, &peer_pos, peer_range) {
                events.extend(self.disconnect(conn_id));
            }
        }

        if !should_scan {
            return events;
        }
        if let Some(i) = self.hosts[host_addr as usize].interface_mut(iface_addr) {
            i.mark_scanned(now);
        }

        let grid = self.grids.entry(interface_type.clone()).or_insert_with(|| ConnectivityOptimizer::new(2.0, range.max(1.0)));
        grid.update_position(iface_addr, position);
        let candidates = grid.candidates_near(&position);

        for candidate in candidates {
            if candidate == iface_addr {
                continue;
            }
            let Some(&peer_host) = self.interface_owner.get(&candidate) else { continue };
            if peer_host == host_addr {
                continue;
            }
            let already_connected = self.hosts[host_addr as usize].interface(iface_addr).expect("interface exists").connections.iter().any(|&cid| {
                self.connections.get(&cid).map(|c| c.from_interface == candidate || c.to_interface == candidate).unwrap_or(false)
            });
            if already_connected {
                continue;
            }
            let peer_pos = self.hosts[peer_host as usize].location;
            let peer_range = self.hosts[peer_host as usize].interface(candidate).map(|i| i.transmit_range).unwrap_or(0.0);
            if in_range(&position, range, &peer_pos, peer_range) {
                self.connect(host_addr, iface_addr, peer_host, candidate);
            }
        }

        events
    }

    /// Byte-clock progress for every in-flight connection (spec §4.5): VBR
    /// links re-derive their speed and accumulate; any connection whose
    /// transfer has completed is finalized.
    fn drive_connections(&mut self) -> Vec<RouterEvent> {
        let now = self.clock.now();
        let dt = (now - self.last_update_time).max(0.0);
        self.last_update_time = now;

        let in_flight: Vec<u64> = self.connections.iter().filter(|(_, c)| c.transfer.is_some()).map(|(&id, _)| id).collect();
        let mut events = Vec::new();

        for conn_id in &in_flight {
            let Some(conn) = self.connections.get(conn_id) else { continue };
            let speed_a = self.hosts[conn.from_host as usize].interface(conn.from_interface).map(|i| i.transmit_speed).unwrap_or(0.0);
            let speed_b = self.hosts[conn.to_host as usize].interface(conn.to_interface).map(|i| i.transmit_speed).unwrap_or(0.0);
            if let Some(conn) = self.connections.get_mut(conn_id) {
                conn.update(dt, speed_a, speed_b, self.vbr_tick_scaled);
            }
        }

        for conn_id in in_flight {
            let done = self.connections.get(&conn_id).map(|c| c.is_message_transferred(now)).unwrap_or(false);
            if done {
                events.extend(self.finalize(conn_id));
            }
        }

        events
    }

    /// `exchangeDeliverableMessages` (spec §4.9): for each idle interface,
    /// offer the first deliverable buffered message to its connected peers.
    fn exchange_deliverable_messages(&mut self, order: &[u32]) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        for &host_addr in order {
            if !self.hosts[host_addr as usize].active {
                continue;
            }
            let interface_addrs: Vec<u32> = self.hosts[host_addr as usize].interfaces.iter().map(|i| i.address).collect();
            for iface_addr in interface_addrs {
                events.extend(self.try_offer_one_message(host_addr, iface_addr));
            }
        }
        events
    }

    fn try_offer_one_message(&mut self, host_addr: u32, iface_addr: u32) -> Vec<RouterEvent> {
        let connection_ids: Vec<u64> = self.hosts[host_addr as usize].interface(iface_addr).expect("interface exists").connections.clone();
        let busy = connection_ids.iter().any(|id| self.connections.get(id).map(|c| c.is_sending_interface(iface_addr)).unwrap_or(false));
        if busy || connection_ids.is_empty() {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let candidates = self.hosts[host_addr as usize].router.sorted_for_forwarding(&mut rng);

        for msg in candidates {
            for &conn_id in &connection_ids {
                let Some(conn) = self.connections.get(&conn_id) else { continue };
                let peer_host = if conn.from_interface == iface_addr { conn.to_host } else { conn.from_host };
                let offer = self.hosts[host_addr as usize].router.should_offer(&msg, peer_host, &mut rng);
                if !offer {
                    continue;
                }
                let mut events = self.start_transfer(conn_id, host_addr, msg.clone());
                if !events.is_empty() {
                    events.extend(self.hosts[host_addr as usize].router.on_broadcast_sent(&msg.id, iface_addr));
                    return events;
                }
            }
        }
        Vec::new()
    }

    fn update_all_hosts(&mut self) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        let order = self.host_update_order();

        for &host_addr in &order {
            if !self.hosts[host_addr as usize].active {
                continue;
            }
            let interface_addrs: Vec<u32> = self.hosts[host_addr as usize].interfaces.iter().map(|i| i.address).collect();
            for iface_addr in interface_addrs {
                events.extend(self.refresh_connectivity(host_addr, iface_addr));
            }
        }

        events.extend(self.drive_connections());

        let now = self.clock.now();
        for &host_addr in &order {
            if !self.hosts[host_addr as usize].active {
                continue;
            }
            events.extend(self.hosts[host_addr as usize].router.update(now));
        }

        events.extend(self.exchange_deliverable_messages(&order));
        events
    }

    fn dispatch(&mut self, events: &[RouterEvent]) {
        for event in events {
            for listener in &mut self.listeners {
                match event {
                    RouterEvent::NewMessage { message } => listener.new_message(message),
                    RouterEvent::TransmissionPerformed { message_id, source_interface } => listener.transmission_performed(message_id, *source_interface),
                    RouterEvent::TransferStarted { message_id, from, to } => listener.message_transfer_started(message_id, *from, *to),
                    RouterEvent::Transferred { message_id, from, to, first_delivery, final_target } => listener.message_transferred(message_id, *from, *to, *first_delivery, *final_target),
                    RouterEvent::TransferAborted { message_id, from, to, cause } => listener.message_transfer_aborted(message_id, *from, *to, cause),
                    RouterEvent::TransmissionInterfered { message_id, from, to } => listener.message_transmission_interfered(message_id, *from, *to),
                    RouterEvent::Deleted { message_id, host, mode, cause } => listener.message_deleted(message_id, *host, *mode, cause),
                }
            }
        }
    }
}
