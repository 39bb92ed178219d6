//! `DTNHost` (spec §3, §4.10): binds interfaces, a router, a movement model,
//! and per-tick update into one node record.
//!
//! Per Design Note §9 ("cyclic references"), a host does not hold owned
//! references to connections — only its own interfaces, each carrying a
//! list of connection ids. The `World` that owns the dense host vector also
//! owns the connection table and is the only place a connection or a peer
//! host is looked up from, which breaks the host↔interface↔connection↔host
//! reference cycle entirely.

use crate::coord::Coord;
use crate::movement::MovementModel;
use crate::network_interface::NetworkInterface;
use crate::router::Router;

/// A single mobile node: interfaces + router + movement + location.
pub struct DTNHost {
    pub address: u32,
    pub group: String,
    pub location: Coord,
    pub speed: f64,
    pub interfaces: Vec<NetworkInterface>,
    pub router: Router,
    movement: Box<dyn MovementModel>,
    /// Deactivated hosts skip movement and update (spec §3 invariant).
    pub active: bool,
}

impl DTNHost {
    pub fn new(address: u32, group: impl Into<String>, router: Router, interfaces: Vec<NetworkInterface>, movement: Box<dyn MovementModel>) -> Self {
        DTNHost {
            address,
            group: group.into(),
            location: Coord::default(),
            speed: 1.0,
            interfaces,
            router,
            movement,
            active: true,
        }
    }

    pub fn with_location(mut self, location: Coord) -> Self {
        self.location = location;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Advance this host's position for `dt` seconds of simulated time.
    /// No-op for a deactivated host (spec §3 invariant).
    pub fn move_host(&mut self, dt: f64, rng: &mut dyn rand::RngCore) {
        if !self.active {
            return;
        }
        self.location = self.movement.advance(self.location, self.speed, dt, rng);
    }

    pub fn interface_mut(&mut self, address: u32) -> Option<&mut NetworkInterface> {
        self.interfaces.iter_mut().find(|i| i.address == address)
    }

    pub fn interface(&self, address: u32) -> Option<&NetworkInterface> {
        self.interfaces.iter().find(|i| i.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_cache::{ForwardingOrderStrategy, MessageCacheManager, PrioritizationStrategy};
    use crate::movement::StationaryMovement;
    use crate::router::RouterKind;
    use crate::router::subscription::{DisseminationMode, SubscriptionPolicy};
    use std::collections::HashSet;

    fn make_host(address: u32) -> DTNHost {
        let cache = MessageCacheManager::new(1_000_000, PrioritizationStrategy::Fifo, ForwardingOrderStrategy::Unchanged);
        let subscription = SubscriptionPolicy::new(DisseminationMode::Flexible, HashSet::new(), 0.0, 0.0);
        let router = Router::new(address, RouterKind::EpidemicBroadcastWithSubscriptions, cache, subscription, false);
        DTNHost::new(address, "g1", router, Vec::new(), Box::new(StationaryMovement))
    }

    #[test]
    fn deactivated_host_does_not_move() {
        let mut host = make_host(1).with_location(Coord::new(1.0, 1.0));
        host.active = false;
        let mut rng = rand::thread_rng();
        host.move_host(5.0, &mut rng);
        assert_eq!(host.location, Coord::new(1.0, 1.0));
    }

    #[test]
    fn interface_lookup_by_address() {
        let mut host = make_host(1);
        host.interfaces.push(NetworkInterface::new(7, "lora", 1, 10.0, 100.0, 1.0));
        assert!(host.interface(7).is_some());
        assert!(host.interface_mut(99).is_none());
    }
}
