//! Per-node radio port (spec §4.6): neighbor/connection bookkeeping, scan
//! cadence, send primitives, and the interference/connection glue.
//!
//! Addresses are monotone per-process integers handed out by
//! [`crate::context::SimulationContext`] (Design Note §9): an interface
//! holds its own address and the address of its owning host, not a direct
//! reference, so lookups always go through `World`'s dense vectors.

use crate::connection::Connection;
use crate::coord::in_range;
use crate::interference::{InterferenceModel, ReceptionStatus};
use crate::message::Message;

/// Result of an attempted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    Ok,
    /// Interface busy, or the receiver denied admission.
    Denied,
}

/// Result the receiving router hands back when a transfer is proposed
/// (spec §4.5's start-transfer protocol, §4.9's `receiveMessage`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    RcvOk,
    TryLaterBusy,
    DeniedOld,
    DeniedNoSpace,
    DeniedTtl,
    DeniedInterference,
}

impl ReceiveOutcome {
    /// The transfer stands for anything except interference/denial codes
    /// other than `RcvOk`/`DeniedInterference` (spec §4.5).
    fn allows_transfer_to_proceed(self) -> bool {
        matches!(self, ReceiveOutcome::RcvOk | ReceiveOutcome::DeniedInterference)
    }
}

/// A radio port bound to exactly one host after construction.
#[derive(Debug, Clone)]
pub struct NetworkInterface {
    pub address: u32,
    pub interface_type: String,
    pub host: u32,
    pub transmit_range: f64,
    pub transmit_speed: f64,
    pub scan_interval: f64,
    pub last_scan_time: f64,
    pub connections: Vec<u64>,
}

impl NetworkInterface {
    pub fn new(address: u32, interface_type: impl Into<String>, host: u32, transmit_range: f64, transmit_speed: f64, scan_interval: f64) -> Self {
        NetworkInterface {
            address,
            interface_type: interface_type.into(),
            host,
            transmit_range,
            transmit_speed,
            scan_interval,
            last_scan_time: f64::NEG_INFINITY,
            connections: Vec::new(),
        }
    }

    /// Whether this interface is due to scan for new neighbors.
    ///
    /// `scanInterval == 0` means always scanning. Otherwise, true iff `now`
    /// has crossed into a new interval boundary since `last_scan_time`.
    /// Scans are idempotent within an interval: callers that decide to scan
    /// should then update `last_scan_time` to `now`.
    pub fn is_scanning(&self, now: f64) -> bool {
        if self.scan_interval == 0.0 {
            return true;
        }
        if self.last_scan_time.is_infinite() {
            return true;
        }
        (now / self.scan_interval).floor() > (self.last_scan_time / self.scan_interval).floor()
    }

    pub fn mark_scanned(&mut self, now: f64) {
        self.last_scan_time = now;
    }

    /// Whether a peer interface is reachable, using the smaller of the two
    /// transmit ranges (spec §4.6).
    pub fn in_range_of(&self, my_pos: &crate::coord::Coord, peer: &NetworkInterface, peer_pos: &crate::coord::Coord) -> bool {
        in_range(my_pos, self.transmit_range, peer_pos, peer.transmit_range)
    }

    pub fn is_busy(&self, connections: &[&Connection]) -> bool {
        connections.iter().any(|c| c.is_sending_interface(self.address))
    }

    pub fn is_sending(&self, connections: &[&Connection]) -> bool {
        connections.iter().any(|c| c.is_sending_interface(self.address))
    }

    pub fn is_receiving(&self, connections: &[&Connection]) -> bool {
        connections.iter().any(|c| c.is_receiver_interface(self.address))
    }
}

/// Drive the receive side of a new transfer: begin the reception in the
/// interference model, check it against any reception already in progress
/// on `receiver`, and fold in the receiver router's admission decision.
///
/// Returns the [`ReceiveOutcome`] the router produced, and whether the
/// caller should let the byte transfer proceed (`allows_transfer_to_proceed`).
pub fn begin_reception(
    interference: &mut InterferenceModel,
    connection: &Connection,
    msg: &Message,
    now: f64,
    router_decision: ReceiveOutcome,
) -> (ReceiveOutcome, bool) {
    let other_in_progress = interference.any_reception_in_progress_excluding(connection.id);
    let status = interference.begin_new_reception(msg, &connection.handle_at(now), other_in_progress);

    let effective = if status == ReceptionStatus::Interference {
        ReceiveOutcome::DeniedInterference
    } else {
        router_decision
    };

    (effective, effective.allows_transfer_to_proceed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_interval_zero_always_scans() {
        let iface = NetworkInterface::new(1, "lora", 0, 100.0, 1000.0, 0.0);
        assert!(iface.is_scanning(0.0));
        assert!(iface.is_scanning(1_000_000.0));
    }

    #[test]
    fn scan_interval_gates_on_boundary_crossing() {
        let mut iface = NetworkInterface::new(1, "lora", 0, 100.0, 1000.0, 10.0);
        assert!(iface.is_scanning(0.0));
        iface.mark_scanned(0.0);
        assert!(!iface.is_scanning(5.0));
        assert!(iface.is_scanning(10.0));
    }

    #[test]
    fn range_check_uses_smaller_range() {
        let a = NetworkInterface::new(1, "lora", 0, 50.0, 1000.0, 1.0);
        let b = NetworkInterface::new(2, "lora", 1, 100.0, 1000.0, 1.0);
        let pos_a = crate::coord::Coord::new(0.0, 0.0);
        let pos_b = crate::coord::Coord::new(50.0, 0.0);
        assert!(a.in_range_of(&pos_a, &b, &pos_b));
        let pos_b_far = crate::coord::Coord::new(51.0, 0.0);
        assert!(!a.in_range_of(&pos_a, &b, &pos_b_far));
    }

    #[test]
    fn receive_outcome_allows_transfer_for_ok_and_interference_only() {
        assert!(ReceiveOutcome::RcvOk.allows_transfer_to_proceed());
        assert!(ReceiveOutcome::DeniedInterference.allows_transfer_to_proceed());
        assert!(!ReceiveOutcome::DeniedOld.allows_transfer_to_proceed());
        assert!(!ReceiveOutcome::DeniedNoSpace.allows_transfer_to_proceed());
        assert!(!ReceiveOutcome::DeniedTtl.allows_transfer_to_proceed());
        assert!(!ReceiveOutcome::TryLaterBusy.allows_transfer_to_proceed());
    }
}
