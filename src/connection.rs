//! Byte-accounted connections between two network interfaces (spec §4.5).
//!
//! Host and interface references are integer handles rather than owned
//! references (Design Note §9: "cyclic references... model these as
//! index-addressable entities"). A `Connection` is looked up by id through
//! [`crate::world::World`] rather than held by direct ownership edges,
//! which sidesteps the host↔interface↔connection↔host cycle entirely.

use crate::error::{fatal, SimInvariantViolation};
use crate::interference::ConnectionHandle;
use crate::message::Message;

/// An in-progress byte transfer riding a [`Connection`].
#[derive(Debug, Clone)]
pub struct Transfer {
    pub sender_host: u32,
    pub message: Message,
    pub start_time: f64,
    /// Bytes already "spliced in" when this transfer began as an
    /// out-of-synch handoff from another connection (0 for an ordinary
    /// transfer starting at byte zero).
    pub initial_offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LinkKind {
    /// Constant bit rate: fixed `speed`, a precomputed completion time.
    Cbr { speed: f64, transfer_done_time: f64 },
    /// Variable bit rate: current speed re-derived from both interfaces
    /// each tick; `msg_sent` accumulates per [`Connection::update`] call.
    Vbr { msg_size: u64, msg_sent: f64, current_speed: f64 },
}

/// A byte-accounted transfer channel between two interfaces.
///
/// Invariants (spec §3): while `transfer` is `Some`, exactly one sender
/// interface and one receiver interface; `remaining_bytes() == max(msg_size
/// - transferred, 0)`; `finalize_transfer` only legal when
/// `remaining_bytes() == 0`; `abort_transfer` legal only when a transfer is
/// underway.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: u64,
    pub from_host: u32,
    pub from_interface: u32,
    pub to_host: u32,
    pub to_interface: u32,
    pub up: bool,
    pub bytes_transferred_for_throughput: u64,
    pub bytes_transferred_for_goodput: u64,
    pub transfer: Option<Transfer>,
    kind: LinkKind,
}

/// Outcome of the receiver-side admission call made when starting a
/// transfer (spec §4.5 "Start-transfer protocol").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Transfer stands (bytes flow; may still be discarded at finalize if
    /// interference is later detected).
    Proceed,
    /// Immediate local abort: any return code other than `RCV_OK` /
    /// `DENIED_INTERFERENCE`.
    Abort,
}

impl Connection {
    pub fn new_cbr(id: u64, from_host: u32, from_interface: u32, to_host: u32, to_interface: u32, speed: f64) -> Self {
        Connection {
            id,
            from_host,
            from_interface,
            to_host,
            to_interface,
            up: true,
            bytes_transferred_for_throughput: 0,
            bytes_transferred_for_goodput: 0,
            transfer: None,
            kind: LinkKind::Cbr { speed, transfer_done_time: 0.0 },
        }
    }

    pub fn new_vbr(id: u64, from_host: u32, from_interface: u32, to_host: u32, to_interface: u32) -> Self {
        Connection {
            id,
            from_host,
            from_interface,
            to_host,
            to_interface,
            up: true,
            bytes_transferred_for_throughput: 0,
            bytes_transferred_for_goodput: 0,
            transfer: None,
            kind: LinkKind::Vbr { msg_size: 0, msg_sent: 0.0, current_speed: 0.0 },
        }
    }

    pub fn is_sending_interface(&self, interface: u32) -> bool {
        self.transfer.as_ref().is_some_and(|t| {
            let sender_interface = if t.sender_host == self.from_host { self.from_interface } else { self.to_interface };
            sender_interface == interface
        })
    }

    pub fn is_receiver_interface(&self, interface: u32) -> bool {
        self.transfer.is_some() && !self.is_sending_interface(interface)
    }

    fn sender_interface(&self) -> Option<u32> {
        self.transfer.as_ref().map(|t| if t.sender_host == self.from_host { self.from_interface } else { self.to_interface })
    }

    /// Start a new transfer. `cbr_speed_override` lets a VBR link record the
    /// message size it will track; CBR links use their own fixed speed.
    pub fn start_transfer(&mut self, now: f64, sender_host: u32, msg: Message) {
        let size = msg.size;
        match &mut self.kind {
            LinkKind::Cbr { speed, transfer_done_time } => {
                *transfer_done_time = now + (size as f64) / *speed;
            }
            LinkKind::Vbr { msg_size, msg_sent, current_speed } => {
                *msg_size = size;
                *msg_sent = 0.0;
                *current_speed = 0.0;
            }
        }
        self.transfer = Some(Transfer {
            sender_host,
            message: msg,
            start_time: now,
            initial_offset: 0,
        });
    }

    /// Drive the VBR byte clock forward by one tick. No-op for CBR, whose
    /// remaining bytes are computed on demand from `transfer_done_time`.
    ///
    /// Per spec §4.5 and the Design Note §9 open question, the rate is
    /// added once per call (coupling transfer rate to tick rate) unless
    /// `vbr_tick_scaled` requests the corrected, tick-duration-scaled
    /// variant.
    pub fn update(&mut self, dt: f64, peer_speed_a: f64, peer_speed_b: f64, vbr_tick_scaled: bool) {
        if let LinkKind::Vbr { msg_sent, current_speed, .. } = &mut self.kind {
            if self.transfer.is_some() {
                *current_speed = peer_speed_a.min(peer_speed_b);
                *msg_sent += if vbr_tick_scaled { *current_speed * dt } else { *current_speed };
            }
        }
    }

    fn msg_size(&self) -> u64 {
        self.transfer.as_ref().map(|t| t.message.size).unwrap_or(0)
    }

    pub fn remaining_byte_count(&self, now: f64) -> u64 {
        let Some(transfer) = &self.transfer else { return 0 };
        let size = transfer.message.size;
        match self.kind {
            LinkKind::Cbr { speed, transfer_done_time } => {
                let remaining_time = (transfer_done_time - now).max(0.0);
                let remaining = (remaining_time * speed).round() as u64;
                remaining.min(size).saturating_sub(transfer.initial_offset.min(remaining))
            }
            LinkKind::Vbr { msg_sent, .. } => {
                let sent = (msg_sent as u64) + transfer.initial_offset;
                size.saturating_sub(sent)
            }
        }
    }

    pub fn bytes_sent_so_far(&self, now: f64) -> u64 {
        self.msg_size().saturating_sub(self.remaining_byte_count(now))
    }

    pub fn is_message_transferred(&self, now: f64) -> bool {
        self.transfer.is_some() && self.remaining_byte_count(now) == 0
    }

    pub fn get_speed(&self) -> f64 {
        match self.kind {
            LinkKind::Cbr { speed, .. } => speed,
            LinkKind::Vbr { current_speed, .. } => current_speed,
        }
    }

    /// Abort the underway transfer. Accounts the partial bytes to
    /// throughput (but not goodput) and returns `(message, remaining)` for
    /// the receiver's `messageAborted` notification.
    ///
    /// # Panics
    /// If no transfer is underway (spec §4.5 invariant).
    pub fn abort_transfer(&mut self, now: f64) -> (Message, u64) {
        let Some(transfer) = self.transfer.take() else {
            fatal(SimInvariantViolation::AbortWithoutTransfer { connection: self.id });
        };
        let remaining = self.remaining_byte_count_for(&transfer, now);
        let size = transfer.message.size;
        let sent = size.saturating_sub(remaining);
        self.bytes_transferred_for_throughput += sent;
        (transfer.message, remaining)
    }

    /// Finalize a completed transfer. Only legal when `remaining_byte_count
    /// == 0`. Increments throughput and goodput by the full size and
    /// returns the delivered message.
    ///
    /// # Panics
    /// If no transfer is underway, or it is not yet complete.
    pub fn finalize_transfer(&mut self, now: f64) -> Message {
        let remaining = self.remaining_byte_count(now);
        let Some(transfer) = self.transfer.take() else {
            fatal(SimInvariantViolation::FinalizeWithoutTransfer { connection: self.id });
        };
        if remaining != 0 {
            fatal(SimInvariantViolation::FinalizeWithoutTransfer { connection: self.id });
        }
        let size = transfer.message.size;
        self.bytes_transferred_for_throughput += size;
        self.bytes_transferred_for_goodput += size;
        transfer.message
    }

    fn remaining_byte_count_for(&self, transfer: &Transfer, now: f64) -> u64 {
        let size = transfer.message.size;
        match self.kind {
            LinkKind::Cbr { speed, transfer_done_time } => {
                let remaining_time = (transfer_done_time - now).max(0.0);
                ((remaining_time * speed).round() as u64).min(size)
            }
            LinkKind::Vbr { msg_sent, .. } => size.saturating_sub(msg_sent as u64 + transfer.initial_offset),
        }
    }

    /// Splice an out-of-synch handoff: a third interface wandered into
    /// range of an in-progress transfer and this connection should carry
    /// the remainder. The slower of the two transmissions yields (i.e. this
    /// connection adopts whichever remaining-byte count is larger, since a
    /// receiver that has heard less air time is further behind).
    ///
    /// If the source transfer has its full size remaining (a fresh start),
    /// `size - 1` bytes are recorded as already-elapsed so the new
    /// reception is still marked out-of-synch even once it completes.
    pub fn copy_message_transfer(&mut self, now: f64, source: &Connection) {
        let Some(source_transfer) = &source.transfer else { return };
        let remaining = source.remaining_byte_count(now);
        let size = source_transfer.message.size;
        let initial_offset = if remaining == size { size.saturating_sub(1) } else { size - remaining };

        let mut msg = source_transfer.message.replicate();
        msg.size = size;
        match &mut self.kind {
            LinkKind::Cbr { speed, transfer_done_time } => {
                // Clock tracks the full size; `remaining_byte_count` applies
                // `initial_offset` on top, so it must not be subtracted here
                // too or a fresh handoff reads as already complete.
                *transfer_done_time = now + (size as f64) / *speed;
            }
            LinkKind::Vbr { msg_size, msg_sent, .. } => {
                *msg_size = size;
                *msg_sent = 0.0;
            }
        }
        self.transfer = Some(Transfer {
            sender_host: source_transfer.sender_host,
            message: msg,
            start_time: now,
            initial_offset,
        });
    }
}

/// A point-in-time snapshot of the handle-relevant connection state,
/// suitable for [`crate::interference::InterferenceModel`]. `Connection`
/// cannot implement `ConnectionHandle` directly because byte-clock state
/// depends on `now`, which the trait's fixed signature has no room for.
pub struct ConnSnapshot {
    pub id: u64,
    pub sender_interface_address: u32,
    pub bytes_transferred: u64,
    pub is_message_transferred: bool,
}

impl Connection {
    pub fn handle_at(&self, now: f64) -> ConnSnapshot {
        ConnSnapshot {
            id: self.id,
            sender_interface_address: self.sender_interface_address(),
            bytes_transferred: self.transfer.as_ref().map(|t| t.initial_offset).unwrap_or(0),
            is_message_transferred: self.is_message_transferred(now),
        }
    }

    fn sender_interface_address(&self) -> u32 {
        self.sender_interface().unwrap_or(self.from_interface)
    }
}

impl ConnectionHandle for ConnSnapshot {
    fn id(&self) -> u64 {
        self.id
    }

    fn sender_interface_address(&self) -> u32 {
        self.sender_interface_address
    }

    fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    fn is_message_transferred(&self) -> bool {
        self.is_message_transferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Priority, Ttl};

    fn msg(size: u64) -> Message {
        Message::new("M1", 1, Some(2), size, Priority::Medium, 0.0, Ttl::Minutes(30.0))
    }

    #[test]
    fn cbr_finalizes_when_size_over_speed_elapses() {
        // Scenario 1 from spec §8: 500B message at 1000 B/s, start at t=1.0.
        let mut con = Connection::new_cbr(1, 1, 10, 2, 20, 1000.0);
        con.start_transfer(1.0, 1, msg(500));
        assert!(!con.is_message_transferred(1.4));
        assert_eq!(con.remaining_byte_count(1.0), 500);
        assert!(con.is_message_transferred(1.5));
        assert_eq!(con.remaining_byte_count(1.5), 0);
        let delivered = con.finalize_transfer(1.5);
        assert_eq!(delivered.size, 500);
        assert_eq!(con.bytes_transferred_for_throughput, 500);
        assert_eq!(con.bytes_transferred_for_goodput, 500);
    }

    #[test]
    fn cbr_abort_credits_only_throughput() {
        // Scenario 2: move out of range at t=1.2, ~200 bytes in.
        let mut con = Connection::new_cbr(1, 1, 10, 2, 20, 1000.0);
        con.start_transfer(1.0, 1, msg(500));
        let (_msg, remaining) = con.abort_transfer(1.2);
        assert_eq!(remaining, 300);
        assert_eq!(con.bytes_transferred_for_throughput, 200);
        assert_eq!(con.bytes_transferred_for_goodput, 0);
        assert!(con.transfer.is_none());
    }

    #[test]
    #[should_panic]
    fn finalize_without_transfer_is_fatal() {
        let mut con = Connection::new_cbr(1, 1, 10, 2, 20, 1000.0);
        con.finalize_transfer(0.0);
    }

    #[test]
    #[should_panic]
    fn abort_without_transfer_is_fatal() {
        let mut con = Connection::new_cbr(1, 1, 10, 2, 20, 1000.0);
        con.abort_transfer(0.0);
    }

    #[test]
    #[should_panic]
    fn finalize_before_completion_is_fatal() {
        let mut con = Connection::new_cbr(1, 1, 10, 2, 20, 1000.0);
        con.start_transfer(0.0, 1, msg(500));
        con.finalize_transfer(0.1);
    }

    #[test]
    fn vbr_rate_adds_once_per_tick_by_default() {
        let mut con = Connection::new_vbr(1, 1, 10, 2, 20);
        con.start_transfer(0.0, 1, msg(1000));
        con.update(0.1, 100.0, 200.0, false);
        // currentSpeed = min(100, 200) = 100; default (unscaled) adds the
        // raw speed value once, not speed * dt.
        assert_eq!(con.remaining_byte_count(0.0), 900);
        con.update(0.1, 100.0, 200.0, false);
        assert_eq!(con.remaining_byte_count(0.0), 800);
    }

    #[test]
    fn vbr_rate_can_be_tick_scaled() {
        let mut con = Connection::new_vbr(1, 1, 10, 2, 20);
        con.start_transfer(0.0, 1, msg(1000));
        con.update(0.5, 100.0, 200.0, true);
        assert_eq!(con.remaining_byte_count(0.0), 950);
    }

    #[test]
    fn copy_message_transfer_marks_fresh_handoff_out_of_synch() {
        let mut source = Connection::new_cbr(1, 1, 10, 2, 20, 1000.0);
        source.start_transfer(0.0, 1, msg(500));

        let mut splice = Connection::new_cbr(2, 1, 10, 3, 30, 1000.0);
        splice.copy_message_transfer(0.0, &source);

        // Fresh transfer (full size remaining) -> initial_offset = size - 1.
        assert_eq!(splice.transfer.as_ref().unwrap().initial_offset, 499);
        assert!(!splice.is_message_transferred(0.0));
    }

    #[test]
    fn is_sending_and_receiver_interface_are_distinguished() {
        let mut con = Connection::new_cbr(1, 1, 10, 2, 20, 1000.0);
        con.start_transfer(0.0, 1, msg(500));
        assert!(con.is_sending_interface(10));
        assert!(!con.is_sending_interface(20));
        assert!(con.is_receiver_interface(20));
        assert!(!con.is_receiver_interface(10));
    }
}
