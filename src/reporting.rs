//! Listener hooks consumed by external report collaborators (spec §6).
//!
//! `ReportListener` mirrors the teacher's preference for trait objects at
//! collaborator seams (see `node_task::NodeContext`'s handler methods):
//! default no-op bodies mean a run with nothing attached pays nothing, and a
//! report writer (CSV/text, out of scope here) is just another
//! implementation plugged in by the batch driver.

use crate::message::Message;
use crate::router::DeleteMode;

pub trait ReportListener {
    fn register_node(&mut self, _host: u32) {}
    fn new_message(&mut self, _message: &Message) {}
    fn transmission_performed(&mut self, _message_id: &str, _source: u32) {}
    fn message_transfer_started(&mut self, _message_id: &str, _from: u32, _to: u32) {}
    fn message_transferred(&mut self, _message_id: &str, _from: u32, _to: u32, _first_delivery: bool, _final_target: bool) {}
    fn message_transfer_aborted(&mut self, _message_id: &str, _from: u32, _to: u32, _cause: &str) {}
    fn message_transmission_interfered(&mut self, _message_id: &str, _from: u32, _to: u32) {}
    fn message_deleted(&mut self, _message_id: &str, _host: u32, _mode: DeleteMode, _cause: &str) {}
}

/// A single captured listener call, used by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    RegisterNode { host: u32 },
    NewMessage { message_id: String },
    TransmissionPerformed { message_id: String, source: u32 },
    TransferStarted { message_id: String, from: u32, to: u32 },
    Transferred { message_id: String, from: u32, to: u32, first_delivery: bool, final_target: bool },
    TransferAborted { message_id: String, from: u32, to: u32, cause: String },
    TransmissionInterfered { message_id: String, from: u32, to: u32 },
    Deleted { message_id: String, host: u32, mode: DeleteMode, cause: String },
}

/// Test double that records every listener call verbatim, for asserting on
/// the event stream in scenario tests (spec §8's reproducibility property).
#[derive(Default)]
pub struct RecordingListener {
    pub events: Vec<ReportEvent>,
}

impl ReportListener for RecordingListener {
    fn register_node(&mut self, host: u32) {
        self.events.push(ReportEvent::RegisterNode { host });
    }

    fn new_message(&mut self, message: &Message) {
        self.events.push(ReportEvent::NewMessage { message_id: message.id.clone() });
    }

    fn transmission_performed(&mut self, message_id: &str, source: u32) {
        self.events.push(ReportEvent::TransmissionPerformed { message_id: message_id.to_string(), source });
    }

    fn message_transfer_started(&mut self, message_id: &str, from: u32, to: u32) {
        self.events.push(ReportEvent::TransferStarted { message_id: message_id.to_string(), from, to });
    }

    fn message_transferred(&mut self, message_id: &str, from: u32, to: u32, first_delivery: bool, final_target: bool) {
        self.events.push(ReportEvent::Transferred { message_id: message_id.to_string(), from, to, first_delivery, final_target });
    }

    fn message_transfer_aborted(&mut self, message_id: &str, from: u32, to: u32, cause: &str) {
        self.events.push(ReportEvent::TransferAborted { message_id: message_id.to_string(), from, to, cause: cause.to_string() });
    }

    fn message_transmission_interfered(&mut self, message_id: &str, from: u32, to: u32) {
        self.events.push(ReportEvent::TransmissionInterfered { message_id: message_id.to_string(), from, to });
    }

    fn message_deleted(&mut self, message_id: &str, host: u32, mode: DeleteMode, cause: &str) {
        self.events.push(ReportEvent::Deleted { message_id: message_id.to_string(), host, mode, cause: cause.to_string() });
    }
}
