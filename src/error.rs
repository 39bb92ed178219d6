//! Error types for the simulation engine.
//!
//! Configuration errors (`SettingsError`) are raised eagerly at construction
//! time and are fatal for the run. Simulation invariant violations
//! (`SimInvariantViolation`) indicate a bug in router or connection logic;
//! they are never returned as `Result` values — callers `panic!` with them
//! via [`fatal`], naming the offending ids so the diagnostic is actionable.

use thiserror::Error;

/// Configuration-time failures: missing, out-of-range, or unparseable
/// settings. Reported eagerly at construction; fatal for the run.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required setting `{0}`")]
    Missing(String),
    #[error("setting `{key}` has invalid value `{value}`: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// A violated simulation invariant: finalize with no underway transfer,
/// abort on an inactive connection, reception begin with non-zero initial
/// bytes, unknown message id passed to the interference model, etc.
///
/// These are bugs, not expected outcomes, and the run must abort with a
/// diagnostic naming the offending ids and hosts (spec §7.2).
#[derive(Debug, Error)]
pub enum SimInvariantViolation {
    #[error("finalizeTransfer called on connection {connection} with no underway transfer")]
    FinalizeWithoutTransfer { connection: u64 },
    #[error("abortTransfer called on connection {connection} with no underway transfer")]
    AbortWithoutTransfer { connection: u64 },
    #[error(
        "beginNewReception for message {message} on interface {interface} started with {bytes} bytes already transferred (must start at zero)"
    )]
    ReceptionNotAtZero {
        message: String,
        interface: u32,
        bytes: u64,
    },
    #[error("interference model has no record for message {message} on connection {connection}")]
    UnknownMessageId { message: String, connection: u64 },
    #[error("receiver denied send via CSMA/CA violation on host {host}, interface {interface}")]
    DeniedDueToSend { host: u32, interface: u32 },
}

/// Abort the run with a diagnostic. Simulation invariant violations are
/// bugs, not recoverable outcomes, so this never returns.
pub fn fatal(violation: SimInvariantViolation) -> ! {
    panic!("simulation invariant violated: {violation}");
}
