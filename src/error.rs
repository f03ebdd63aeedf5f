//! Error types for the loopback verification bench.
//!
//! Each layer has its own enum: the simulation kernel, the frame receiver and
//! the session orchestrator. Lower layers convert upward with `#[from]`.

use thiserror::Error;

use crate::sim::{Driver, SimTime};

/// Failures raised by the simulation kernel or surfaced to a process through
/// its [`Context`](crate::sim::Context).
#[derive(Debug, Error)]
pub enum SimError {
    /// The kernel is tearing the session down; the process must return.
    #[error("simulation shut down")]
    Shutdown,

    /// A process tried to drive a line that belongs to another driver class.
    #[error("line '{signal}' is driven by {driver:?}, not by the bench")]
    ForeignDriver { signal: String, driver: Driver },

    /// Two live processes tried to drive the same bench line.
    #[error("line '{signal}' is already driven by process '{holder}'")]
    LineContended { signal: String, holder: String },

    /// The next scheduled event lies beyond the configured time limit.
    #[error("simulation time limit of {limit} ps exceeded")]
    TimeLimit { limit: SimTime },

    /// Every process is suspended and nothing is left on the timeline.
    #[error("simulation stalled at {at} ps with no pending events")]
    Stalled { at: SimTime },

    /// A process thread panicked before producing its result.
    #[error("process '{name}' panicked")]
    ProcessPanicked { name: String },

    /// The OS refused to start a process thread.
    #[error("failed to start process '{name}': {reason}")]
    Spawn { name: String, reason: String },

    /// The kernel answered a request with an unrelated reply.
    #[error("kernel protocol violation: expected {expected}")]
    Protocol { expected: &'static str },

    /// A kernel/process channel closed unexpectedly.
    #[error("kernel channel disconnected")]
    Disconnected,
}

/// Frame receive failures.
#[derive(Debug, Error)]
pub enum RxError {
    /// The line never left idle before the start-bit deadline.
    #[error("no start bit within {waited} ps")]
    NoStartBit { waited: SimTime },

    /// The stop bit sampled low; `data` holds the data bits that were read.
    #[error("stop bit sampled low after data 0x{data:02X}")]
    StopBitLow { data: u8 },

    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Session-level failures.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The device echoed a different byte than the one sent.
    #[error("Echo mismatch in trial {trial}: sent 0x{sent:02X}, got 0x{received:02X}")]
    EchoMismatch { trial: usize, sent: u8, received: u8 },

    /// The receive path failed before a byte could be compared.
    #[error("trial {trial}: {source}")]
    Receive {
        trial: usize,
        #[source]
        source: RxError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
