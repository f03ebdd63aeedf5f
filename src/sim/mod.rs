//! Discrete-event simulation kernel.
//!
//! A single logical timeline in picoseconds. Harness operations run as
//! cooperative processes that suspend on elapsed time, on a rising clock
//! edge, on a line level observed at a clock edge, or on another process
//! finishing. Clocks and device models are evaluated inside the kernel.

pub mod kernel;
pub mod process;
pub mod signal;
pub mod time;

pub use kernel::Simulator;
pub use process::{Context, ProcessHandle};
pub use signal::{Driver, Level, SignalId};
pub use time::{PS_PER_NS, PS_PER_SEC, SimTime, format_time, ns};
