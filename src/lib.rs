//! Serial-line loopback verification.
//!
//! A fixed 8N1 serial frame encoder and decoder drive a simulated loopback
//! device on a discrete-event timeline, and an orchestrator checks that every
//! byte comes back unchanged.

pub mod bench;
pub mod device;
pub mod error;
pub mod phy;
pub mod sim;
pub mod ui;
pub mod utils;

pub use bench::{Session, SessionConfig, SessionReport};
pub use error::{BenchError, RxError, SimError};
