//! Verification orchestrator: resets the device, then runs one concurrent
//! encode/decode trial per byte and checks every echo.

pub mod config;
pub mod report;
pub mod session;
pub mod trials;

pub use config::SessionConfig;
pub use report::{SessionReport, TrialRecord};
pub use session::{Session, SessionState};
