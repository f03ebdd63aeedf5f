use super::Device;
use crate::sim::Level;

/// Loopback that registers `rx` onto `tx` every clock. Holds `tx` idle while
/// reset is asserted.
#[derive(Debug, Default)]
pub struct WireEcho;

impl WireEcho {
    pub fn new() -> Self {
        Self
    }
}

impl Device for WireEcho {
    fn name(&self) -> &str {
        "wire-echo"
    }

    fn on_rising_edge(&mut self, rst: Level, rx: Level) -> Level {
        if rst.is_high() { Level::IDLE } else { rx }
    }
}
