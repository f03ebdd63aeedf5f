//! Device-under-test contract and behavioural loopback models.

pub mod uart;
pub mod wire;

pub use uart::UartEcho;
pub use wire::WireEcho;

use serde::{Deserialize, Serialize};

use crate::phy::BitTiming;
use crate::sim::{Driver, Level, SignalId, SimTime, Simulator};

/// A synchronous device evaluated on each rising edge of its clock.
///
/// Inputs are the levels just before the edge; the returned level is driven
/// on `tx` right after it. A device never touches any other line.
pub trait Device: Send {
    fn name(&self) -> &str;

    fn on_rising_edge(&mut self, rst: Level, rx: Level) -> Level;
}

/// The four device pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutPins {
    /// Clock, generated by the kernel.
    pub clk: SignalId,
    /// Reset, active high, driven by the bench.
    pub rst: SignalId,
    /// Serial input, driven by the bench.
    pub rx: SignalId,
    /// Serial output, driven by the device.
    pub tx: SignalId,
}

impl DutPins {
    /// Register the pins on `sim`: reset asserted, both serial lines idle.
    pub fn declare(sim: &mut Simulator) -> Self {
        Self {
            clk: sim.add_signal("clk", Driver::Clock, Level::Low),
            rst: sim.add_signal("rst", Driver::Bench, Level::High),
            rx: sim.add_signal("rx", Driver::Bench, Level::IDLE),
            tx: sim.add_signal("tx", Driver::Device, Level::IDLE),
        }
    }
}

/// Selects one of the built-in loopback models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Registered pass-through, echoes each bit one clock later.
    #[default]
    Wire,
    /// Full UART receiver and transmitter, echoes each byte after its stop bit.
    Uart,
}

impl DeviceKind {
    pub fn build(self, timing: &BitTiming, clock_period: SimTime) -> Box<dyn Device> {
        match self {
            DeviceKind::Wire => Box::new(WireEcho::new()),
            DeviceKind::Uart => Box::new(UartEcho::new(timing, clock_period)),
        }
    }
}
