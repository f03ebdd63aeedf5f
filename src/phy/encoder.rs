use super::frame::{FRAME_BITS, frame_levels};
use super::timing::BitTiming;
use crate::error::SimError;
use crate::sim::{Context, SignalId, SimTime};
use tracing::trace;

/// Transmit path: serializes bytes onto a bench-driven line.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    timing: BitTiming,
    line: SignalId,
}

impl FrameEncoder {
    pub fn new(timing: BitTiming, line: SignalId) -> Self {
        Self { timing, line }
    }

    /// Time one complete frame occupies the line.
    pub fn frame_duration(&self) -> SimTime {
        self.timing.offset(2 * FRAME_BITS as u64)
    }

    /// Drive one frame: start bit, eight data bits LSB first, stop bit.
    ///
    /// Returns once the stop bit has been held for a full bit period. The
    /// line stays claimed by the calling process for the whole frame.
    pub fn transmit(&self, ctx: &mut Context, byte: u8) -> Result<(), SimError> {
        let start = ctx.now()?;
        trace!("t={} transmit 0x{:02X}", start, byte);

        for (slot, level) in frame_levels(byte).into_iter().enumerate() {
            ctx.write(self.line, level)?;
            ctx.wait_until(start + self.timing.offset(2 * (slot as u64 + 1)))?;
        }
        Ok(())
    }
}
