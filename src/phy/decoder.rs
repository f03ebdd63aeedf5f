use super::frame::{DATA_BITS, STOP_LEVEL, START_LEVEL, assemble};
use super::timing::BitTiming;
use crate::error::RxError;
use crate::sim::{Context, Level, SignalId, SimTime};
use tracing::{debug, trace};

/// Receive path: recovers bytes from a line driven by someone else.
///
/// The decoder synchronises on every frame by itself. It watches the line on
/// rising edges of `clock` until the start bit appears, then samples each data
/// bit at its centre, offset from that start edge.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    timing: BitTiming,
    clock: SignalId,
    line: SignalId,
    start_timeout: Option<SimTime>,
    strict_stop_bit: bool,
}

impl FrameDecoder {
    pub fn new(timing: BitTiming, clock: SignalId, line: SignalId) -> Self {
        Self {
            timing,
            clock,
            line,
            start_timeout: None,
            strict_stop_bit: false,
        }
    }

    /// Give up with [`RxError::NoStartBit`] if no frame starts within `timeout`.
    pub fn with_start_timeout(mut self, timeout: Option<SimTime>) -> Self {
        self.start_timeout = timeout;
        self
    }

    /// Reject frames whose stop bit samples low.
    pub fn with_strict_stop_bit(mut self, strict: bool) -> Self {
        self.strict_stop_bit = strict;
        self
    }

    /// Suspend until one frame has been captured and return its byte.
    ///
    /// Returns at the centre of the stop bit, 9.5 bit periods after the
    /// detected start edge.
    pub fn receive(&self, ctx: &mut Context) -> Result<u8, RxError> {
        let called_at = ctx.now()?;
        let deadline = self.start_timeout.map(|timeout| called_at + timeout);

        if !ctx.wait_for_level(self.clock, self.line, START_LEVEL, deadline)? {
            let waited = ctx.now()? - called_at;
            debug!("no start bit after {} ps", waited);
            return Err(RxError::NoStartBit { waited });
        }
        let start = ctx.now()?;
        trace!("t={} start bit detected", start);

        // Data bit i is centred 1.5 + i bit periods after the start edge.
        let mut data = [Level::Low; DATA_BITS];
        for (i, slot) in data.iter_mut().enumerate() {
            ctx.wait_until(start + self.timing.offset(2 * i as u64 + 3))?;
            *slot = ctx.read(self.line)?;
        }
        let byte = assemble(&data);

        ctx.wait_until(start + self.timing.offset(2 * DATA_BITS as u64 + 3))?;
        if self.strict_stop_bit && ctx.read(self.line)? != STOP_LEVEL {
            debug!("stop bit low after 0x{:02X}", byte);
            return Err(RxError::StopBitLow { data: byte });
        }

        trace!("received 0x{:02X}", byte);
        Ok(byte)
    }
}
