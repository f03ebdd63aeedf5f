use super::Device;
use crate::phy::BitTiming;
use crate::phy::frame::{DATA_BITS, FRAME_BITS, frame_levels};
use crate::sim::{Level, SimTime};
use tracing::{trace, warn};

enum RxState {
    Idle,
    Start { elapsed: u32 },
    Data { elapsed: u32, index: usize, shift: u8 },
    Stop { elapsed: u32, byte: u8 },
}

enum TxState {
    Idle,
    Sending {
        levels: [Level; FRAME_BITS],
        slot: usize,
        elapsed: u32,
    },
}

/// Clocked UART loopback: a receiver that oversamples `rx` by counting clock
/// cycles, a one-byte holding register, and a transmitter that re-serialises
/// each received byte on `tx`.
pub struct UartEcho {
    clocks_per_bit: u32,
    rx: RxState,
    tx: TxState,
    holding: Option<u8>,
}

impl UartEcho {
    pub fn new(timing: &BitTiming, clock_period: SimTime) -> Self {
        let bit = timing.bit_duration();
        let clocks_per_bit = ((bit + clock_period / 2) / clock_period.max(1)).max(2) as u32;
        Self::with_clocks_per_bit(clocks_per_bit)
    }

    pub fn with_clocks_per_bit(clocks_per_bit: u32) -> Self {
        Self {
            clocks_per_bit,
            rx: RxState::Idle,
            tx: TxState::Idle,
            holding: None,
        }
    }

    pub fn clocks_per_bit(&self) -> u32 {
        self.clocks_per_bit
    }

    fn receive(&mut self, rx: Level) {
        let cpb = self.clocks_per_bit;
        self.rx = match std::mem::replace(&mut self.rx, RxState::Idle) {
            RxState::Idle if rx == Level::Low => RxState::Start { elapsed: 0 },
            RxState::Idle => RxState::Idle,
            RxState::Start { elapsed } => {
                let elapsed = elapsed + 1;
                if elapsed < cpb / 2 {
                    RxState::Start { elapsed }
                } else if rx == Level::Low {
                    RxState::Data {
                        elapsed: 0,
                        index: 0,
                        shift: 0,
                    }
                } else {
                    // glitch shorter than half a bit
                    RxState::Idle
                }
            }
            RxState::Data {
                elapsed,
                index,
                shift,
            } => {
                let elapsed = elapsed + 1;
                if elapsed < cpb {
                    RxState::Data {
                        elapsed,
                        index,
                        shift,
                    }
                } else {
                    let shift = shift | (rx.bit() << index);
                    if index + 1 == DATA_BITS {
                        RxState::Stop {
                            elapsed: 0,
                            byte: shift,
                        }
                    } else {
                        RxState::Data {
                            elapsed: 0,
                            index: index + 1,
                            shift,
                        }
                    }
                }
            }
            RxState::Stop { elapsed, byte } => {
                let elapsed = elapsed + 1;
                if elapsed < cpb {
                    RxState::Stop { elapsed, byte }
                } else {
                    if rx == Level::High {
                        trace!("uart-echo received 0x{:02X}", byte);
                        if let Some(lost) = self.holding.replace(byte) {
                            warn!("uart-echo overrun, dropped 0x{:02X}", lost);
                        }
                    } else {
                        warn!("uart-echo framing error after 0x{:02X}", byte);
                    }
                    RxState::Idle
                }
            }
        };
    }

    fn transmit(&mut self) -> Level {
        if matches!(self.tx, TxState::Idle) {
            if let Some(byte) = self.holding.take() {
                let levels = frame_levels(byte);
                self.tx = TxState::Sending {
                    levels,
                    slot: 0,
                    elapsed: 0,
                };
                return levels[0];
            }
            return Level::IDLE;
        }

        let cpb = self.clocks_per_bit;
        let TxState::Sending {
            levels,
            slot,
            elapsed,
        } = &mut self.tx
        else {
            return Level::IDLE;
        };
        *elapsed += 1;
        if *elapsed == cpb {
            *elapsed = 0;
            *slot += 1;
        }
        if *slot == FRAME_BITS {
            self.tx = TxState::Idle;
            Level::IDLE
        } else {
            levels[*slot]
        }
    }
}

impl Device for UartEcho {
    fn name(&self) -> &str {
        "uart-echo"
    }

    fn on_rising_edge(&mut self, rst: Level, rx: Level) -> Level {
        if rst.is_high() {
            self.rx = RxState::Idle;
            self.tx = TxState::Idle;
            self.holding = None;
            return Level::IDLE;
        }
        self.receive(rx);
        self.transmit()
    }
}
