// Frame format: [Start:0] [D0 .. D7, LSB first] [Stop:1], idle high

use crate::sim::Level;

pub const DATA_BITS: usize = 8;
pub const FRAME_BITS: usize = DATA_BITS + 2;

pub const START_LEVEL: Level = Level::Low;
pub const STOP_LEVEL: Level = Level::High;

/// Line levels of one frame, one per bit slot.
pub fn frame_levels(byte: u8) -> [Level; FRAME_BITS] {
    let mut levels = [STOP_LEVEL; FRAME_BITS];
    levels[0] = START_LEVEL;
    for (i, slot) in levels[1..=DATA_BITS].iter_mut().enumerate() {
        *slot = Level::from_bit(byte >> i);
    }
    levels
}

/// Rebuild a byte from its data-bit levels, LSB first.
pub fn assemble(data: &[Level; DATA_BITS]) -> u8 {
    data.iter()
        .enumerate()
        .fold(0u8, |acc, (i, level)| acc | (level.bit() << i))
}
