/// 日志级别（可被 RUST_LOG 覆盖）
pub const LOG_LEVEL: &str = "info";

// ============================================================================
// Serial line parameters
// ============================================================================

/// Symbol rate (bits per second)
pub const SYMBOL_RATE: u32 = 115_200;

/// Device clock period in picoseconds (50 MHz)
pub const CLOCK_PERIOD_PS: u64 = 20_000;

// ============================================================================
// Session parameters
// ============================================================================

/// Clock edges reset is held for
pub const RESET_CYCLES: u32 = 5;

/// Minimum accepted reset length
pub const MIN_RESET_CYCLES: u32 = 5;

/// Pseudo-random bytes after the fixed pattern
pub const RANDOM_TRIALS: usize = 50;

/// Fixed bytes every session starts with
pub const FIXED_TRIALS: [u8; 5] = [0x55, 0xA3, 0x00, 0xFF, 0x42];

/// Start-bit deadline in bit periods; covers a full frame of device latency
/// plus a frame of slack
pub const START_TIMEOUT_BITS: u32 = 30;
