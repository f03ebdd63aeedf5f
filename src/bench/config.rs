use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::DeviceKind;
use crate::error::{BenchError, Result};
use crate::phy::BitTiming;
use crate::sim::SimTime;
use crate::utils::consts::*;

/// Everything a verification session needs, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Symbol rate in bits per second.
    pub symbol_rate: u32,
    /// Device clock period in picoseconds.
    pub clock_period_ps: u64,
    /// Rising clock edges reset is held for.
    pub reset_cycles: u32,
    /// Pseudo-random bytes appended after the fixed pattern.
    pub random_trials: usize,
    /// Seed for the random bytes; drawn fresh and reported when absent.
    pub seed: Option<u64>,
    /// Log every trial at info level.
    pub verbose: bool,
    /// Start-bit deadline in bit periods; `None` waits forever.
    pub start_timeout_bits: Option<u32>,
    /// Fail a trial whose stop bit samples low.
    pub strict_stop_bit: bool,
    /// Abort the whole session past this simulation time.
    pub time_limit_ps: Option<u64>,
    /// Loopback model to verify.
    pub device: DeviceKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            symbol_rate: SYMBOL_RATE,
            clock_period_ps: CLOCK_PERIOD_PS,
            reset_cycles: RESET_CYCLES,
            random_trials: RANDOM_TRIALS,
            seed: None,
            verbose: false,
            start_timeout_bits: Some(START_TIMEOUT_BITS),
            strict_stop_bit: false,
            time_limit_ps: None,
            device: DeviceKind::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: SessionConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let timing = BitTiming::new(self.symbol_rate)?;
        if self.clock_period_ps == 0 {
            return Err(BenchError::Config("clock period must be positive".into()));
        }
        if self.reset_cycles < MIN_RESET_CYCLES {
            return Err(BenchError::Config(format!(
                "reset must be held for at least {} cycles, got {}",
                MIN_RESET_CYCLES, self.reset_cycles
            )));
        }
        // The start edge is only seen on clock edges; a slower clock would
        // move the sampling point past the bit centre.
        if self.clock_period_ps >= timing.offset(1) {
            return Err(BenchError::Config(format!(
                "clock period {} ps is too slow for {} baud",
                self.clock_period_ps, self.symbol_rate
            )));
        }
        if self.start_timeout_bits == Some(0) {
            return Err(BenchError::Config("start timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn timing(&self) -> Result<BitTiming> {
        BitTiming::new(self.symbol_rate)
    }

    pub fn start_timeout(&self, timing: &BitTiming) -> Option<SimTime> {
        self.start_timeout_bits
            .map(|bits| timing.offset(2 * bits as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.symbol_rate, 115_200);
        assert_eq!(config.clock_period_ps, 20_000);
    }

    #[test]
    fn test_rejects_bad_values() {
        let short_reset = SessionConfig {
            reset_cycles: 4,
            ..Default::default()
        };
        assert!(matches!(short_reset.validate(), Err(BenchError::Config(_))));

        let zero_rate = SessionConfig {
            symbol_rate: 0,
            ..Default::default()
        };
        assert!(matches!(zero_rate.validate(), Err(BenchError::Config(_))));

        let slow_clock = SessionConfig {
            clock_period_ps: 5_000_000,
            ..Default::default()
        };
        assert!(matches!(slow_clock.validate(), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "random_trials": 3, "seed": 7, "device": "uart" }"#).unwrap();
        assert_eq!(config.random_trials, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.device, DeviceKind::Uart);
        assert_eq!(config.symbol_rate, SYMBOL_RATE);
    }
}
