use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::report::{SessionReport, TrialRecord};
use super::trials;
use crate::device::{Device, DutPins};
use crate::error::{BenchError, Result};
use crate::phy::{BitTiming, FrameDecoder, FrameEncoder};
use crate::sim::{Context, Level, Simulator, format_time};

type Observer = Box<dyn FnMut(&TrialRecord) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,      // Nothing driven yet
    Resetting, // Reset asserted, rx idle
    Trials,    // Echo trials in progress
    Done,      // Every trial matched
}

/// A single verification run against one device.
pub struct Session {
    config: SessionConfig,
    device: Box<dyn Device>,
    pattern: Vec<u8>,
    observer: Option<Observer>,
}

impl Session {
    /// Session against the loopback model named in `config`.
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let timing = config.timing()?;
        let device = config.device.build(&timing, config.clock_period_ps);
        Ok(Self::with_device(config, device))
    }

    /// Session against an arbitrary device model.
    pub fn with_device(config: SessionConfig, device: Box<dyn Device>) -> Self {
        Self {
            config,
            device,
            pattern: trials::fixed_pattern(),
            observer: None,
        }
    }

    /// Replace the fixed leading pattern.
    pub fn with_pattern(mut self, pattern: Vec<u8>) -> Self {
        self.pattern = pattern;
        self
    }

    /// Called after every trial, matched or not.
    pub fn on_trial(mut self, observer: impl FnMut(&TrialRecord) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn trial_count(&self) -> usize {
        self.pattern.len() + self.config.random_trials
    }

    /// Run the session to completion. The first mismatch ends it.
    pub fn run(self) -> Result<SessionReport> {
        self.config.validate()?;
        let timing = self.config.timing()?;
        let seed = self.config.seed.unwrap_or_else(trials::fresh_seed);
        let bytes = trials::trial_bytes(&self.pattern, self.config.random_trials, seed);

        info!(
            "Session: device={}, {} baud, bit={}, clock={}, {} trials, seed={}",
            self.device.name(),
            timing.symbol_rate(),
            format_time(timing.bit_duration()),
            format_time(self.config.clock_period_ps),
            bytes.len(),
            seed
        );

        let mut sim = Simulator::new();
        let pins = DutPins::declare(&mut sim);
        sim.add_clock(pins.clk, self.config.clock_period_ps)?;
        let device_name = self.device.name().to_string();
        sim.attach(self.device, pins)?;
        if let Some(limit) = self.config.time_limit_ps {
            sim.set_time_limit(limit);
        }

        let orchestrator = Orchestrator {
            encoder: FrameEncoder::new(timing, pins.rx),
            decoder: FrameDecoder::new(timing, pins.clk, pins.tx)
                .with_start_timeout(self.config.start_timeout(&timing))
                .with_strict_stop_bit(self.config.strict_stop_bit),
            config: self.config,
            timing,
            pins,
            state: SessionState::Idle,
            observer: self.observer,
        };

        let records = sim.run("orchestrator", move |ctx| orchestrator.run(ctx, &bytes))??;
        let sim_time_ps = records.last().map_or(0, |t| t.finished_ps);

        Ok(SessionReport {
            device: device_name,
            symbol_rate: timing.symbol_rate(),
            seed,
            trials: records,
            sim_time_ps,
        })
    }
}

struct Orchestrator {
    config: SessionConfig,
    timing: BitTiming,
    pins: DutPins,
    encoder: FrameEncoder,
    decoder: FrameDecoder,
    state: SessionState,
    observer: Option<Observer>,
}

impl Orchestrator {
    fn enter(&mut self, state: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn run(mut self, ctx: &mut Context, bytes: &[u8]) -> Result<Vec<TrialRecord>> {
        self.reset(ctx)?;

        self.enter(SessionState::Trials);
        let mut records = Vec::with_capacity(bytes.len());
        for (index, &sent) in bytes.iter().enumerate() {
            let record = self.trial(ctx, index, sent)?;
            let passed = record.passed();
            if let Some(observer) = self.observer.as_mut() {
                observer(&record);
            }
            if self.config.verbose {
                let status = if passed { "OK" } else { "FAIL" };
                info!(
                    "sent: 0x{:02X}  received: 0x{:02X}  {}",
                    record.sent, record.received, status
                );
            }
            if !passed {
                warn!("Trial {} failed at {}", index, format_time(record.finished_ps));
                return Err(BenchError::EchoMismatch {
                    trial: index,
                    sent: record.sent,
                    received: record.received,
                });
            }
            records.push(record);
        }

        self.enter(SessionState::Done);
        info!("All {} trials matched", records.len());
        Ok(records)
    }

    fn reset(&mut self, ctx: &mut Context) -> Result<()> {
        self.enter(SessionState::Resetting);
        ctx.write(self.pins.rx, Level::IDLE)?;
        ctx.write(self.pins.rst, Level::High)?;
        for _ in 0..self.config.reset_cycles {
            ctx.rising_edge(self.pins.clk)?;
        }
        ctx.write(self.pins.rst, Level::Low)?;
        // Encoders take the line over from here.
        ctx.release(self.pins.rx)?;
        // One idle bit period before the first frame.
        ctx.wait(self.timing.bit_duration())?;
        debug!("Reset released at {}", format_time(ctx.now()?));
        Ok(())
    }

    fn trial(&mut self, ctx: &mut Context, index: usize, sent: u8) -> Result<TrialRecord> {
        let started_ps = ctx.now()?;
        let encoder = self.encoder;
        let transmit = ctx.spawn(format!("encoder-{index}"), move |ctx| {
            encoder.transmit(ctx, sent)
        })?;

        let received = self
            .decoder
            .receive(ctx)
            .map_err(|source| BenchError::Receive {
                trial: index,
                source,
            })?;
        // The next start bit must not be driven before this frame's stop bit
        // has been held in full.
        ctx.join(transmit)??;

        let finished_ps = ctx.now()?;
        debug!(
            "Trial {}: sent 0x{:02X}, received 0x{:02X} ({} -> {})",
            index,
            sent,
            received,
            format_time(started_ps),
            format_time(finished_ps)
        );
        Ok(TrialRecord {
            index,
            sent,
            received,
            started_ps,
            finished_ps,
        })
    }
}
