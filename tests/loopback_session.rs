use std::sync::{Arc, Mutex};

use uartecho_rs::bench::{Session, SessionConfig, TrialRecord};
use uartecho_rs::device::{Device, DeviceKind, DutPins, WireEcho};
use uartecho_rs::error::{BenchError, RxError, SimError};
use uartecho_rs::phy::{BitTiming, FrameDecoder, FrameEncoder};
use uartecho_rs::sim::{Level, Simulator, ns};

fn config(random_trials: usize) -> SessionConfig {
    SessionConfig {
        random_trials,
        seed: Some(0x5EED),
        ..Default::default()
    }
}

/// Echo that inverts data bit 0 of every frame.
struct FlipBit0 {
    clocks_per_bit: u32,
    since_start: Option<u32>,
}

impl Device for FlipBit0 {
    fn name(&self) -> &str {
        "flip-bit0"
    }

    fn on_rising_edge(&mut self, rst: Level, rx: Level) -> Level {
        if rst.is_high() {
            self.since_start = None;
            return Level::High;
        }
        let cpb = self.clocks_per_bit;
        self.since_start = match self.since_start {
            None if rx == Level::Low => Some(0),
            None => None,
            Some(n) if n + 1 >= 9 * cpb + cpb / 2 => None,
            Some(n) => Some(n + 1),
        };
        match self.since_start {
            Some(n) if (cpb..2 * cpb).contains(&n) => !rx,
            _ => rx,
        }
    }
}

/// Device that never transmits.
struct Silent;

impl Device for Silent {
    fn name(&self) -> &str {
        "silent"
    }

    fn on_rising_edge(&mut self, _rst: Level, _rx: Level) -> Level {
        Level::High
    }
}

#[test]
fn fixed_trials_round_trip() {
    let report = Session::new(config(0)).unwrap().run().unwrap();

    let sent: Vec<u8> = report.trials.iter().map(|t| t.sent).collect();
    assert_eq!(sent, vec![0x55, 0xA3, 0x00, 0xFF, 0x42]);
    assert!(report.trials.iter().all(TrialRecord::passed));
    assert_eq!(report.device, "wire-echo");
    assert_eq!(report.seed, 0x5EED);
}

#[test]
fn every_byte_round_trips_through_wire_echo() {
    let config = SessionConfig {
        clock_period_ps: ns(200),
        ..config(0)
    };
    let report = Session::new(config)
        .unwrap()
        .with_pattern((0..=255).collect())
        .run()
        .unwrap();

    assert_eq!(report.trials.len(), 256);
    for (value, trial) in report.trials.iter().enumerate() {
        assert_eq!(trial.sent as usize, value);
        assert_eq!(trial.received, trial.sent);
    }
}

#[test]
fn random_trials_back_to_back() {
    let report = Session::new(config(50)).unwrap().run().unwrap();

    assert_eq!(report.trials.len(), 55);
    assert!(report.passed());
    for pair in report.trials.windows(2) {
        assert!(pair[0].finished_ps <= pair[1].started_ps);
        assert_eq!(pair[1].index, pair[0].index + 1);
    }
}

#[test]
fn uart_model_echoes() {
    let config = SessionConfig {
        device: DeviceKind::Uart,
        strict_stop_bit: true,
        ..config(10)
    };
    let report = Session::new(config).unwrap().run().unwrap();

    assert_eq!(report.device, "uart-echo");
    assert_eq!(report.trials.len(), 15);
    assert!(report.passed());
}

#[test]
fn mismatch_aborts_session() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen);
    let device = FlipBit0 {
        clocks_per_bit: 434,
        since_start: None,
    };

    let err = Session::with_device(config(50), Box::new(device))
        .on_trial(move |record| observed.lock().unwrap().push(record.clone()))
        .run()
        .unwrap_err();

    assert!(matches!(
        err,
        BenchError::EchoMismatch {
            trial: 0,
            sent: 0x55,
            received: 0x54
        }
    ));
    assert_eq!(
        err.to_string(),
        "Echo mismatch in trial 0: sent 0x55, got 0x54"
    );
    // Nothing after the first mismatch runs.
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].passed());
}

#[test]
fn silent_device_hits_start_timeout() {
    let err = Session::with_device(config(0), Box::new(Silent))
        .run()
        .unwrap_err();

    assert!(matches!(
        err,
        BenchError::Receive {
            trial: 0,
            source: RxError::NoStartBit { .. }
        }
    ));
}

#[test]
fn silent_device_without_timeout_hits_time_limit() {
    let config = SessionConfig {
        start_timeout_bits: None,
        time_limit_ps: Some(ns(1_000_000)),
        ..config(0)
    };
    let err = Session::with_device(config, Box::new(Silent))
        .run()
        .unwrap_err();

    assert!(matches!(err, BenchError::Sim(SimError::TimeLimit { .. })));
}

#[test]
fn invalid_config_rejected() {
    let config = SessionConfig {
        reset_cycles: 2,
        ..config(0)
    };
    assert!(matches!(Session::new(config), Err(BenchError::Config(_))));
}

#[test]
fn nothing_decodes_while_in_reset() {
    let timing = BitTiming::new(115_200).unwrap();
    let mut sim = Simulator::new();
    let pins = DutPins::declare(&mut sim);
    sim.add_clock(pins.clk, ns(20)).unwrap();
    sim.attach(Box::new(WireEcho::new()), pins).unwrap();

    let encoder = FrameEncoder::new(timing, pins.rx);
    let decoder = FrameDecoder::new(timing, pins.clk, pins.tx)
        .with_start_timeout(Some(timing.offset(24)));

    let (in_reset, after_reset) = sim
        .run("bench", move |ctx| {
            ctx.write(pins.rst, Level::High)?;
            let tx = ctx.spawn("encoder", move |ctx| encoder.transmit(ctx, 0x42))?;
            let in_reset = decoder.receive(ctx);
            ctx.join(tx)??;

            ctx.write(pins.rst, Level::Low)?;
            ctx.wait(timing.bit_duration())?;
            let tx = ctx.spawn("encoder", move |ctx| encoder.transmit(ctx, 0x42))?;
            let after_reset = decoder.receive(ctx);
            ctx.join(tx)??;
            Ok::<_, SimError>((in_reset, after_reset))
        })
        .unwrap()
        .unwrap();

    assert!(matches!(in_reset, Err(RxError::NoStartBit { .. })));
    assert_eq!(after_reset.unwrap(), 0x42);
}

#[test]
fn concurrent_encoders_contend_for_line() {
    let timing = BitTiming::new(115_200).unwrap();
    let mut sim = Simulator::new();
    let pins = DutPins::declare(&mut sim);
    let encoder = FrameEncoder::new(timing, pins.rx);

    let (first, second) = sim
        .run("bench", move |ctx| {
            let a = ctx.spawn("encoder-a", move |ctx| encoder.transmit(ctx, 0x01))?;
            let b = ctx.spawn("encoder-b", move |ctx| encoder.transmit(ctx, 0x02))?;
            let second = ctx.join(b)?;
            let first = ctx.join(a)?;
            Ok::<_, SimError>((first, second))
        })
        .unwrap()
        .unwrap();

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(SimError::LineContended { ref signal, ref holder }) if signal == "rx" && holder == "encoder-a"
    ));
}

#[test]
fn bench_cannot_drive_device_output() {
    let mut sim = Simulator::new();
    let pins = DutPins::declare(&mut sim);

    let result = sim
        .run("bench", move |ctx| ctx.write(pins.tx, Level::Low))
        .unwrap();

    assert!(matches!(result, Err(SimError::ForeignDriver { .. })));
}
