use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use uartecho_rs::bench::{Session, SessionConfig};
use uartecho_rs::device::DeviceKind;
use uartecho_rs::error::Result;
use uartecho_rs::sim::PS_PER_NS;
use uartecho_rs::ui::{TrialProgress, print_banner};
use uartecho_rs::utils::dump::write_json;
use uartecho_rs::utils::logging::init_logging;

#[derive(Parser)]
#[command(author, version, about = "Verify a serial loopback device", long_about = None)]
struct Cli {
    /// JSON session config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Symbol rate in bits per second
    #[arg(long)]
    rate: Option<u32>,
    /// Device clock period in nanoseconds
    #[arg(long)]
    clock_period_ns: Option<u64>,
    /// Number of pseudo-random trials after the fixed pattern
    #[arg(short, long)]
    random: Option<usize>,
    /// Seed for the random trials
    #[arg(short, long)]
    seed: Option<u64>,
    /// Loopback model to verify
    #[arg(short, long, value_enum)]
    device: Option<DeviceKind>,
    /// Start-bit timeout in bit periods, 0 waits forever
    #[arg(long)]
    start_timeout_bits: Option<u32>,
    /// Fail trials whose stop bit samples low
    #[arg(long)]
    strict_stop_bit: bool,
    /// Abort past this much simulated time, in milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,
    /// Log every trial
    #[arg(
        short,
        long,
        env = "VERBOSE",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    verbose: bool,
    /// Write the session report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };
        if let Some(rate) = self.rate {
            config.symbol_rate = rate;
        }
        if let Some(period) = self.clock_period_ns {
            config.clock_period_ps = period * PS_PER_NS;
        }
        if let Some(random) = self.random {
            config.random_trials = random;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(bits) = self.start_timeout_bits {
            config.start_timeout_bits = (bits > 0).then_some(bits);
        }
        if let Some(ms) = self.time_limit_ms {
            config.time_limit_ps = Some(ms * 1_000_000_000);
        }
        config.strict_stop_bit |= self.strict_stop_bit;
        config.verbose |= self.verbose;
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.session_config()?;
    let verbose = config.verbose;
    let mut session = Session::new(config)?;

    let progress = (!verbose).then(|| TrialProgress::new(session.trial_count() as u64));
    if let Some(progress) = progress.clone() {
        session = session.on_trial(move |record| progress.record(record));
    }

    let outcome = session.run();
    if let Some(progress) = &progress {
        progress.finish(outcome.is_ok());
    }
    let report = outcome?;

    info!(
        "PASS: {} trials on {} (seed {})",
        report.trials.len(),
        report.device,
        report.seed
    );
    if let Some(path) = &cli.report {
        write_json(path, &report)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}

fn main() {
    init_logging();
    print_banner();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        error!("FAIL: {}", err);
        std::process::exit(1);
    }
}
