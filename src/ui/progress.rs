use indicatif::{ProgressBar, ProgressStyle};

use crate::bench::TrialRecord;

/// Progress bar over the trials of one session. Clones share the same bar.
#[derive(Clone)]
pub struct TrialProgress {
    bar: ProgressBar,
}

impl TrialProgress {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(templates::TRIALS)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        Self { bar }
    }

    /// 记录一次试验结果
    pub fn record(&self, record: &TrialRecord) {
        self.bar.set_message(format!(
            "0x{:02X} -> 0x{:02X}",
            record.sent, record.received
        ));
        self.bar.inc(1);
    }

    /// 完成进度条（保留显示）
    pub fn finish(&self, passed: bool) {
        if passed {
            self.bar.finish_with_message("all echoed");
        } else {
            self.bar.abandon_with_message("failed");
        }
    }
}

pub mod templates {
    pub const TRIALS: &str =
        "ECHO [{bar:30.cyan}] {percent}% ({pos}/{len} trials) {msg}";
}
