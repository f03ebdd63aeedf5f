use serde::{Deserialize, Serialize};

use crate::sim::SimTime;

/// One sent/received pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub index: usize,
    pub sent: u8,
    pub received: u8,
    pub started_ps: SimTime,
    pub finished_ps: SimTime,
}

impl TrialRecord {
    pub fn passed(&self) -> bool {
        self.sent == self.received
    }
}

/// Outcome of a session in which every trial matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub device: String,
    pub symbol_rate: u32,
    pub seed: u64,
    pub trials: Vec<TrialRecord>,
    pub sim_time_ps: SimTime,
}

impl SessionReport {
    pub fn passed(&self) -> bool {
        self.trials.iter().all(TrialRecord::passed)
    }
}
