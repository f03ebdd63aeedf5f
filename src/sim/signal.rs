use super::process::Pid;
use crate::error::SimError;

/// Logic level of a single-bit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Level of an idle serial line.
    pub const IDLE: Level = Level::High;

    pub fn from_bit(bit: u8) -> Self {
        if bit & 1 == 1 { Level::High } else { Level::Low }
    }

    pub fn bit(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }

    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl std::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Who is allowed to change a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// Harness processes, one at a time.
    Bench,
    /// A hosted device output.
    Device,
    /// A kernel clock generator.
    Clock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    None,
    Rising,
    Falling,
}

struct Signal {
    name: String,
    level: Level,
    driver: Driver,
    // Bench process currently holding the line.
    claim: Option<Pid>,
}

#[derive(Default)]
pub(crate) struct SignalTable {
    signals: Vec<Signal>,
}

impl SignalTable {
    pub fn add(&mut self, name: &str, driver: Driver, initial: Level) -> SignalId {
        self.signals.push(Signal {
            name: name.to_string(),
            level: initial,
            driver,
            claim: None,
        });
        SignalId(self.signals.len() - 1)
    }

    pub fn level(&self, id: SignalId) -> Level {
        self.signals[id.0].level
    }

    pub fn name(&self, id: SignalId) -> &str {
        &self.signals[id.0].name
    }

    pub fn driver(&self, id: SignalId) -> Driver {
        self.signals[id.0].driver
    }

    pub fn contains(&self, id: SignalId) -> bool {
        id.0 < self.signals.len()
    }

    /// Unchecked write used by clocks and devices.
    pub fn set(&mut self, id: SignalId, level: Level) -> Transition {
        let signal = &mut self.signals[id.0];
        let old = std::mem::replace(&mut signal.level, level);
        match (old, level) {
            (Level::Low, Level::High) => Transition::Rising,
            (Level::High, Level::Low) => Transition::Falling,
            _ => Transition::None,
        }
    }

    /// Write on behalf of a bench process, enforcing one writer per line.
    /// `holder_name` resolves the current claim holder for the error message.
    pub fn drive(
        &mut self,
        pid: Pid,
        id: SignalId,
        level: Level,
        holder_name: impl Fn(Pid) -> String,
    ) -> Result<Transition, SimError> {
        let signal = &mut self.signals[id.0];
        if signal.driver != Driver::Bench {
            return Err(SimError::ForeignDriver {
                signal: signal.name.clone(),
                driver: signal.driver,
            });
        }
        match signal.claim {
            Some(holder) if holder != pid => {
                return Err(SimError::LineContended {
                    signal: signal.name.clone(),
                    holder: holder_name(holder),
                });
            }
            _ => signal.claim = Some(pid),
        }
        Ok(self.set(id, level))
    }

    pub fn release(&mut self, pid: Pid, id: SignalId) {
        let signal = &mut self.signals[id.0];
        if signal.claim == Some(pid) {
            signal.claim = None;
        }
    }

    pub fn release_all(&mut self, pid: Pid) {
        for signal in &mut self.signals {
            if signal.claim == Some(pid) {
                signal.claim = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut table = SignalTable::default();
        let line = table.add("line", Driver::Clock, Level::Low);
        assert_eq!(table.set(line, Level::High), Transition::Rising);
        assert_eq!(table.set(line, Level::High), Transition::None);
        assert_eq!(table.set(line, Level::Low), Transition::Falling);
    }

    #[test]
    fn test_single_writer() {
        let mut table = SignalTable::default();
        let rx = table.add("rx", Driver::Bench, Level::High);
        let tx = table.add("tx", Driver::Device, Level::High);

        assert!(table.drive(1, rx, Level::Low, |_| String::new()).is_ok());
        let err = table
            .drive(2, rx, Level::High, |pid| format!("p{pid}"))
            .unwrap_err();
        assert!(matches!(err, SimError::LineContended { ref holder, .. } if holder == "p1"));

        table.release(1, rx);
        assert!(table.drive(2, rx, Level::High, |_| String::new()).is_ok());

        let err = table.drive(2, tx, Level::Low, |_| String::new()).unwrap_err();
        assert!(matches!(err, SimError::ForeignDriver { driver: Driver::Device, .. }));
    }

    #[test]
    fn test_level_bits() {
        assert_eq!(Level::from_bit(0b10), Level::Low);
        assert_eq!(Level::from_bit(1), Level::High);
        assert_eq!((!Level::IDLE).bit(), 0);
    }
}
