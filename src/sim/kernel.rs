use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, trace, warn};

use super::process::{Body, Context, Pid, Reply, Request, Trigger, WakeReason};
use super::signal::{Driver, Level, SignalId, SignalTable, Transition};
use super::time::SimTime;
use crate::device::{Device, DutPins};
use crate::error::SimError;

enum Event {
    ClockToggle(usize),
    Wake {
        pid: Pid,
        token: u64,
        reason: WakeReason,
    },
}

struct Scheduled {
    at: SimTime,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

#[derive(Debug, Clone, Copy)]
enum Wait {
    Edge { clock: SignalId },
    Level { clock: SignalId, line: SignalId, level: Level },
    Join(Pid),
}

#[derive(Debug, Clone, Copy)]
enum SlotState {
    /// A wake event is queued.
    Scheduled,
    /// Waiting on a condition the kernel evaluates.
    Waiting(Wait),
    Running,
    Finished,
}

struct ProcessSlot {
    name: String,
    requests: Receiver<Request>,
    replies: Sender<Reply>,
    thread: Option<JoinHandle<()>>,
    state: SlotState,
    // Bumped on every suspension so stale wake events are discarded.
    token: u64,
    joiners: Vec<Pid>,
}

struct Clock {
    line: SignalId,
    high: SimTime,
    low: SimTime,
}

struct HostedDevice {
    device: Box<dyn Device>,
    pins: DutPins,
}

/// Discrete-event simulator with cooperative processes.
///
/// Processes run on their own threads but strictly one at a time: the kernel
/// resumes a process, serves its requests, and regains control when the
/// process suspends or finishes. Clocks and hosted devices are evaluated by
/// the kernel itself.
pub struct Simulator {
    now: SimTime,
    seq: u64,
    queue: BinaryHeap<Reverse<Scheduled>>,
    signals: SignalTable,
    clocks: Vec<Clock>,
    devices: Vec<HostedDevice>,
    processes: Vec<ProcessSlot>,
    // Processes suspended on an edge or level condition, in arrival order.
    edge_waiters: Vec<Pid>,
    time_limit: Option<SimTime>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            now: 0,
            seq: 0,
            queue: BinaryHeap::new(),
            signals: SignalTable::default(),
            clocks: Vec::new(),
            devices: Vec::new(),
            processes: Vec::new(),
            edge_waiters: Vec::new(),
            time_limit: None,
        }
    }

    pub fn add_signal(&mut self, name: &str, driver: Driver, initial: Level) -> SignalId {
        self.signals.add(name, driver, initial)
    }

    /// Abort the run once the timeline would pass `limit`.
    pub fn set_time_limit(&mut self, limit: SimTime) {
        self.time_limit = Some(limit);
    }

    /// Toggle `line` with the given period, starting low at t=0 so the first
    /// rising edge falls at half a period.
    pub fn add_clock(&mut self, line: SignalId, period: SimTime) -> Result<(), SimError> {
        self.require_driver(line, Driver::Clock)?;
        let high = period / 2;
        let clock = Clock {
            line,
            high,
            low: period - high,
        };
        self.signals.set(line, Level::Low);
        let first = clock.low;
        self.clocks.push(clock);
        self.push(first, Event::ClockToggle(self.clocks.len() - 1));
        Ok(())
    }

    /// Evaluate `device` on every rising edge of `pins.clk`.
    pub fn attach(&mut self, device: Box<dyn Device>, pins: DutPins) -> Result<(), SimError> {
        self.require_driver(pins.tx, Driver::Device)?;
        debug!(
            "Attached device '{}' clocked by '{}'",
            device.name(),
            self.signals.name(pins.clk)
        );
        self.devices.push(HostedDevice { device, pins });
        Ok(())
    }

    fn require_driver(&self, line: SignalId, expected: Driver) -> Result<(), SimError> {
        let driver = self.signals.driver(line);
        if driver == expected {
            Ok(())
        } else {
            Err(SimError::ForeignDriver {
                signal: self.signals.name(line).to_string(),
                driver,
            })
        }
    }

    /// Run `main` as the top-level process until it returns.
    ///
    /// Processes still alive afterwards are shut down and their threads
    /// joined before the result is handed back.
    pub fn run<R, F>(mut self, name: &str, main: F) -> Result<R, SimError>
    where
        F: FnOnce(&mut Context) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let body: Body = Box::new(move |ctx: &mut Context| {
            let _ = result_tx.send(main(ctx));
        });
        let main_pid = self.create(name.to_string(), body)?;

        let outcome = self.event_loop(main_pid);
        self.shutdown();
        outcome?;

        result_rx
            .try_recv()
            .map_err(|_| SimError::ProcessPanicked {
                name: name.to_string(),
            })
    }

    fn event_loop(&mut self, main_pid: Pid) -> Result<(), SimError> {
        while !matches!(self.processes[main_pid].state, SlotState::Finished) {
            let Some(Reverse(next)) = self.queue.pop() else {
                return Err(SimError::Stalled { at: self.now });
            };
            if let Some(limit) = self.time_limit {
                if next.at > limit {
                    return Err(SimError::TimeLimit { limit });
                }
            }
            self.now = next.at;
            match next.event {
                Event::ClockToggle(index) => self.toggle_clock(index),
                Event::Wake { pid, token, reason } => {
                    if self.accepts(pid, token, reason) {
                        if reason == WakeReason::TimedOut {
                            self.edge_waiters.retain(|&p| p != pid);
                        }
                        self.resume(pid, reason);
                    }
                }
            }
        }
        Ok(())
    }

    fn accepts(&self, pid: Pid, token: u64, reason: WakeReason) -> bool {
        let slot = &self.processes[pid];
        if slot.token != token {
            return false;
        }
        match (reason, slot.state) {
            (WakeReason::TimedOut, SlotState::Waiting(_)) => true,
            (WakeReason::TimedOut, _) => false,
            (_, SlotState::Scheduled) => true,
            _ => false,
        }
    }

    fn push(&mut self, at: SimTime, event: Event) {
        self.seq += 1;
        self.queue.push(Reverse(Scheduled {
            at,
            seq: self.seq,
            event,
        }));
    }

    fn schedule_wake(&mut self, pid: Pid, at: SimTime, reason: WakeReason) {
        let slot = &mut self.processes[pid];
        slot.state = SlotState::Scheduled;
        let token = slot.token;
        self.push(at, Event::Wake { pid, token, reason });
    }

    fn create(&mut self, name: String, body: Body) -> Result<Pid, SimError> {
        let pid = self.processes.len();
        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let (rep_tx, rep_rx) = crossbeam_channel::unbounded();
        let mut ctx = Context::new(pid, req_tx, rep_rx);

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if ctx.wait_for_start() {
                    body(&mut ctx);
                }
                ctx.finish();
            })
            .map_err(|e| SimError::Spawn {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        trace!("t={} spawn process {} '{}'", self.now, pid, name);
        self.processes.push(ProcessSlot {
            name,
            requests: req_rx,
            replies: rep_tx,
            thread: Some(thread),
            state: SlotState::Scheduled,
            token: 0,
            joiners: Vec::new(),
        });
        self.schedule_wake(pid, self.now, WakeReason::Started);
        Ok(pid)
    }

    fn resume(&mut self, pid: Pid, reason: WakeReason) {
        trace!(
            "t={} resume '{}' ({:?})",
            self.now, self.processes[pid].name, reason
        );
        self.processes[pid].state = SlotState::Running;
        if self.reply(pid, Reply::Resumed(reason)) {
            self.serve(pid);
        } else {
            self.finish(pid);
        }
    }

    fn reply(&self, pid: Pid, reply: Reply) -> bool {
        self.processes[pid].replies.send(reply).is_ok()
    }

    /// Answer requests from the running process until it suspends or ends.
    fn serve(&mut self, pid: Pid) {
        loop {
            let Ok(request) = self.processes[pid].requests.recv() else {
                error!("process '{}' terminated abnormally", self.processes[pid].name);
                self.finish(pid);
                return;
            };
            let reply = match request {
                Request::Now => Reply::Time(self.now),
                Request::Read(line) => {
                    if !self.signals.contains(line) {
                        Reply::Refused(SimError::Protocol { expected: "known signal" })
                    } else {
                        Reply::Level(self.signals.level(line))
                    }
                }
                Request::Write(line, level) => self.drive(pid, line, level),
                Request::Release(line) => {
                    self.signals.release(pid, line);
                    Reply::Ack
                }
                Request::Wait(trigger) => {
                    if let Some(reason) = self.suspend(pid, trigger) {
                        Reply::Resumed(reason)
                    } else {
                        return;
                    }
                }
                Request::Spawn { name, body } => match self.create(name, body) {
                    Ok(child) => Reply::Spawned(child),
                    Err(err) => Reply::Refused(err),
                },
                Request::Join(target) => {
                    if target >= self.processes.len() {
                        Reply::Refused(SimError::Protocol { expected: "known process" })
                    } else if matches!(self.processes[target].state, SlotState::Finished) {
                        Reply::Resumed(WakeReason::Joined)
                    } else {
                        self.processes[pid].token += 1;
                        self.processes[pid].state = SlotState::Waiting(Wait::Join(target));
                        self.processes[target].joiners.push(pid);
                        return;
                    }
                }
                Request::Finish => {
                    self.finish(pid);
                    return;
                }
            };
            if !self.reply(pid, reply) {
                self.finish(pid);
                return;
            }
        }
    }

    fn drive(&mut self, pid: Pid, line: SignalId, level: Level) -> Reply {
        if !self.signals.contains(line) {
            return Reply::Refused(SimError::Protocol { expected: "known signal" });
        }
        let processes = &self.processes;
        match self
            .signals
            .drive(pid, line, level, |holder| processes[holder].name.clone())
        {
            Ok(transition) => {
                trace!(
                    "t={} {} <= {:?}",
                    self.now,
                    self.signals.name(line),
                    level
                );
                if transition == Transition::Rising {
                    self.on_rising_edge(line);
                }
                Reply::Ack
            }
            Err(err) => Reply::Refused(err),
        }
    }

    /// Register `trigger` for `pid`. Returns a wake reason when the condition
    /// already holds and the process may continue without suspending.
    fn suspend(&mut self, pid: Pid, trigger: Trigger) -> Option<WakeReason> {
        if let Trigger::Level { line, level, .. } = trigger {
            if self.signals.level(line) == level {
                return Some(WakeReason::Level);
            }
        }

        self.processes[pid].token += 1;
        match trigger {
            Trigger::Delay(duration) => {
                self.schedule_wake(pid, self.now + duration, WakeReason::Elapsed);
            }
            Trigger::Until(at) => {
                self.schedule_wake(pid, at.max(self.now), WakeReason::Elapsed);
            }
            Trigger::RisingEdge(clock) => {
                self.processes[pid].state = SlotState::Waiting(Wait::Edge { clock });
                self.edge_waiters.push(pid);
            }
            Trigger::Level {
                clock,
                line,
                level,
                deadline,
            } => {
                self.processes[pid].state =
                    SlotState::Waiting(Wait::Level { clock, line, level });
                self.edge_waiters.push(pid);
                if let Some(deadline) = deadline {
                    let token = self.processes[pid].token;
                    self.push(
                        deadline.max(self.now),
                        Event::Wake {
                            pid,
                            token,
                            reason: WakeReason::TimedOut,
                        },
                    );
                }
            }
        }
        None
    }

    fn finish(&mut self, pid: Pid) {
        trace!("t={} process '{}' finished", self.now, self.processes[pid].name);
        self.processes[pid].state = SlotState::Finished;
        self.signals.release_all(pid);
        for joiner in std::mem::take(&mut self.processes[pid].joiners) {
            if matches!(
                self.processes[joiner].state,
                SlotState::Waiting(Wait::Join(target)) if target == pid
            ) {
                self.schedule_wake(joiner, self.now, WakeReason::Joined);
            }
        }
    }

    fn toggle_clock(&mut self, index: usize) {
        let line = self.clocks[index].line;
        let next = !self.signals.level(line);
        self.signals.set(line, next);
        let hold = match next {
            Level::High => self.clocks[index].high,
            Level::Low => self.clocks[index].low,
        };
        self.push(self.now + hold, Event::ClockToggle(index));
        if next == Level::High {
            self.on_rising_edge(line);
        }
    }

    fn on_rising_edge(&mut self, line: SignalId) {
        // All devices sample their inputs before any output changes.
        let signals = &self.signals;
        let outputs: Vec<(SignalId, Level)> = self
            .devices
            .iter_mut()
            .filter(|hosted| hosted.pins.clk == line)
            .map(|hosted| {
                let rst = signals.level(hosted.pins.rst);
                let rx = signals.level(hosted.pins.rx);
                (hosted.pins.tx, hosted.device.on_rising_edge(rst, rx))
            })
            .collect();
        for (tx, level) in outputs {
            self.signals.set(tx, level);
        }

        let waiters = std::mem::take(&mut self.edge_waiters);
        let mut still_waiting = Vec::with_capacity(waiters.len());
        for pid in waiters {
            let state = self.processes[pid].state;
            match state {
                SlotState::Waiting(Wait::Edge { clock }) if clock == line => {
                    self.schedule_wake(pid, self.now, WakeReason::Edge);
                }
                SlotState::Waiting(Wait::Level {
                    clock,
                    line: watched,
                    level,
                }) if clock == line && self.signals.level(watched) == level => {
                    self.schedule_wake(pid, self.now, WakeReason::Level);
                }
                SlotState::Waiting(Wait::Edge { .. }) | SlotState::Waiting(Wait::Level { .. }) => {
                    still_waiting.push(pid);
                }
                _ => {}
            }
        }
        // Writes made by resumed processes cannot run before this point, so
        // nothing was appended to `edge_waiters` meanwhile.
        self.edge_waiters = still_waiting;
    }

    fn shutdown(&mut self) {
        for pid in 0..self.processes.len() {
            if matches!(self.processes[pid].state, SlotState::Finished) {
                continue;
            }
            debug!("Shutting down process '{}'", self.processes[pid].name);
            let mut reply_ok = self.reply(pid, Reply::Shutdown);
            while reply_ok {
                match self.processes[pid].requests.recv() {
                    Ok(Request::Finish) | Err(_) => break,
                    Ok(_) => reply_ok = self.reply(pid, Reply::Shutdown),
                }
            }
            self.processes[pid].state = SlotState::Finished;
        }

        for slot in &mut self.processes {
            if let Some(thread) = slot.thread.take() {
                if thread.join().is_err() {
                    warn!("process '{}' panicked", slot.name);
                }
            }
        }
    }
}
