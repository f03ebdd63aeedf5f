use crossbeam_channel::{Receiver, Sender};
use tracing::trace;

use super::signal::{Level, SignalId};
use super::time::SimTime;
use crate::error::SimError;

pub(crate) type Pid = usize;

pub(crate) type Body = Box<dyn FnOnce(&mut Context) + Send + 'static>;

/// Condition a suspended process waits on.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Trigger {
    Delay(SimTime),
    Until(SimTime),
    RisingEdge(SignalId),
    Level {
        clock: SignalId,
        line: SignalId,
        level: Level,
        deadline: Option<SimTime>,
    },
}

/// Why the kernel resumed a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WakeReason {
    Started,
    Elapsed,
    Edge,
    Level,
    TimedOut,
    Joined,
}

pub(crate) enum Request {
    Now,
    Read(SignalId),
    Write(SignalId, Level),
    Release(SignalId),
    Wait(Trigger),
    Spawn { name: String, body: Body },
    Join(Pid),
    Finish,
}

pub(crate) enum Reply {
    Resumed(WakeReason),
    Time(SimTime),
    Level(Level),
    Ack,
    Spawned(Pid),
    Refused(SimError),
    Shutdown,
}

/// A process's view of the simulation.
///
/// Every method is a round trip to the kernel. Methods that suspend return
/// only once the kernel resumes this process; meanwhile other processes run.
/// After the kernel starts shutting down every call fails with
/// [`SimError::Shutdown`].
pub struct Context {
    pid: Pid,
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    shut_down: bool,
}

/// Handle to a spawned process, consumed by [`Context::join`].
pub struct ProcessHandle<R> {
    pid: Pid,
    name: String,
    result: Receiver<R>,
}

impl<R> ProcessHandle<R> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Context {
    pub(crate) fn new(pid: Pid, requests: Sender<Request>, replies: Receiver<Reply>) -> Self {
        Self {
            pid,
            requests,
            replies,
            shut_down: false,
        }
    }

    /// Block until the kernel schedules the first run. Returns false if the
    /// kernel shut down before this process ever ran.
    pub(crate) fn wait_for_start(&mut self) -> bool {
        matches!(self.replies.recv(), Ok(Reply::Resumed(_)))
    }

    pub(crate) fn finish(&mut self) {
        let _ = self.requests.send(Request::Finish);
    }

    fn call(&mut self, request: Request) -> Result<Reply, SimError> {
        if self.shut_down {
            return Err(SimError::Shutdown);
        }
        self.requests
            .send(request)
            .map_err(|_| SimError::Disconnected)?;
        match self.replies.recv() {
            Ok(Reply::Shutdown) => {
                trace!("process {} observed shutdown", self.pid);
                self.shut_down = true;
                Err(SimError::Shutdown)
            }
            Ok(Reply::Refused(err)) => Err(err),
            Ok(reply) => Ok(reply),
            Err(_) => Err(SimError::Disconnected),
        }
    }

    fn suspend(&mut self, trigger: Trigger) -> Result<WakeReason, SimError> {
        match self.call(Request::Wait(trigger))? {
            Reply::Resumed(reason) => Ok(reason),
            _ => Err(SimError::Protocol { expected: "resume" }),
        }
    }

    /// Current simulation time.
    pub fn now(&mut self) -> Result<SimTime, SimError> {
        match self.call(Request::Now)? {
            Reply::Time(t) => Ok(t),
            _ => Err(SimError::Protocol { expected: "time" }),
        }
    }

    pub fn read(&mut self, line: SignalId) -> Result<Level, SimError> {
        match self.call(Request::Read(line))? {
            Reply::Level(level) => Ok(level),
            _ => Err(SimError::Protocol { expected: "level" }),
        }
    }

    /// Drive a bench line. The first write claims the line for this process
    /// until it calls [`release`](Self::release) or finishes.
    pub fn write(&mut self, line: SignalId, level: Level) -> Result<(), SimError> {
        match self.call(Request::Write(line, level))? {
            Reply::Ack => Ok(()),
            _ => Err(SimError::Protocol { expected: "ack" }),
        }
    }

    pub fn release(&mut self, line: SignalId) -> Result<(), SimError> {
        match self.call(Request::Release(line))? {
            Reply::Ack => Ok(()),
            _ => Err(SimError::Protocol { expected: "ack" }),
        }
    }

    /// Suspend for `duration` picoseconds.
    pub fn wait(&mut self, duration: SimTime) -> Result<(), SimError> {
        self.suspend(Trigger::Delay(duration)).map(|_| ())
    }

    /// Suspend until absolute time `at`; a time in the past resumes at the
    /// current time after other ready processes.
    pub fn wait_until(&mut self, at: SimTime) -> Result<(), SimError> {
        self.suspend(Trigger::Until(at)).map(|_| ())
    }

    /// Suspend until the next rising edge of `clock`.
    pub fn rising_edge(&mut self, clock: SignalId) -> Result<(), SimError> {
        self.suspend(Trigger::RisingEdge(clock)).map(|_| ())
    }

    /// Return once `line` reads `level`. If it already does, returns without
    /// suspending; otherwise it is checked on each rising edge of `clock`.
    /// Returns `false` if `deadline` passes first.
    pub fn wait_for_level(
        &mut self,
        clock: SignalId,
        line: SignalId,
        level: Level,
        deadline: Option<SimTime>,
    ) -> Result<bool, SimError> {
        let reason = self.suspend(Trigger::Level {
            clock,
            line,
            level,
            deadline,
        })?;
        Ok(reason != WakeReason::TimedOut)
    }

    /// Start `body` as a concurrent process. It begins running at the current
    /// time once this process next suspends.
    pub fn spawn<R, F>(
        &mut self,
        name: impl Into<String>,
        body: F,
    ) -> Result<ProcessHandle<R>, SimError>
    where
        F: FnOnce(&mut Context) -> R + Send + 'static,
        R: Send + 'static,
    {
        let name = name.into();
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let body: Body = Box::new(move |ctx: &mut Context| {
            let _ = result_tx.send(body(ctx));
        });
        match self.call(Request::Spawn {
            name: name.clone(),
            body,
        })? {
            Reply::Spawned(pid) => Ok(ProcessHandle {
                pid,
                name,
                result: result_rx,
            }),
            _ => Err(SimError::Protocol { expected: "spawned" }),
        }
    }

    /// Suspend until `handle`'s process finishes and return its result.
    pub fn join<R>(&mut self, handle: ProcessHandle<R>) -> Result<R, SimError> {
        match self.call(Request::Join(handle.pid))? {
            Reply::Resumed(_) => {}
            _ => return Err(SimError::Protocol { expected: "resume" }),
        }
        handle
            .result
            .try_recv()
            .map_err(|_| SimError::ProcessPanicked { name: handle.name })
    }
}
