//! Lifecycle of the real worker process backing each resident workload.
//!
//! Every transition writes the simulated time to the worker's stdin as a
//! 4-byte big-endian integer, then (except for dispatch) delivers a signal:
//!
//! | transition | signal  | reply                               |
//! |------------|---------|-------------------------------------|
//! | dispatch   | -       | 1 byte, low byte of the time        |
//! | resume     | SIGCONT | 1 byte, low byte of the time        |
//! | preempt    | SIGTSTP | none; waits until the worker stops  |
//! | terminate  | SIGTERM | up to 64 bytes of output, then exit |
//!
//! All I/O blocks with no timeout. A worker that never stops or never
//! answers stalls the whole simulation.

use std::{
    borrow::Cow,
    fmt,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
};

use log::{debug, warn};
use nix::{
    errno::Errno,
    sys::{
        signal::{self, Signal},
        wait::{self, WaitPidFlag, WaitStatus},
    },
    unistd::Pid,
};
use slotmap::SecondaryMap;
use thiserror::Error;

use super::state::{ProcessState, Ticks, WorkloadId, WorkloadName};

pub const OUTPUT_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn worker {program:?} for P{name}")]
    Spawn {
        name: WorkloadName,
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("pipe to worker P{name} failed")]
    Pipe {
        name: WorkloadName,
        #[source]
        source: io::Error,
    },
    #[error("failed to deliver {signal:?} to worker P{name}")]
    Signal {
        name: WorkloadName,
        signal: Signal,
        #[source]
        source: Errno,
    },
    #[error("failed to wait for worker P{name}")]
    Wait {
        name: WorkloadName,
        #[source]
        source: Errno,
    },
    #[error("failed to reap worker P{name}")]
    Reap {
        name: WorkloadName,
        #[source]
        source: io::Error,
    },
    #[error("worker P{name} exited while being stopped")]
    ExitedEarly { name: WorkloadName },
    #[error("worker P{name} was already dispatched")]
    AlreadyDispatched { name: WorkloadName },
    #[error("cannot {transition} worker P{name} while {state:?}")]
    InvalidTransition {
        name: WorkloadName,
        transition: &'static str,
        state: ProcessState,
    },
    #[error("no live worker for workload {0:?}")]
    NotResident(WorkloadId),
    #[error("simulated time {0} does not fit in 4 bytes")]
    ClockOverflow(Ticks),
}

/// Opaque result a worker writes on termination, zero padded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WorkerOutput([u8; OUTPUT_LEN]);

impl WorkerOutput {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0; OUTPUT_LEN];
        let len = bytes.len().min(OUTPUT_LEN);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8; OUTPUT_LEN] {
        &self.0
    }

    /// Text up to the first NUL.
    pub fn to_str_lossy(&self) -> Cow<'_, str> {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(OUTPUT_LEN);
        String::from_utf8_lossy(&self.0[..len])
    }
}

impl fmt::Display for WorkerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl fmt::Debug for WorkerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkerOutput")
            .field(&self.to_str_lossy())
            .finish()
    }
}

pub fn encode_tick(now: Ticks) -> Result<[u8; 4], ProcessError> {
    u32::try_from(now)
        .map(u32::to_be_bytes)
        .map_err(|_| ProcessError::ClockOverflow(now))
}

pub fn decode_tick(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// The byte a worker echoes back for a time message.
pub fn ack_byte(now: Ticks) -> u8 {
    (now & 0xff) as u8
}

/// Transitions the engine drives for each resident workload.
pub trait ProcessControl {
    fn dispatch(
        &mut self,
        id: WorkloadId,
        name: WorkloadName,
        now: Ticks,
    ) -> Result<(), ProcessError>;

    fn resume(&mut self, id: WorkloadId, now: Ticks) -> Result<(), ProcessError>;

    fn preempt(&mut self, id: WorkloadId, now: Ticks) -> Result<(), ProcessError>;

    fn terminate(&mut self, id: WorkloadId, now: Ticks) -> Result<WorkerOutput, ProcessError>;
}

pub struct ProcessController {
    program: PathBuf,
    workers: SecondaryMap<WorkloadId, WorkerProcess>,
}

impl ProcessController {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            workers: SecondaryMap::new(),
        }
    }

    pub fn pid(&self, id: WorkloadId) -> Option<Pid> {
        self.workers.get(id).map(|worker| worker.pid)
    }

    pub fn state(&self, id: WorkloadId) -> ProcessState {
        self.workers
            .get(id)
            .map_or(ProcessState::NotStarted, |worker| worker.state)
    }

    pub fn resident(&self) -> usize {
        self.workers.len()
    }

    fn worker(&mut self, id: WorkloadId) -> Result<&mut WorkerProcess, ProcessError> {
        self.workers
            .get_mut(id)
            .ok_or(ProcessError::NotResident(id))
    }
}

impl ProcessControl for ProcessController {
    fn dispatch(
        &mut self,
        id: WorkloadId,
        name: WorkloadName,
        now: Ticks,
    ) -> Result<(), ProcessError> {
        if self.workers.contains_key(id) {
            return Err(ProcessError::AlreadyDispatched { name });
        }

        // Dropping on an error path kills and reaps the child
        let mut worker = WorkerProcess::spawn(&self.program, name)?;
        worker.send_tick(now)?;
        worker.expect_ack(now)?;
        worker.state = ProcessState::Running;
        debug!("t={now} dispatched P{name} as pid {}", worker.pid);

        self.workers.insert(id, worker);
        Ok(())
    }

    fn resume(&mut self, id: WorkloadId, now: Ticks) -> Result<(), ProcessError> {
        let worker = self.worker(id)?;
        worker.expect_state("resume", &[ProcessState::Running, ProcessState::Stopped])?;
        worker.resume(now)
    }

    fn preempt(&mut self, id: WorkloadId, now: Ticks) -> Result<(), ProcessError> {
        let worker = self.worker(id)?;
        // A second stop would never be reported by waitpid
        worker.expect_state("preempt", &[ProcessState::Running])?;
        worker.send_tick(now)?;
        worker.signal(Signal::SIGTSTP)?;
        worker.wait_stopped()?;
        worker.state = ProcessState::Stopped;
        debug!("t={now} stopped P{}", worker.name);
        Ok(())
    }

    fn terminate(&mut self, id: WorkloadId, now: Ticks) -> Result<WorkerOutput, ProcessError> {
        let mut worker = self.workers.remove(id).ok_or(ProcessError::NotResident(id))?;
        if worker.state == ProcessState::Stopped {
            worker.resume(now)?;
        }

        // The worker may already be gone; whatever it left in the pipe is its output
        if let Err(err) = worker.send_tick(now) {
            warn!("t={now} final time not delivered to P{}: {err}", worker.name);
        }
        match worker.signal(Signal::SIGTERM) {
            Err(ProcessError::Signal {
                source: Errno::ESRCH,
                ..
            }) => warn!("t={now} P{} exited before SIGTERM", worker.name),
            Err(err) => return Err(err),
            Ok(()) => {}
        }

        let output = worker.read_output();
        worker.reap()?;
        Ok(output)
    }
}

struct WorkerProcess {
    name: WorkloadName,
    pid: Pid,
    child: Child,
    state: ProcessState,
}

impl WorkerProcess {
    fn spawn(program: &Path, name: WorkloadName) -> Result<Self, ProcessError> {
        let child = Command::new(program)
            .arg(format!("P{name}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                name,
                program: program.to_path_buf(),
                source,
            })?;

        Ok(Self {
            name,
            pid: Pid::from_raw(child.id() as i32),
            child,
            state: ProcessState::NotStarted,
        })
    }

    fn pipe_error(&self, source: io::Error) -> ProcessError {
        ProcessError::Pipe {
            name: self.name,
            source,
        }
    }

    fn closed_pipe(&self) -> ProcessError {
        self.pipe_error(io::Error::new(io::ErrorKind::BrokenPipe, "pipe already closed"))
    }

    fn send_tick(&mut self, now: Ticks) -> Result<(), ProcessError> {
        let bytes = encode_tick(now)?;
        let Some(stdin) = self.child.stdin.as_mut() else {
            return Err(self.closed_pipe());
        };
        let result = stdin.write_all(&bytes).and_then(|()| stdin.flush());
        result.map_err(|source| self.pipe_error(source))
    }

    fn expect_ack(&mut self, now: Ticks) -> Result<(), ProcessError> {
        let Some(stdout) = self.child.stdout.as_mut() else {
            return Err(self.closed_pipe());
        };
        let mut ack = [0; 1];
        let result = stdout.read_exact(&mut ack);
        result.map_err(|source| self.pipe_error(source))?;

        if ack[0] != ack_byte(now) {
            warn!(
                "t={now} P{} acknowledged {:#04x}, expected {:#04x}",
                self.name,
                ack[0],
                ack_byte(now)
            );
        }
        Ok(())
    }

    fn expect_state(
        &self,
        transition: &'static str,
        allowed: &[ProcessState],
    ) -> Result<(), ProcessError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(ProcessError::InvalidTransition {
            name: self.name,
            transition,
            state: self.state,
        })
    }

    fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        signal::kill(self.pid, signal).map_err(|source| ProcessError::Signal {
            name: self.name,
            signal,
            source,
        })
    }

    fn resume(&mut self, now: Ticks) -> Result<(), ProcessError> {
        self.send_tick(now)?;
        self.signal(Signal::SIGCONT)?;
        self.expect_ack(now)?;
        self.state = ProcessState::Running;
        Ok(())
    }

    fn wait_stopped(&mut self) -> Result<(), ProcessError> {
        loop {
            match wait::waitpid(self.pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Stopped(..)) => return Ok(()),
                Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) => {
                    // Already reaped, the pid is no longer ours to kill
                    self.state = ProcessState::Terminated;
                    return Err(ProcessError::ExitedEarly { name: self.name });
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(ProcessError::Wait {
                        name: self.name,
                        source,
                    });
                }
            }
        }
    }

    /// Reads until 64 bytes or EOF. Short, empty or failed reads still
    /// produce an output.
    fn read_output(&mut self) -> WorkerOutput {
        let mut buf = [0; OUTPUT_LEN];
        let mut len = 0;
        if let Some(stdout) = self.child.stdout.as_mut() {
            while len < OUTPUT_LEN {
                match stdout.read(&mut buf[len..]) {
                    Ok(0) => break,
                    Ok(n) => len += n,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!("reading output of P{} failed: {err}", self.name);
                        break;
                    }
                }
            }
        }
        if len < OUTPUT_LEN {
            warn!("P{} produced {len} of {OUTPUT_LEN} output bytes", self.name);
        }
        WorkerOutput::from_bytes(&buf[..len])
    }

    /// Closes both pipes and waits for the child to exit.
    fn reap(&mut self) -> Result<(), ProcessError> {
        self.child.stdin.take();
        self.child.stdout.take();
        let status = self.child.wait().map_err(|source| ProcessError::Reap {
            name: self.name,
            source,
        })?;
        self.state = ProcessState::Terminated;
        debug!("P{} exited with {status}", self.name);
        Ok(())
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        if self.state != ProcessState::Terminated {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
