use std::fmt;

use crate::core::{Addr, Ticks, WorkerOutput, WorkloadName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedEvent {
    // Moved into the ready queue; `assigned_at` is None under infinite memory
    Ready {
        time: Ticks,
        name: WorkloadName,
        assigned_at: Option<Addr>,
    },
    Running {
        time: Ticks,
        name: WorkloadName,
        remaining: Ticks,
    },
    Finished {
        time: Ticks,
        name: WorkloadName,
        proc_remaining: usize,
    },
    ProcessFinished {
        time: Ticks,
        name: WorkloadName,
        output: WorkerOutput,
    },
}

impl SchedEvent {
    pub fn time(&self) -> Ticks {
        match *self {
            Self::Ready { time, .. }
            | Self::Running { time, .. }
            | Self::Finished { time, .. }
            | Self::ProcessFinished { time, .. } => time,
        }
    }

    pub fn name(&self) -> WorkloadName {
        match *self {
            Self::Ready { name, .. }
            | Self::Running { name, .. }
            | Self::Finished { name, .. }
            | Self::ProcessFinished { name, .. } => name,
        }
    }
}

impl fmt::Display for SchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready {
                time,
                name,
                assigned_at: Some(addr),
            } => write!(f, "{time},READY,process_name=P{name},assigned_at={addr}"),
            Self::Ready { time, name, .. } => write!(f, "{time},READY,process_name=P{name}"),
            Self::Running {
                time,
                name,
                remaining,
            } => write!(
                f,
                "{time},RUNNING,process_name=P{name},remaining_time={remaining}"
            ),
            Self::Finished {
                time,
                name,
                proc_remaining,
            } => write!(
                f,
                "{time},FINISHED,process_name=P{name},proc_remaining={proc_remaining}"
            ),
            Self::ProcessFinished { time, name, output } => {
                write!(f, "{time},FINISHED-PROCESS,process_name=P{name},sha={output}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_csv_lines() {
        let ready = SchedEvent::Ready {
            time: 3,
            name: 4,
            assigned_at: Some(512),
        };
        assert_eq!(ready.to_string(), "3,READY,process_name=P4,assigned_at=512");

        let running = SchedEvent::Running {
            time: 6,
            name: 4,
            remaining: 10,
        };
        assert_eq!(running.to_string(), "6,RUNNING,process_name=P4,remaining_time=10");

        let finished = SchedEvent::Finished {
            time: 9,
            name: 4,
            proc_remaining: 2,
        };
        assert_eq!(finished.to_string(), "9,FINISHED,process_name=P4,proc_remaining=2");

        let output = SchedEvent::ProcessFinished {
            time: 9,
            name: 4,
            output: WorkerOutput::from_bytes(b"abc"),
        };
        assert_eq!(output.to_string(), "9,FINISHED-PROCESS,process_name=P4,sha=abc");
        assert_eq!((output.time(), output.name()), (9, 4));
    }
}
