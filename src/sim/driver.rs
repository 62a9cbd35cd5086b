use log::info;
use rustc_hash::FxHashSet;
use thiserror::Error;

use super::{job::Job, stats::Report};
use crate::{
    config::MemoryStrategy,
    core::{
        driver::SchedCore,
        event::SchedEvent,
        memory::{MEMORY_SIZE, MemoryAllocator},
        process::{ProcessControl, ProcessError},
        state::{SchedCtx, Ticks, WorkloadName},
    },
    scheduler::Scheduler,
};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("quantum must be positive")]
    ZeroQuantum,
    #[error("workload P{0} appears more than once")]
    DuplicateName(WorkloadName),
    #[error("workload P{name} has zero {field}")]
    Empty {
        name: WorkloadName,
        field: &'static str,
    },
    #[error("workload P{name} needs {size} units but memory holds {capacity}")]
    Oversized {
        name: WorkloadName,
        size: u32,
        capacity: u32,
    },
}

pub struct Sim<S: Scheduler, P: ProcessControl> {
    pub core: SchedCore<S, P>,
    tick_index: u64,
    makespan: Ticks,
}

impl<S: Scheduler, P: ProcessControl> Sim<S, P> {
    pub fn new(
        jobs: Vec<Job>,
        quantum: Ticks,
        strategy: MemoryStrategy,
        control: P,
    ) -> Result<Self, SimError> {
        if quantum == 0 {
            return Err(SimError::ZeroQuantum);
        }

        let memory = match strategy {
            MemoryStrategy::Infinite => None,
            MemoryStrategy::BestFit => Some(MemoryAllocator::new(MEMORY_SIZE)),
        };

        let mut names = FxHashSet::default();
        for job in &jobs {
            if !names.insert(job.name) {
                return Err(SimError::DuplicateName(job.name));
            }
            if job.service_time == 0 {
                return Err(SimError::Empty {
                    name: job.name,
                    field: "service time",
                });
            }
            // Zero-sized requests are never granted
            if job.memory_size == 0 {
                return Err(SimError::Empty {
                    name: job.name,
                    field: "memory size",
                });
            }
            if let Some(memory) = &memory {
                if job.memory_size > memory.capacity() {
                    return Err(SimError::Oversized {
                        name: job.name,
                        size: job.memory_size,
                        capacity: memory.capacity(),
                    });
                }
            }
        }

        let mut ctx = SchedCtx::new(quantum, memory);
        for job in jobs {
            ctx.create_workload(job.name, job.arrival_time, job.service_time, job.memory_size);
        }

        Ok(Self {
            core: SchedCore::new(ctx, control),
            tick_index: 0,
            makespan: 0,
        })
    }

    pub fn step(&mut self) -> Result<Vec<SchedEvent>, ProcessError> {
        let quantum = self.core.ctx.quantum;
        let now = self.tick_index * quantum;
        let events = self.core.tick(now)?;
        self.tick_index += 1;
        self.makespan = now + quantum;
        Ok(events)
    }

    /// Steps until every workload has finished, handing each event to
    /// `on_event` as it happens.
    pub fn run(&mut self, mut on_event: impl FnMut(&SchedEvent)) -> Result<Report, ProcessError> {
        info!(
            "simulating {} workloads, quantum {}",
            self.core.ctx.workloads.len(),
            self.core.ctx.quantum
        );
        while !self.all_jobs_completed() {
            for event in self.step()? {
                on_event(&event);
            }
        }
        info!("all workloads finished at {}", self.makespan);
        Ok(self.report())
    }

    pub fn all_jobs_completed(&self) -> bool {
        self.core.ctx.is_drained()
    }

    /// End time of the last tick run so far.
    pub fn makespan(&self) -> Ticks {
        self.makespan
    }

    pub fn report(&self) -> Report {
        Report::collect(self.core.ctx.finished_workloads(), self.makespan)
    }
}
