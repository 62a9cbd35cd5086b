use log::debug;

use super::{
    event::SchedEvent,
    observer::Observer,
    process::{ProcessControl, ProcessError},
    state::{ProcessState, SchedCtx, Ticks, WorkloadId},
};
use crate::scheduler::Scheduler;

pub struct SchedCore<S: Scheduler, P: ProcessControl> {
    pub ctx: SchedCtx,
    pub scheduler: S,
    pub control: P,
    observer: Observer,
}

impl<S: Scheduler, P: ProcessControl> SchedCore<S, P> {
    pub fn new(mut ctx: SchedCtx, control: P) -> Self {
        let scheduler = S::init(&mut ctx);
        Self {
            ctx,
            scheduler,
            control,
            observer: Observer::new(),
        }
    }

    /// Runs the quantum starting at `now`.
    pub fn tick(&mut self, now: Ticks) -> Result<Vec<SchedEvent>, ProcessError> {
        self.ctx.now = now;
        let quantum = self.ctx.quantum;
        let mut events = self.ctx.admit(now);

        if let Some(id) = self.scheduler.pick_next(&mut self.ctx) {
            let workload = self.ctx.workload(id);
            let (name, remaining) = (workload.name, workload.remaining);
            if self.ctx.last_served != Some(id) {
                events.push(SchedEvent::Running {
                    time: now,
                    name,
                    remaining,
                });
            }
            self.ctx.last_served = Some(id);

            if remaining > quantum {
                self.run_slice(id, now)?;
                self.ctx.workload_mut(id).remaining -= quantum;
                if self.scheduler.preempts_on_expiry() {
                    self.requeue(id, now + quantum, &mut events)?;
                }
            } else {
                self.finish(id, now, &mut events)?;
            }
        }

        self.observer.observe(&self.ctx);
        Ok(events)
    }

    // Starts the worker on first service, continues it afterwards
    fn run_slice(&mut self, id: WorkloadId, now: Ticks) -> Result<(), ProcessError> {
        let workload = self.ctx.workload(id);
        match workload.state {
            ProcessState::NotStarted => self.control.dispatch(id, workload.name, now)?,
            ProcessState::Running | ProcessState::Stopped => self.control.resume(id, now)?,
            ProcessState::Terminated => return Err(ProcessError::NotResident(id)),
        }
        self.ctx.workload_mut(id).state = ProcessState::Running;
        Ok(())
    }

    // Quantum expired with work left: back to the tail, behind anything
    // that arrived during the quantum
    fn requeue(
        &mut self,
        id: WorkloadId,
        at: Ticks,
        events: &mut Vec<SchedEvent>,
    ) -> Result<(), ProcessError> {
        self.ctx.running = None;
        events.extend(self.ctx.admit(at));
        self.ctx.ready.append(id);

        // A lone workload keeps running; stopping it would only be resumed next tick
        if self.ctx.ready.size() > 1 {
            self.control.preempt(id, at)?;
            self.ctx.workload_mut(id).state = ProcessState::Stopped;
        }
        Ok(())
    }

    fn finish(
        &mut self,
        id: WorkloadId,
        now: Ticks,
        events: &mut Vec<SchedEvent>,
    ) -> Result<(), ProcessError> {
        let finish_time = now + self.ctx.quantum;
        self.run_slice(id, now)?;

        let workload = self.ctx.workload_mut(id);
        workload.remaining = 0;
        workload.turnaround_time = Some(finish_time - workload.arrival_time);
        let name = workload.name;

        self.ctx.release_memory(id);
        self.ctx.running = None;
        self.ctx.finished.append(id);
        events.push(SchedEvent::Finished {
            time: finish_time,
            name,
            proc_remaining: self.ctx.backlog.size() + self.ctx.ready.size(),
        });

        let output = self.control.terminate(id, finish_time)?;
        let workload = self.ctx.workload_mut(id);
        workload.state = ProcessState::Terminated;
        workload.output = Some(output);
        debug!("t={finish_time} P{name} finished, output {output}");
        events.push(SchedEvent::ProcessFinished {
            time: finish_time,
            name,
            output,
        });
        Ok(())
    }

    pub fn now(&self) -> Ticks {
        self.ctx.now
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }
}
