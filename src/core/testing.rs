use slotmap::SecondaryMap;

use super::{
    process::{ProcessControl, ProcessError, WorkerOutput},
    state::{Ticks, WorkloadId, WorkloadName},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Dispatch(WorkloadName, Ticks),
    Resume(WorkloadName, Ticks),
    Preempt(WorkloadName, Ticks),
    Terminate(WorkloadName, Ticks),
}

/// Records transitions instead of spawning workers.
#[derive(Debug, Default)]
pub struct RecordingControl {
    pub calls: Vec<Call>,
    names: SecondaryMap<WorkloadId, WorkloadName>,
}

impl RecordingControl {
    fn name(&self, id: WorkloadId) -> Result<WorkloadName, ProcessError> {
        self.names
            .get(id)
            .copied()
            .ok_or(ProcessError::NotResident(id))
    }
}

impl ProcessControl for RecordingControl {
    fn dispatch(
        &mut self,
        id: WorkloadId,
        name: WorkloadName,
        now: Ticks,
    ) -> Result<(), ProcessError> {
        if self.names.insert(id, name).is_some() {
            return Err(ProcessError::AlreadyDispatched { name });
        }
        self.calls.push(Call::Dispatch(name, now));
        Ok(())
    }

    fn resume(&mut self, id: WorkloadId, now: Ticks) -> Result<(), ProcessError> {
        let name = self.name(id)?;
        self.calls.push(Call::Resume(name, now));
        Ok(())
    }

    fn preempt(&mut self, id: WorkloadId, now: Ticks) -> Result<(), ProcessError> {
        let name = self.name(id)?;
        self.calls.push(Call::Preempt(name, now));
        Ok(())
    }

    fn terminate(&mut self, id: WorkloadId, now: Ticks) -> Result<WorkerOutput, ProcessError> {
        let name = self.names.remove(id).ok_or(ProcessError::NotResident(id))?;
        self.calls.push(Call::Terminate(name, now));
        Ok(WorkerOutput::from_bytes(format!("P{name}@{now}").as_bytes()))
    }
}
