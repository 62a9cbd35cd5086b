use log::debug;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use super::{
    event::SchedEvent,
    memory::{Addr, MemoryAllocator},
    process::WorkerOutput,
    queue::Queue,
};

pub type Ticks = u64;
pub type WorkloadName = u32;
new_key_type! {
    pub struct WorkloadId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopped,
    Terminated,
}

#[derive(Debug)]
pub struct Workload {
    pub id: WorkloadId,
    pub name: WorkloadName,
    pub arrival_time: Ticks,
    pub service_time: Ticks,
    pub remaining: Ticks,
    pub memory_size: u32,
    // Only meaningful while resident under best-fit
    pub memory_address: Option<Addr>,
    pub turnaround_time: Option<Ticks>,
    pub state: ProcessState,
    pub output: Option<WorkerOutput>,
}

impl Workload {
    /// Turnaround divided by the original service time.
    pub fn overhead(&self) -> Option<f64> {
        self.turnaround_time
            .map(|turnaround| turnaround as f64 / self.service_time as f64)
    }
}

#[derive(Debug)]
pub struct SchedCtx {
    pub now: Ticks,
    pub quantum: Ticks,
    pub workloads: SlotMap<WorkloadId, Workload>,
    pub by_name: FxHashMap<WorkloadName, WorkloadId>,

    // Not yet arrived
    pub pending: Queue,
    // Arrived, waiting for memory
    pub backlog: Queue,
    pub ready: Queue,
    pub finished: Queue,

    pub running: Option<WorkloadId>,
    // Served on the previous tick; suppresses repeated RUNNING events
    pub last_served: Option<WorkloadId>,

    // None means the infinite memory strategy
    pub memory: Option<MemoryAllocator>,
}

impl SchedCtx {
    pub fn new(quantum: Ticks, memory: Option<MemoryAllocator>) -> Self {
        assert!(quantum > 0, "Quantum must be positive");
        Self {
            now: 0,
            quantum,
            workloads: SlotMap::with_key(),
            by_name: FxHashMap::default(),
            pending: Queue::new(),
            backlog: Queue::new(),
            ready: Queue::new(),
            finished: Queue::new(),
            running: None,
            last_served: None,
            memory,
        }
    }

    /// Registers a workload and appends it to the pending batch.
    pub fn create_workload(
        &mut self,
        name: WorkloadName,
        arrival_time: Ticks,
        service_time: Ticks,
        memory_size: u32,
    ) -> WorkloadId {
        debug_assert!(
            !self.by_name.contains_key(&name),
            "Workload P{name} registered twice"
        );

        let id = self.workloads.insert_with_key(|id| Workload {
            id,
            name,
            arrival_time,
            service_time,
            remaining: service_time,
            memory_size,
            memory_address: None,
            turnaround_time: None,
            state: ProcessState::NotStarted,
            output: None,
        });
        self.by_name.insert(name, id);
        self.pending.append(id);
        id
    }

    pub fn workload(&self, id: WorkloadId) -> &Workload {
        &self.workloads[id]
    }

    pub fn workload_mut(&mut self, id: WorkloadId) -> &mut Workload {
        &mut self.workloads[id]
    }

    pub fn workload_by_name(&self, name: WorkloadName) -> Option<&Workload> {
        self.by_name.get(&name).map(|&id| self.workload(id))
    }

    /// Moves arrived workloads into the backlog, then admits backlog
    /// entries into the ready queue in order, subject to memory.
    pub fn admit(&mut self, now: Ticks) -> Vec<SchedEvent> {
        let workloads = &self.workloads;
        for id in self
            .pending
            .take_where(|id| workloads[id].arrival_time <= now)
        {
            self.backlog.append(id);
        }

        let mut events = Vec::new();
        let admitted = self.backlog.take_where(|id| {
            let workload = &mut self.workloads[id];
            let assigned_at = match self.memory.as_mut() {
                None => None,
                Some(memory) => match memory.try_allocate(workload.memory_size) {
                    Some(addr) => Some(addr),
                    None => return false,
                },
            };
            workload.memory_address = assigned_at;
            debug!("t={now} admitted P{} at {assigned_at:?}", workload.name);
            events.push(SchedEvent::Ready {
                time: now,
                name: workload.name,
                assigned_at,
            });
            true
        });

        for id in admitted {
            self.ready.append(id);
        }
        events
    }

    pub fn release_memory(&mut self, id: WorkloadId) {
        let workload = &mut self.workloads[id];
        if let (Some(memory), Some(addr)) = (self.memory.as_mut(), workload.memory_address.take()) {
            memory.release(addr, workload.memory_size);
        }
    }

    /// Workloads that have arrived and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.backlog.size() + self.ready.size() + usize::from(self.running.is_some())
    }

    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
            && self.backlog.is_empty()
            && self.ready.is_empty()
            && self.running.is_none()
    }

    pub fn finished_workloads(&self) -> impl Iterator<Item = &Workload> + '_ {
        self.finished.iter().map(|id| self.workload(id))
    }
}
