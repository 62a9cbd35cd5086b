pub mod driver;
pub mod event;
pub mod memory;
pub mod observer;
pub mod process;
pub mod queue;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use driver::SchedCore;
pub use event::SchedEvent;
pub use memory::{Addr, MEMORY_SIZE, MemoryAllocator};
pub use process::{ProcessControl, ProcessController, ProcessError, WorkerOutput};
pub use queue::{Queue, QueueError};
pub use state::{ProcessState, SchedCtx, Ticks, Workload, WorkloadId, WorkloadName};
