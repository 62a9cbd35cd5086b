pub mod rr;
pub mod sjf;

use crate::core::state::{SchedCtx, WorkloadId};
pub use rr::RoundRobinScheduler;
pub use sjf::SjfScheduler;

pub trait Scheduler {
    fn init(ctx: &mut SchedCtx) -> Self;

    /// Chooses the workload served this tick and places it in the running
    /// slot. It is no longer in the ready queue afterwards.
    fn pick_next(&mut self, ctx: &mut SchedCtx) -> Option<WorkloadId>;

    /// Whether a workload with work left goes back to the tail of the ready
    /// queue when its quantum ends, instead of keeping the CPU.
    fn preempts_on_expiry(&self) -> bool;
}
