use super::{SchedCtx, Scheduler, WorkloadId};

/// Serves the head of the ready queue for one quantum, then rotates it to
/// the tail.
pub struct RoundRobinScheduler;

impl Scheduler for RoundRobinScheduler {
    fn init(ctx: &mut SchedCtx) -> Self {
        // Stable, so equal arrivals keep input order
        let workloads = &ctx.workloads;
        ctx.pending.sort_by_key(|id| workloads[id].arrival_time);
        Self
    }

    fn pick_next(&mut self, ctx: &mut SchedCtx) -> Option<WorkloadId> {
        let id = ctx.ready.pop_front()?;
        ctx.running = Some(id);
        Some(id)
    }

    fn preempts_on_expiry(&self) -> bool {
        true
    }
}
