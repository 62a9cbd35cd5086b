use super::{SchedCtx, Scheduler, WorkloadId};

/// Shortest remaining time first, never interrupted once selected.
pub struct SjfScheduler;

impl Scheduler for SjfScheduler {
    fn init(_ctx: &mut SchedCtx) -> Self {
        Self
    }

    fn pick_next(&mut self, ctx: &mut SchedCtx) -> Option<WorkloadId> {
        if let Some(running) = ctx.running {
            return Some(running);
        }

        // Names are unique, so this is a total order
        let workloads = &ctx.workloads;
        let id = ctx.ready.remove_min_by_key(|id| {
            let w = &workloads[id];
            (w.remaining, w.arrival_time, w.name)
        })?;
        ctx.running = Some(id);
        Some(id)
    }

    fn preempts_on_expiry(&self) -> bool {
        false
    }
}
