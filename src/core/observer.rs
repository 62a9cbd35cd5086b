use rustc_hash::FxHashSet;

use super::state::{ProcessState, SchedCtx};

#[derive(Debug)]
pub struct Observer {
    step: u64,
    finished: usize,
}

impl Observer {
    pub fn new() -> Self {
        Self {
            step: 0,
            finished: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn observe(&mut self, ctx: &SchedCtx) {
        self.step += 1;

        let mut seen = FxHashSet::default();
        let queues = [
            ("pending", &ctx.pending),
            ("backlog", &ctx.backlog),
            ("ready", &ctx.ready),
            ("finished", &ctx.finished),
        ];
        for (label, queue) in queues {
            for id in queue.iter() {
                debug_assert!(
                    seen.insert(id),
                    "Workload {id:?} appears in {label} and another queue"
                );
            }
        }
        if let Some(running) = ctx.running {
            debug_assert!(
                seen.insert(running),
                "Running workload {running:?} is also queued"
            );
        }
        debug_assert_eq!(
            seen.len(),
            ctx.workloads.len(),
            "Workloads lost or duplicated across queues"
        );

        debug_assert!(
            ctx.finished.size() >= self.finished,
            "Finished queue shrank"
        );
        self.finished = ctx.finished.size();

        for id in ctx.finished.iter() {
            let workload = ctx.workload(id);
            debug_assert_eq!(workload.remaining, 0, "P{} finished with work left", workload.name);
            debug_assert_eq!(workload.state, ProcessState::Terminated);
            debug_assert!(workload.turnaround_time.is_some());
            debug_assert!(workload.memory_address.is_none());
        }

        if let Some(memory) = &ctx.memory {
            let mut last_end: Option<u32> = None;
            for (_, block) in memory.free_blocks() {
                debug_assert_eq!(block.end - block.start + 1, block.size);
                if let Some(last_end) = last_end {
                    debug_assert!(
                        last_end + 1 < block.start,
                        "Free blocks ending at {last_end} and starting at {} are not coalesced",
                        block.start
                    );
                }
                last_end = Some(block.end);
            }

            let allocated: u32 = ctx
                .workloads
                .values()
                .filter(|w| w.memory_address.is_some())
                .map(|w| w.memory_size)
                .sum();
            debug_assert_eq!(
                memory.free_space() + allocated,
                memory.capacity(),
                "Free and allocated memory do not add up"
            );
        }
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}
