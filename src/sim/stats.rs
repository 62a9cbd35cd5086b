use std::fmt;

use average::{Estimate, Max, Mean};

use crate::core::state::{Ticks, Workload};

/// End-of-run summary over the finished workloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub avg_turnaround: u64,
    pub max_overhead: f64,
    pub avg_overhead: f64,
    pub makespan: Ticks,
}

impl Report {
    pub fn collect<'a>(finished: impl IntoIterator<Item = &'a Workload>, makespan: Ticks) -> Self {
        let (mut turnaround, mut count) = (0u64, 0u64);
        let mut overhead = Mean::new();
        let mut max_overhead = Max::new();

        for workload in finished {
            let (Some(t), Some(o)) = (workload.turnaround_time, workload.overhead()) else {
                continue;
            };
            turnaround += t;
            count += 1;
            overhead.add(o);
            max_overhead.add(o);
        }

        if count == 0 {
            return Self {
                avg_turnaround: 0,
                max_overhead: 0.0,
                avg_overhead: 0.0,
                makespan,
            };
        }

        Self {
            avg_turnaround: turnaround.div_ceil(count),
            max_overhead: max_overhead.estimate(),
            avg_overhead: overhead.estimate(),
            makespan,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Turnaround time {}", self.avg_turnaround)?;
        writeln!(
            f,
            "Time overhead {:.2} {:.2}",
            self.max_overhead, self.avg_overhead
        )?;
        write!(f, "Makespan {}", self.makespan)
    }
}
