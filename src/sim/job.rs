use crate::core::state::{Ticks, WorkloadName};

/// One line of the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: WorkloadName,
    pub arrival_time: Ticks,
    pub service_time: Ticks,
    pub memory_size: u32,
}
