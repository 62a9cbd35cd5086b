pub mod config;
pub mod core;
pub mod scheduler;
pub mod sim;

pub use config::{MemoryStrategy, Policy, SimConfig};
pub use crate::core::{ProcessController, SchedEvent};
pub use scheduler::Scheduler;
pub use sim::{Job, Report, Sim};
