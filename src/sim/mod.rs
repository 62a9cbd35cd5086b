pub mod driver;
pub mod job;
pub mod loader;
pub mod stats;

pub use driver::{Sim, SimError};
pub use job::Job;
pub use loader::{LoadError, load_jobs, parse_jobs};
pub use stats::Report;
