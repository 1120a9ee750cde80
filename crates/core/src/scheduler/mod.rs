//! Scheduler / rules engine: tick loop, cadence, auto-grab, download polls.

pub mod cadence;
mod runner;
mod types;

pub use runner::Scheduler;
pub use types::*;
