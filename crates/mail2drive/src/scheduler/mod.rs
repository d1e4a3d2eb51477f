//! Batch execution of enabled rules and the periodic loop that drives it.

pub mod batch;
pub mod interval;

pub use batch::{BatchEntry, BatchReport, BatchResult, BatchTrigger, DEFAULT_STALE_RUN_AFTER_SECS};
pub use interval::PeriodicScheduler;
