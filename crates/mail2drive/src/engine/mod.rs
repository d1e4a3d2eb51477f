//! Per-rule run protocol: claim, fetch, render, upload, record.

pub mod config;
pub mod context;
pub mod error;
pub mod observer;
pub mod runner;

pub use config::{ClaimPolicy, EngineConfig, DEFAULT_MAX_RESULTS};
pub use context::{RunContext, RunOutcome};
pub use error::{EngineError, RunError, RunStep};
pub use observer::{NoopObserver, RunEvent, RunObserver, TracingObserver};
pub use runner::RuleRunner;
