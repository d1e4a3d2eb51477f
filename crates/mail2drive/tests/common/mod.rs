//! Shared test utilities for mail2drive integration tests.
//!
//! This module provides:
//! - Builders for rules stored directly through the repository layer
//! - Fake mailbox, storage, renderer and credential collaborators
//! - `TestHarness` wiring them into a `RuleRunner` over an in-memory database

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
