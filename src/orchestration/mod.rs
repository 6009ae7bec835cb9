//! Orchestration layer for awaiting published gems
//!
//! Runs the selected awaiters concurrently against one registry and
//! aggregates their leftovers into a single report.

pub mod batch_awaiter;

pub use batch_awaiter::{AwaitReport, AwaiterSummary, BatchAwaiter, WorkerStatus};
