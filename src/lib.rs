pub mod awaiters;
pub mod core;
pub mod orchestration;
pub mod registry;
pub mod security;
pub mod validation;

pub use awaiters::{AwaiterKind, AwaiterSelection};
pub use crate::core::*;
pub use orchestration::{AwaitReport, AwaiterSummary, BatchAwaiter, WorkerStatus};
pub use registry::{HttpRegistryClient, HttpRegistryClientBuilder};
pub use validation::IdentifierParser;
