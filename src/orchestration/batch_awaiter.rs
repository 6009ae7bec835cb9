//! Batch Awaiter - Runs every selected awaiter against one registry
//!
//! Features:
//! - One tokio task per awaiter, all sharing a single deadline
//! - Workers never cancel each other; a failing worker only affects its own summary
//! - Leftovers of every worker are unioned into one report

use crate::awaiters::AwaiterKind;
use crate::core::error::AwaitError;
use crate::core::package::PackageIdentifier;
use crate::core::retry::{AwaiterOutcome, AwaiterState, Deadline, RetryManager};
use crate::core::traits::{Awaiter, RegistryClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info};

/// How a single worker ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Success,
    TimedOut,
    /// Gave up early (unsupported facet or panic)
    Aborted,
}

impl From<AwaiterState> for WorkerStatus {
    fn from(state: AwaiterState) -> Self {
        match state {
            AwaiterState::Success => WorkerStatus::Success,
            AwaiterState::TimedOut => WorkerStatus::TimedOut,
        }
    }
}

/// Per-awaiter line of an [`AwaitReport`]
#[derive(Debug, Clone, Serialize)]
pub struct AwaiterSummary {
    pub awaiter: &'static str,
    pub status: WorkerStatus,
    /// Identifiers this awaiter never confirmed
    pub missing: usize,
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AwaiterSummary {
    fn from_outcome(outcome: &AwaiterOutcome) -> Self {
        Self {
            awaiter: outcome.awaiter,
            status: outcome.state.into(),
            missing: outcome.missing.len(),
            iterations: outcome.iterations,
            error: None,
        }
    }
}

/// Result of awaiting a set of gems
#[derive(Debug, Clone, Serialize)]
pub struct AwaitReport {
    /// True when every awaiter confirmed every identifier
    pub success: bool,

    /// Union of all leftovers, sorted and de-duplicated
    pub missing: Vec<PackageIdentifier>,

    pub elapsed_secs: f64,

    pub started_at: DateTime<Utc>,

    /// One entry per awaiter, in launch order
    pub awaiters: Vec<AwaiterSummary>,
}

impl AwaitReport {
    pub fn missing_full_names(&self) -> Vec<String> {
        self.missing.iter().map(PackageIdentifier::full_name).collect()
    }
}

/// BatchAwaiter - Launches awaiters concurrently and aggregates their leftovers
pub struct BatchAwaiter {
    client: Arc<dyn RegistryClient>,
    retry: RetryManager,
}

impl BatchAwaiter {
    /// Create a new BatchAwaiter
    ///
    /// # Arguments
    ///
    /// * `client` - Registry client shared by every worker
    /// * `retry` - Retry loop settings shared by every worker
    pub fn new(client: Arc<dyn RegistryClient>, retry: RetryManager) -> Self {
        Self { client, retry }
    }

    /// Await `identifiers` with every awaiter in `awaiters`
    ///
    /// All workers share `deadline`. Workers are joined in the given order and
    /// a worker that aborts contributes its whole initial set as leftovers.
    /// Running out of time is reported through [`AwaitReport::success`], not
    /// as an error.
    pub async fn await_all(
        &self,
        identifiers: &[PackageIdentifier],
        awaiters: &[AwaiterKind],
        deadline: Deadline,
    ) -> Result<AwaitReport, AwaitError> {
        if identifiers.is_empty() {
            return Err(AwaitError::NoIdentifiers);
        }
        if awaiters.is_empty() {
            return Err(AwaitError::NoAwaitersSelected);
        }

        let started_at = Utc::now();
        let started = Instant::now();
        let shared: Arc<[PackageIdentifier]> = identifiers.into();

        let mut tasks = Vec::with_capacity(awaiters.len());
        for &kind in awaiters {
            let client = Arc::clone(&self.client);
            let retry = self.retry.clone();
            let identifiers = Arc::clone(&shared);

            let task = tokio::spawn(async move {
                retry
                    .run(&kind, &identifiers, client.as_ref(), deadline)
                    .await
            });

            tasks.push((kind, task));
        }

        let mut leftovers: BTreeSet<PackageIdentifier> = BTreeSet::new();
        let mut summaries = Vec::with_capacity(tasks.len());

        for (kind, task) in tasks {
            let summary = match task.await {
                Ok(Ok(outcome)) => {
                    let summary = AwaiterSummary::from_outcome(&outcome);
                    leftovers.extend(outcome.missing.into_identifiers());
                    summary
                }
                Ok(Err(error)) => Self::aborted(kind, &shared, error, &mut leftovers),
                Err(join_error) => {
                    let error = AwaitError::WorkerPanicked {
                        awaiter: kind.as_str(),
                        message: join_error.to_string(),
                    };
                    Self::aborted(kind, &shared, error, &mut leftovers)
                }
            };
            summaries.push(summary);
        }

        let elapsed = started.elapsed();
        let report = AwaitReport {
            success: leftovers.is_empty(),
            missing: leftovers.into_iter().collect(),
            elapsed_secs: elapsed.as_secs_f64(),
            started_at,
            awaiters: summaries,
        };

        if report.success {
            let names: Vec<String> = identifiers.iter().map(PackageIdentifier::full_name).collect();
            info!("Found {}", names.join(", "));
        } else {
            error!(
                "Timed out after {:.2}s. Check that {} are published.",
                report.elapsed_secs,
                report.missing_full_names().join(", ")
            );
        }

        Ok(report)
    }

    /// Summary for a worker that never produced an outcome
    fn aborted(
        kind: AwaiterKind,
        identifiers: &[PackageIdentifier],
        error: AwaitError,
        leftovers: &mut BTreeSet<PackageIdentifier>,
    ) -> AwaiterSummary {
        error!(awaiter = kind.as_str(), error_code = error.code(), "{}", error);

        let initial = kind.initial_missing(identifiers);
        let missing = initial.len();
        leftovers.extend(initial.into_identifiers());

        AwaiterSummary {
            awaiter: kind.as_str(),
            status: WorkerStatus::Aborted,
            missing,
            iterations: 0,
            error: Some(error.to_string()),
        }
    }
}
