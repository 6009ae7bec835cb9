//! Deadline-bounded retry loop with linear backoff
//!
//! This module provides the polling engine shared by every awaiter: it keeps
//! calling [`Awaiter::poll`] until the working set is empty or the deadline
//! (padded by the next backoff delay) has passed.

use crate::core::error::{AwaitError, ClientError};
use crate::core::package::{MissingSet, PackageIdentifier};
use crate::core::traits::{Awaiter, RegistryClient};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Absolute point in time after which awaiters stop retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Whether `now + padding` is already past the deadline
    pub fn expired(&self, padding: Duration) -> bool {
        Instant::now() + padding > self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Options for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Delay added per iteration (iteration `i` sleeps `i * delay_step`)
    pub delay_step: Duration,
    /// Upper bound for a single delay, uncapped when `None`
    pub max_delay: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            delay_step: Duration::from_secs(1),
            max_delay: None,
        }
    }
}

impl RetryOptions {
    /// Backoff delay before iteration `iteration` (0-based)
    ///
    /// The same value pads the deadline check, so an awaiter never starts a
    /// sleep that would end past the deadline.
    ///
    /// # Examples
    ///
    /// ```
    /// use gem_await::core::RetryOptions;
    /// use std::time::Duration;
    ///
    /// let options = RetryOptions::default();
    /// assert_eq!(options.delay_for(0), Duration::ZERO);
    /// assert_eq!(options.delay_for(3), Duration::from_secs(3));
    /// ```
    pub fn delay_for(&self, iteration: u32) -> Duration {
        let delay = self.delay_step.saturating_mul(iteration);
        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }
}

/// Terminal state of an awaiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwaiterState {
    Success,
    TimedOut,
}

/// What a finished awaiter hands back to the aggregator
#[derive(Debug, Clone)]
pub struct AwaiterOutcome {
    pub awaiter: &'static str,
    pub state: AwaiterState,
    /// Identifiers never confirmed; empty on success
    pub missing: MissingSet,
    /// Number of completed poll iterations
    pub iterations: u32,
    pub elapsed: Duration,
}

impl AwaiterOutcome {
    pub fn is_success(&self) -> bool {
        self.state == AwaiterState::Success
    }
}

/// Runs awaiters until their working set is empty or the deadline passes
///
/// # Examples
///
/// ```no_run
/// use gem_await::awaiters::AwaiterKind;
/// use gem_await::core::{Deadline, PackageIdentifier, RetryManager, RetryOptions};
/// use gem_await::registry::HttpRegistryClient;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = HttpRegistryClient::builder("https://rubygems.org/").build()?;
///     let manager = RetryManager::new(RetryOptions::default());
///     let gems = vec![PackageIdentifier::new("rack", "3.0.0", None)];
///
///     let outcome = manager
///         .run(&AwaiterKind::Versions, &gems, &client, Deadline::after(Duration::from_secs(60)))
///         .await?;
///     assert!(outcome.is_success());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryManager {
    options: RetryOptions,
}

impl RetryManager {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Poll `awaiter` until everything is confirmed or `deadline` passes
    ///
    /// Transient client errors are logged and retried on the next iteration.
    /// Only an unsupported registry facet aborts the run.
    pub async fn run<A>(
        &self,
        awaiter: &A,
        identifiers: &[PackageIdentifier],
        client: &dyn RegistryClient,
        deadline: Deadline,
    ) -> Result<AwaiterOutcome, AwaitError>
    where
        A: Awaiter + ?Sized,
    {
        let span = info_span!("awaiter", name = awaiter.name());
        self.run_loop(awaiter, identifiers, client, deadline)
            .instrument(span)
            .await
    }

    async fn run_loop<A>(
        &self,
        awaiter: &A,
        identifiers: &[PackageIdentifier],
        client: &dyn RegistryClient,
        deadline: Deadline,
    ) -> Result<AwaiterOutcome, AwaitError>
    where
        A: Awaiter + ?Sized,
    {
        let started = Instant::now();
        let mut missing = awaiter.initial_missing(identifiers);
        let mut iteration: u32 = 0;

        let state = loop {
            if missing.is_empty() {
                break AwaiterState::Success;
            }

            let delay = self.options.delay_for(iteration);
            if deadline.expired(delay) {
                break AwaiterState::TimedOut;
            }

            if !delay.is_zero() {
                sleep(delay).await;
            }
            let iteration_started = Instant::now();

            info!("missing: {}", missing);
            match awaiter.poll(&mut missing, client).await {
                Ok(()) => {}
                Err(ClientError::Unsupported { facet }) => {
                    error!(error_kind = "Unsupported", "{} is not supported, giving up", facet);
                    return Err(AwaitError::NotImplemented {
                        awaiter: awaiter.name(),
                        facet,
                    });
                }
                Err(error) => warn!(error_kind = error.kind(), "{}", error),
            }

            iteration += 1;
            debug!(
                "#{} {:.2}s, {:.0}s left",
                iteration,
                iteration_started.elapsed().as_secs_f64(),
                deadline.remaining().as_secs_f64()
            );
        };

        match state {
            AwaiterState::Success => info!("all found!"),
            AwaiterState::TimedOut => error!("missing {}", missing),
        }

        Ok(AwaiterOutcome {
            awaiter: awaiter.name(),
            state,
            missing,
            iterations: iteration,
            elapsed: started.elapsed(),
        })
    }
}
