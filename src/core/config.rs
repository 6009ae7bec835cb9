//! Configuration structures and types for gem-await
//!
//! This module provides type-safe configuration management with serde support.
//! Every field is optional so partial files can be layered on top of each
//! other; the accessor methods apply the defaults.

use crate::core::retry::RetryOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Registry polled when no source is configured
pub const DEFAULT_SOURCE: &str = "https://rubygems.org/";

/// Overall deadline in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Backoff step in milliseconds
pub const DEFAULT_STEP_MILLIS: u64 = 1000;

/// Per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AwaitConfig {
    /// Registry base URL; may contain `${VAR}` references
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Overall deadline in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub awaiters: Option<AwaitersConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff: Option<BackoffConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,
}

/// Awaiter selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AwaitersConfig {
    /// Replaces the default skip list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<Vec<String>>,

    /// Run only these awaiters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<String>>,
}

/// Linear backoff between polls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Delay added per iteration, in milliseconds (default: 1000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_millis: Option<u64>,

    /// Cap for a single delay, in seconds (default: uncapped)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<u64>,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Per-request timeout in seconds (default: 30)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,

    /// Send `Cache-Control: no-cache` (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass_cache: Option<bool>,

    /// Where downloaded `.gem` files are written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl AwaitConfig {
    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(DEFAULT_SOURCE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn skip_list(&self) -> Option<&[String]> {
        self.awaiters.as_ref()?.skip.as_deref()
    }

    pub fn only_list(&self) -> &[String] {
        self.awaiters
            .as_ref()
            .and_then(|a| a.only.as_deref())
            .unwrap_or(&[])
    }

    pub fn retry_options(&self) -> RetryOptions {
        let backoff = self.backoff.as_ref();
        RetryOptions {
            delay_step: Duration::from_millis(
                backoff
                    .and_then(|b| b.step_millis)
                    .unwrap_or(DEFAULT_STEP_MILLIS),
            ),
            max_delay: backoff
                .and_then(|b| b.max_delay)
                .map(Duration::from_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.http
                .as_ref()
                .and_then(|h| h.request_timeout)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn bypass_cache(&self) -> bool {
        self.http
            .as_ref()
            .and_then(|h| h.bypass_cache)
            .unwrap_or(true)
    }

    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.http.as_ref().and_then(|h| h.cache_dir.clone())
    }
}
