//! Error handling for awaiting published packages
//!
//! This module provides the error types with recovery guidance
//! using the thiserror crate for ergonomic error handling.
//!
//! [`ClientError`] covers a single registry query. Apart from
//! [`ClientError::Unsupported`] these are transient: the retry engine logs them
//! and keeps polling. [`AwaitError`] covers everything that aborts an
//! invocation or a single awaiter.

use thiserror::Error;

/// Failure of a single registry client call
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{uri} responded with HTTP {status}")]
    Status { uri: String, status: u16 },

    #[error("access to {uri} was forbidden")]
    Forbidden { uri: String },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{facet} is not supported by this registry client")]
    Unsupported { facet: &'static str },
}

impl ClientError {
    /// Whether the next iteration may succeed where this one failed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Unsupported { .. })
    }

    /// Short tag used when logging the error
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "HttpError",
            Self::Status { .. } => "BadStatus",
            Self::Forbidden { .. } => "AuthenticationForbidden",
            Self::Parse { .. } => "ParseError",
            Self::Io(_) => "IoError",
            Self::Unsupported { .. } => "Unsupported",
        }
    }
}

/// Main error type for await operations
#[derive(Error, Debug)]
pub enum AwaitError {
    // Input errors
    #[error("Please specify a name:version[:platform], given {input:?}")]
    InvalidIdentifier { input: String },

    #[error("Please specify a valid version, given {input:?}")]
    InvalidVersion { input: String },

    #[error("Please specify at least one gem to await")]
    NoIdentifiers,

    #[error("Unknown awaiter {name:?}")]
    UnknownAwaiter { name: String },

    #[error("No awaiters selected")]
    NoAwaitersSelected,

    // Worker errors
    #[error("[{awaiter}] {facet} is not implemented by the registry client")]
    NotImplemented {
        awaiter: &'static str,
        facet: &'static str,
    },

    #[error("[{awaiter}] worker panicked: {message}")]
    WorkerPanicked {
        awaiter: &'static str,
        message: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl AwaitError {
    /// Check if this error is recoverable by the user re-running with different input
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::NotImplemented { .. } | Self::WorkerPanicked { .. }
        )
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidIdentifier { .. } => {
                vec!["Pass gems as NAME:VERSION or NAME:VERSION:PLATFORM"]
            }
            Self::InvalidVersion { .. } => {
                vec!["Use a version such as 1.2.3 or 2.0.0.pre.1"]
            }
            Self::NoIdentifiers => vec!["Pass at least one NAME:VERSION argument"],
            Self::UnknownAwaiter { .. } => vec![
                "Run with --help to list the available awaiters",
                "Check awaiters.skip and awaiters.only in .gem-await.yaml",
            ],
            Self::NoAwaitersSelected => vec![
                "Remove some --skip options",
                "Use --include to re-enable a skipped awaiter",
            ],
            Self::NotImplemented { .. } => {
                vec!["Skip this awaiter with --skip for this registry"]
            }
            Self::WorkerPanicked { .. } => vec!["Re-run with -v and report the log"],
            Self::Config(_) => vec![
                "Check .gem-await.yaml in the project and home directory",
                "Check GEM_AWAIT_SOURCE and GEM_AWAIT_TIMEOUT",
            ],
            Self::Client(_) => vec!["Check the --source URL"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Self::InvalidVersion { .. } => "INVALID_VERSION",
            Self::NoIdentifiers => "NO_IDENTIFIERS",
            Self::UnknownAwaiter { .. } => "UNKNOWN_AWAITER",
            Self::NoAwaitersSelected => "NO_AWAITERS_SELECTED",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::WorkerPanicked { .. } => "WORKER_PANICKED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Client(_) => "CLIENT_ERROR",
        }
    }
}
