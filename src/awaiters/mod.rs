//! Awaiters - one strategy per registry facet
//!
//! Each [`AwaiterKind`] variant decides which identifiers it is responsible
//! for and how a single poll asks the registry client about them. The retry
//! loop itself lives in [`crate::core::retry`].

pub mod bulk_index;
pub mod compact_index;
pub mod file_fetch;
pub mod selection;

pub use selection::AwaiterSelection;

use crate::core::error::{AwaitError, ClientError};
use crate::core::package::{MissingSet, PackageIdentifier};
use crate::core::traits::{Awaiter, RegistryClient};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// The closed set of awaiters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AwaiterKind {
    Versions,
    Names,
    Info,
    Gemspecs,
    Gems,
    FullIndex,
    PrereleaseIndex,
    DependencyApi,
}

impl AwaiterKind {
    /// Every awaiter, in launch order
    pub const ALL: [AwaiterKind; 8] = [
        AwaiterKind::Versions,
        AwaiterKind::Names,
        AwaiterKind::Info,
        AwaiterKind::Gemspecs,
        AwaiterKind::Gems,
        AwaiterKind::FullIndex,
        AwaiterKind::PrereleaseIndex,
        AwaiterKind::DependencyApi,
    ];

    /// Get string representation of the awaiter
    pub fn as_str(&self) -> &'static str {
        match self {
            AwaiterKind::Versions => "versions",
            AwaiterKind::Names => "names",
            AwaiterKind::Info => "info",
            AwaiterKind::Gemspecs => "gemspecs",
            AwaiterKind::Gems => "gems",
            AwaiterKind::FullIndex => "full index",
            AwaiterKind::PrereleaseIndex => "pre index",
            AwaiterKind::DependencyApi => "dependency api",
        }
    }
}

impl fmt::Display for AwaiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AwaiterKind {
    type Err = AwaitError;

    /// Accepts the display name with spaces, dashes or underscores
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        let kind = match normalized.as_str() {
            "prerelease index" => Some(AwaiterKind::PrereleaseIndex),
            other => Self::ALL.into_iter().find(|kind| kind.as_str() == other),
        };
        kind.ok_or_else(|| AwaitError::UnknownAwaiter {
            name: s.to_string(),
        })
    }
}

#[async_trait]
impl Awaiter for AwaiterKind {
    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn initial_missing(&self, identifiers: &[PackageIdentifier]) -> MissingSet {
        let mut missing = MissingSet::from_identifiers(identifiers);
        match self {
            AwaiterKind::FullIndex => missing.retain(|id| !id.is_prerelease()),
            AwaiterKind::PrereleaseIndex => missing.retain(PackageIdentifier::is_prerelease),
            _ => {}
        }
        missing
    }

    async fn poll(
        &self,
        missing: &mut MissingSet,
        client: &dyn RegistryClient,
    ) -> Result<(), ClientError> {
        match self {
            AwaiterKind::Versions => compact_index::poll_versions(missing, client).await,
            AwaiterKind::Names => compact_index::poll_names(missing, client).await,
            AwaiterKind::Info => compact_index::poll_info(missing, client).await,
            AwaiterKind::Gemspecs => {
                file_fetch::poll_files(file_fetch::FileKind::Metadata, missing, client).await
            }
            AwaiterKind::Gems => {
                file_fetch::poll_files(file_fetch::FileKind::Archive, missing, client).await
            }
            AwaiterKind::FullIndex => bulk_index::poll_full_index(missing, client).await,
            AwaiterKind::PrereleaseIndex => {
                bulk_index::poll_prerelease_index(missing, client).await
            }
            AwaiterKind::DependencyApi => bulk_index::poll_dependency_api(missing, client).await,
        }
    }
}

/// Remove every listed identifier that is still missing, logging each find
fn confirm_listed<'a, I>(missing: &mut MissingSet, listed: I)
where
    I: IntoIterator<Item = &'a PackageIdentifier>,
{
    for id in listed {
        if missing.remove(id) {
            info!("found {}", id);
        }
    }
}

/// Log a per-name or per-item failure, or hand back errors that must stop the awaiter
fn isolate(subject: &str, error: ClientError) -> Result<(), ClientError> {
    if !error.is_transient() {
        return Err(error);
    }
    warn!(error_kind = error.kind(), subject, "{}", error);
    Ok(())
}
