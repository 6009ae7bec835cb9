//! Core traits for awaiting published packages
//!
//! This module defines the two seams of the crate: the registry client that
//! answers queries about one registry facet, and the awaiter that decides which
//! queries to make and what counts as confirmed.

use crate::core::error::ClientError;
use crate::core::package::{MissingSet, PackageIdentifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Registry Client
// ============================================================================

/// Result of fetching a single file from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Found,
    NotFound,
}

/// Read-only view of a package registry
///
/// Every facet has a default body returning [`ClientError::Unsupported`], so a
/// client only implements the endpoints its registry actually serves. Awaiters
/// treat an unsupported facet as a configuration mistake and stop; any other
/// error just means "not confirmed this iteration".
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// All package names known to the registry
    async fn list_names(&self) -> Result<Vec<String>, ClientError> {
        Err(ClientError::Unsupported { facet: "names" })
    }

    /// Versions of one package from the bulk versions listing
    async fn list_versions(&self, _name: &str) -> Result<Vec<PackageIdentifier>, ClientError> {
        Err(ClientError::Unsupported { facet: "versions" })
    }

    /// Versions of one package from its per-name info listing
    async fn fetch_dependency_info(
        &self,
        _name: &str,
    ) -> Result<Vec<PackageIdentifier>, ClientError> {
        Err(ClientError::Unsupported { facet: "info" })
    }

    /// Fetch the metadata (gemspec) file of one artifact
    async fn fetch_metadata_file(&self, _id: &PackageIdentifier) -> Result<Presence, ClientError> {
        Err(ClientError::Unsupported { facet: "gemspecs" })
    }

    /// Fetch the archive (.gem) file of one artifact
    async fn fetch_archive_file(&self, _id: &PackageIdentifier) -> Result<Presence, ClientError> {
        Err(ClientError::Unsupported { facet: "gems" })
    }

    /// Every entry of the legacy full (non-prerelease) index
    async fn fetch_full_index(&self) -> Result<Vec<PackageIdentifier>, ClientError> {
        Err(ClientError::Unsupported { facet: "full index" })
    }

    /// Every entry of the legacy prerelease index
    async fn fetch_prerelease_index(&self) -> Result<Vec<PackageIdentifier>, ClientError> {
        Err(ClientError::Unsupported {
            facet: "prerelease index",
        })
    }

    /// Entries of the dependency API for the requested names
    async fn fetch_dependency_api(
        &self,
        _names: &[String],
    ) -> Result<Vec<PackageIdentifier>, ClientError> {
        Err(ClientError::Unsupported {
            facet: "dependency api",
        })
    }
}

// ============================================================================
// Awaiter
// ============================================================================

/// One way of checking that packages are visible on a registry
///
/// `poll` must be idempotent on the identifiers left in `missing`, must only
/// remove identifiers the registry confirmed, and must not fail just because
/// something is not there yet.
#[async_trait]
pub trait Awaiter: Send + Sync {
    /// Awaiter name used in logs and on the command line
    fn name(&self) -> &'static str;

    /// Working set this awaiter starts from
    fn initial_missing(&self, identifiers: &[PackageIdentifier]) -> MissingSet {
        MissingSet::from_identifiers(identifiers)
    }

    /// Query the registry once, removing confirmed identifiers from `missing`
    async fn poll(
        &self,
        missing: &mut MissingSet,
        client: &dyn RegistryClient,
    ) -> Result<(), ClientError>;
}
