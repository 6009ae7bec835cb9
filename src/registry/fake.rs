//! Scripted in-memory registry used by the awaiter and orchestration tests

use crate::core::error::ClientError;
use crate::core::package::PackageIdentifier;
use crate::core::traits::{Presence, RegistryClient};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Facet {
    Names,
    Versions,
    Info,
    Metadata,
    Archive,
    FullIndex,
    PrereleaseIndex,
    DependencyApi,
}

impl Facet {
    fn name(self) -> &'static str {
        match self {
            Facet::Names => "names",
            Facet::Versions => "versions",
            Facet::Info => "info",
            Facet::Metadata => "gemspecs",
            Facet::Archive => "gems",
            Facet::FullIndex => "full index",
            Facet::PrereleaseIndex => "prerelease index",
            Facet::DependencyApi => "dependency api",
        }
    }
}

#[derive(Default)]
struct FakeState {
    /// Identifier and the facet call index from which it is visible
    published: Vec<(PackageIdentifier, u32)>,
    calls: HashMap<Facet, u32>,
    failing_facets: HashMap<Facet, u32>,
    failing_names: HashSet<String>,
    failing_items: HashSet<PackageIdentifier>,
    unsupported: HashSet<Facet>,
    last_dependency_request: Option<Vec<String>>,
}

/// Registry whose contents become visible after a scripted number of calls
#[derive(Default)]
pub(crate) struct FakeRegistry {
    state: Mutex<FakeState>,
}

impl FakeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Visible on every facet from the first call
    pub(crate) fn publish(self, id: PackageIdentifier) -> Self {
        self.publish_after(id, 0)
    }

    /// Visible once a facet has been called `calls` times already
    pub(crate) fn publish_after(self, id: PackageIdentifier, calls: u32) -> Self {
        self.state.lock().unwrap().published.push((id, calls));
        self
    }

    /// Fail the next `times` calls of a facet with a 503
    pub(crate) fn fail_facet(self, facet: Facet, times: u32) -> Self {
        self.state.lock().unwrap().failing_facets.insert(facet, times);
        self
    }

    /// Per-name listings for this name always fail
    pub(crate) fn fail_name(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_names
            .insert(name.to_string());
        self
    }

    /// File fetches for this identifier always fail with 403
    pub(crate) fn fail_item(self, id: PackageIdentifier) -> Self {
        self.state.lock().unwrap().failing_items.insert(id);
        self
    }

    pub(crate) fn unsupported(self, facet: Facet) -> Self {
        self.state.lock().unwrap().unsupported.insert(facet);
        self
    }

    pub(crate) fn calls(&self, facet: Facet) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&facet)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn last_dependency_request(&self) -> Option<Vec<String>> {
        self.state.lock().unwrap().last_dependency_request.clone()
    }

    /// Record a call and return what is visible to it
    fn begin(&self, facet: Facet) -> Result<Vec<PackageIdentifier>, ClientError> {
        let mut state = self.state.lock().unwrap();
        let counter = state.calls.entry(facet).or_insert(0);
        let call = *counter;
        *counter += 1;

        if state.unsupported.contains(&facet) {
            return Err(ClientError::Unsupported {
                facet: facet.name(),
            });
        }
        if let Some(remaining) = state.failing_facets.get_mut(&facet)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ClientError::Status {
                uri: format!("fake://{}", facet.name()),
                status: 503,
            });
        }

        Ok(state
            .published
            .iter()
            .filter(|(_, after)| call >= *after)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn listing_for(&self, facet: Facet, name: &str) -> Result<Vec<PackageIdentifier>, ClientError> {
        let visible = self.begin(facet)?;
        if self.state.lock().unwrap().failing_names.contains(name) {
            return Err(ClientError::Status {
                uri: format!("fake://{}/{}", facet.name(), name),
                status: 500,
            });
        }
        Ok(visible.into_iter().filter(|id| id.name() == name).collect())
    }

    fn file_for(&self, facet: Facet, id: &PackageIdentifier) -> Result<Presence, ClientError> {
        let visible = self.begin(facet)?;
        if self.state.lock().unwrap().failing_items.contains(id) {
            return Err(ClientError::Forbidden {
                uri: format!("fake://{}/{}", facet.name(), id.full_name()),
            });
        }
        Ok(if visible.contains(id) {
            Presence::Found
        } else {
            Presence::NotFound
        })
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn list_names(&self) -> Result<Vec<String>, ClientError> {
        let mut names: Vec<String> = self
            .begin(Facet::Names)?
            .into_iter()
            .map(|id| id.name().to_string())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<PackageIdentifier>, ClientError> {
        self.listing_for(Facet::Versions, name)
    }

    async fn fetch_dependency_info(
        &self,
        name: &str,
    ) -> Result<Vec<PackageIdentifier>, ClientError> {
        self.listing_for(Facet::Info, name)
    }

    async fn fetch_metadata_file(&self, id: &PackageIdentifier) -> Result<Presence, ClientError> {
        self.file_for(Facet::Metadata, id)
    }

    async fn fetch_archive_file(&self, id: &PackageIdentifier) -> Result<Presence, ClientError> {
        self.file_for(Facet::Archive, id)
    }

    async fn fetch_full_index(&self) -> Result<Vec<PackageIdentifier>, ClientError> {
        let visible = self.begin(Facet::FullIndex)?;
        Ok(visible.into_iter().filter(|id| !id.is_prerelease()).collect())
    }

    async fn fetch_prerelease_index(&self) -> Result<Vec<PackageIdentifier>, ClientError> {
        let visible = self.begin(Facet::PrereleaseIndex)?;
        Ok(visible.into_iter().filter(|id| id.is_prerelease()).collect())
    }

    async fn fetch_dependency_api(
        &self,
        names: &[String],
    ) -> Result<Vec<PackageIdentifier>, ClientError> {
        let visible = self.begin(Facet::DependencyApi)?;
        self.state.lock().unwrap().last_dependency_request = Some(names.to_vec());
        Ok(visible
            .into_iter()
            .filter(|id| names.iter().any(|name| name == id.name()))
            .collect())
    }
}
