//! Per-file awaiters: gemspecs and gems
//!
//! Every missing identifier is fetched on its own. A fetch error for one item
//! leaves that item missing and moves on to the next one.

use super::isolate;
use crate::core::error::ClientError;
use crate::core::package::MissingSet;
use crate::core::traits::{Presence, RegistryClient};
use tracing::{debug, info};

/// Which file is fetched for each identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `quick/Marshal.4.8/<full name>.gemspec.rz`
    Metadata,
    /// `gems/<full name>.gem`
    Archive,
}

pub async fn poll_files(
    kind: FileKind,
    missing: &mut MissingSet,
    client: &dyn RegistryClient,
) -> Result<(), ClientError> {
    for id in missing.to_vec() {
        let fetched = match kind {
            FileKind::Metadata => client.fetch_metadata_file(&id).await,
            FileKind::Archive => client.fetch_archive_file(&id).await,
        };

        match fetched {
            Ok(Presence::Found) => {
                missing.remove(&id);
                info!("found {}", id);
            }
            Ok(Presence::NotFound) => debug!("{} not found", id),
            Err(error) => isolate(&id.full_name(), error)?,
        }
    }

    Ok(())
}
