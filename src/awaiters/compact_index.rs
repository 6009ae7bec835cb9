//! Compact index awaiters: names, versions and info
//!
//! Versions and info are queried per missing name. A failure for one name is
//! logged and the remaining names are still checked in the same iteration.

use super::{confirm_listed, isolate};
use crate::core::error::ClientError;
use crate::core::package::MissingSet;
use crate::core::traits::RegistryClient;
use tracing::info;

/// Confirm whole names against the registry's name listing
pub async fn poll_names(
    missing: &mut MissingSet,
    client: &dyn RegistryClient,
) -> Result<(), ClientError> {
    let names = client.list_names().await?;

    for name in names {
        if missing.remove_name(&name).is_some() {
            info!("found {}", name);
        }
    }

    Ok(())
}

/// Confirm versions against the bulk versions listing
pub async fn poll_versions(
    missing: &mut MissingSet,
    client: &dyn RegistryClient,
) -> Result<(), ClientError> {
    for name in missing.names() {
        match client.list_versions(&name).await {
            Ok(listed) => confirm_listed(missing, &listed),
            Err(error) => isolate(&name, error)?,
        }
    }

    Ok(())
}

/// Confirm versions against each name's info listing
pub async fn poll_info(
    missing: &mut MissingSet,
    client: &dyn RegistryClient,
) -> Result<(), ClientError> {
    for name in missing.names() {
        match client.fetch_dependency_info(&name).await {
            Ok(listed) => confirm_listed(missing, &listed),
            Err(error) => isolate(&name, error)?,
        }
    }

    Ok(())
}
