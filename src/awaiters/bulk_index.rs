//! Bulk index awaiters: full index, prerelease index and dependency API
//!
//! One request per iteration answers for every missing identifier, so a failed
//! request simply fails the iteration.

use super::confirm_listed;
use crate::core::error::ClientError;
use crate::core::package::MissingSet;
use crate::core::traits::RegistryClient;

pub async fn poll_full_index(
    missing: &mut MissingSet,
    client: &dyn RegistryClient,
) -> Result<(), ClientError> {
    let index = client.fetch_full_index().await?;
    confirm_listed(missing, &index);
    Ok(())
}

pub async fn poll_prerelease_index(
    missing: &mut MissingSet,
    client: &dyn RegistryClient,
) -> Result<(), ClientError> {
    let index = client.fetch_prerelease_index().await?;
    confirm_listed(missing, &index);
    Ok(())
}

/// Ask the dependency API about every name that still has missing versions
pub async fn poll_dependency_api(
    missing: &mut MissingSet,
    client: &dyn RegistryClient,
) -> Result<(), ClientError> {
    let names = missing.names();
    let dependencies = client.fetch_dependency_api(&names).await?;
    confirm_listed(missing, &dependencies);
    Ok(())
}
