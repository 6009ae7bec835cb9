pub mod compact_index;
pub mod http_client;

#[cfg(test)]
pub(crate) mod fake;

pub use http_client::{HttpRegistryClient, HttpRegistryClientBuilder};
