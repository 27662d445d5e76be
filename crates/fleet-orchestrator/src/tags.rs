//! Tag resolver: read-only tag lookups for clusters and services.

use thiserror::Error;
use tracing::debug;

use fleet_core::TagSet;

use crate::control_plane::{ApiError, ControlPlane};

/// A tag read failed. Callers choose whether that excludes the resource
/// or fails it; the lookup itself never pretends the set was empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tag lookup failed for {resource_id}: {cause}")]
pub struct TagLookupError {
    pub resource_id: String,
    #[source]
    pub cause: ApiError,
}

/// Fetches tag sets through a borrowed control-plane client.
pub struct TagResolver<'a, C> {
    client: &'a C,
}

impl<'a, C: ControlPlane> TagResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    pub async fn fetch_tags(&self, resource_id: &str) -> Result<TagSet, TagLookupError> {
        let tags = self
            .client
            .list_tags(resource_id)
            .await
            .map_err(|cause| TagLookupError {
                resource_id: resource_id.to_string(),
                cause,
            })?;
        debug!(resource = resource_id, count = tags.len(), "fetched tags");
        Ok(tags)
    }
}
