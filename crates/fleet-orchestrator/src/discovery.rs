//! Cluster discovery: list every cluster, keep the ones whose tags match.

use thiserror::Error;
use tracing::{debug, info, warn};

use fleet_core::{ClusterRef, TagPredicate};

use crate::control_plane::{ApiError, ControlPlane};
use crate::tags::{TagLookupError, TagResolver};

/// The top-level listing for a group failed; the group cannot proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupSetupError {
    #[error("cluster listing failed: {0}")]
    ListClusters(#[source] ApiError),
}

/// Clusters matching a predicate, in listing order.
#[derive(Debug, Default)]
pub struct Discovery {
    pub clusters: Vec<ClusterRef>,
    /// Clusters excluded because their tags could not be read.
    pub lookup_failures: Vec<TagLookupError>,
}

/// Follow every listing cursor and return all cluster identifiers.
pub async fn list_all_clusters<C: ControlPlane>(client: &C) -> Result<Vec<ClusterRef>, ApiError> {
    let mut clusters = Vec::new();
    let mut next_token = None;

    loop {
        let requested = next_token.take();
        let page = client.list_clusters(requested.clone()).await?;
        clusters.extend(page.items.into_iter().map(ClusterRef::from));
        match page.next_token {
            Some(token) if token.is_empty() => break,
            Some(token) if Some(&token) == requested.as_ref() => {
                return Err(ApiError::Unexpected(
                    "cluster listing returned the same cursor twice".to_string(),
                ));
            }
            Some(token) => next_token = Some(token),
            None => break,
        }
    }

    Ok(clusters)
}

/// Resolve `predicate` into the matching clusters.
///
/// Tag lookups are fail-closed: an unreadable cluster is left out and the
/// failure is returned alongside the matches.
pub async fn discover_clusters<C: ControlPlane>(
    client: &C,
    predicate: &TagPredicate,
) -> Result<Discovery, GroupSetupError> {
    let candidates = list_all_clusters(client)
        .await
        .map_err(GroupSetupError::ListClusters)?;

    let resolver = TagResolver::new(client);
    let mut discovery = Discovery::default();

    for cluster in candidates {
        match resolver.fetch_tags(cluster.as_str()).await {
            Ok(tags) if predicate.matches(&tags) => {
                debug!(cluster = %cluster, "cluster matches predicate");
                discovery.clusters.push(cluster);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(cluster = %cluster, error = %e.cause, "excluding cluster, tags unreadable");
                discovery.lookup_failures.push(e);
            }
        }
    }

    info!(
        matched = discovery.clusters.len(),
        excluded = discovery.lookup_failures.len(),
        "cluster discovery finished"
    );
    Ok(discovery)
}
