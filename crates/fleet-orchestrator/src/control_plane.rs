//! Control-plane seam: the only way the orchestrator talks to the cloud.
//!
//! Implementations are passed in explicitly (see `fleet-aws` for the ECS
//! one and [`crate::memory::InMemoryControlPlane`] for tests). Every call
//! fails with one of the three [`ApiError`] kinds so callers can branch on
//! the kind without inspecting provider-specific error types.

use std::future::Future;

use thiserror::Error;

use fleet_core::{ClusterRef, TagSet};

/// Result type alias for control-plane calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by a control-plane call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The target resource does not exist (or no longer does).
    #[error("not found: {0}")]
    NotFound(String),

    /// The API refused the request for a caller-correctable reason:
    /// bad parameters, throttling, or missing permissions.
    #[error("{code}: {message}")]
    Client { code: String, message: String },

    /// Anything else: transport failures, server errors, malformed responses.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Client {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

/// Operations consumed from the cloud control plane.
///
/// Implementations are expected to apply their own per-call timeout.
pub trait ControlPlane: Send + Sync {
    /// List cluster identifiers, one page per call.
    fn list_clusters(
        &self,
        next_token: Option<String>,
    ) -> impl Future<Output = ApiResult<Page<String>>> + Send;

    /// List service identifiers in `cluster`, one page per call.
    fn list_services(
        &self,
        cluster: &ClusterRef,
        next_token: Option<String>,
    ) -> impl Future<Output = ApiResult<Page<String>>> + Send;

    /// Tags attached to a cluster or service, in API order.
    fn list_tags(&self, resource_id: &str) -> impl Future<Output = ApiResult<TagSet>> + Send;

    /// Set the desired task count of `service` in `cluster`.
    fn update_desired_count(
        &self,
        cluster: &ClusterRef,
        service: &str,
        desired_count: u32,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// Start an execution of the named pipeline; returns the execution id
    /// when the API reports one.
    fn start_pipeline(&self, name: &str) -> impl Future<Output = ApiResult<Option<String>>> + Send;
}
