//! In-memory control plane.
//!
//! Holds clusters, services, tags and pipelines in process, paginates
//! listings with a configurable page size, and records every mutation call
//! with its start time. Failures can be injected per resource. Used by the
//! test suites.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use fleet_core::{ClusterRef, TagSet, display_name};

use crate::control_plane::{ApiError, ApiResult, ControlPlane, Page};

/// ECS returns at most 10 services per `ListServices` page by default.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One recorded `update_desired_count` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub cluster: String,
    pub service: String,
    pub desired_count: u32,
    pub started_at: Instant,
}

struct MemoryService {
    id: String,
    desired_count: u32,
}

struct MemoryCluster {
    id: String,
    services: Vec<MemoryService>,
}

#[derive(Default)]
struct MemoryState {
    clusters: Vec<MemoryCluster>,
    tags: HashMap<String, TagSet>,
    pipelines: Vec<String>,

    list_clusters_failure: Option<ApiError>,
    list_services_failures: HashMap<String, ApiError>,
    tag_failures: HashMap<String, ApiError>,
    update_failures: HashMap<String, ApiError>,
    pipeline_failures: HashMap<String, ApiError>,

    updates: Vec<UpdateCall>,
    pipeline_starts: Vec<String>,
    list_services_calls: usize,
}

impl MemoryState {
    fn cluster_mut(&mut self, id: &str) -> Option<&mut MemoryCluster> {
        self.clusters.iter_mut().find(|c| c.id == id)
    }
}

pub struct InMemoryControlPlane {
    state: Mutex<MemoryState>,
    page_size: usize,
    call_latency: Duration,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            page_size: DEFAULT_PAGE_SIZE,
            call_latency: Duration::ZERO,
        }
    }

    /// Items per listing page (clamped to at least one).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Simulated latency of each mutation call.
    pub fn with_call_latency(mut self, latency: Duration) -> Self {
        self.call_latency = latency;
        self
    }

    pub async fn add_cluster(&self, id: &str, tags: &[(&str, &str)]) {
        let mut state = self.state.lock().await;
        state.clusters.push(MemoryCluster {
            id: id.to_string(),
            services: Vec::new(),
        });
        state
            .tags
            .insert(id.to_string(), tags.iter().copied().collect());
    }

    /// Add a service to an existing cluster. `id` may be a full ARN; the
    /// service is addressable by its last path segment.
    pub async fn add_service(&self, cluster: &str, id: &str, tags: &[(&str, &str)]) {
        let mut state = self.state.lock().await;
        if let Some(c) = state.cluster_mut(cluster) {
            c.services.push(MemoryService {
                id: id.to_string(),
                desired_count: 0,
            });
        }
        state
            .tags
            .insert(id.to_string(), tags.iter().copied().collect());
    }

    /// Delete a service, as if it vanished between discovery and mutation.
    pub async fn remove_service(&self, cluster: &str, name: &str) {
        let mut state = self.state.lock().await;
        if let Some(c) = state.cluster_mut(cluster) {
            c.services.retain(|s| display_name(&s.id) != name);
        }
    }

    pub async fn add_pipeline(&self, name: &str) {
        self.state.lock().await.pipelines.push(name.to_string());
    }

    pub async fn fail_list_clusters(&self, error: ApiError) {
        self.state.lock().await.list_clusters_failure = Some(error);
    }

    pub async fn fail_list_services(&self, cluster: &str, error: ApiError) {
        self.state
            .lock()
            .await
            .list_services_failures
            .insert(cluster.to_string(), error);
    }

    pub async fn fail_tags(&self, resource_id: &str, error: ApiError) {
        self.state
            .lock()
            .await
            .tag_failures
            .insert(resource_id.to_string(), error);
    }

    /// Make every update of the service named `service` fail with `error`.
    pub async fn fail_update(&self, service: &str, error: ApiError) {
        self.state
            .lock()
            .await
            .update_failures
            .insert(service.to_string(), error);
    }

    pub async fn fail_pipeline(&self, name: &str, error: ApiError) {
        self.state
            .lock()
            .await
            .pipeline_failures
            .insert(name.to_string(), error);
    }

    /// All mutation calls issued so far, in call order.
    pub async fn updates(&self) -> Vec<UpdateCall> {
        self.state.lock().await.updates.clone()
    }

    pub async fn desired_count(&self, cluster: &str, service: &str) -> Option<u32> {
        let state = self.state.lock().await;
        state
            .clusters
            .iter()
            .find(|c| c.id == cluster)?
            .services
            .iter()
            .find(|s| display_name(&s.id) == service)
            .map(|s| s.desired_count)
    }

    pub async fn pipeline_starts(&self) -> Vec<String> {
        self.state.lock().await.pipeline_starts.clone()
    }

    pub async fn list_services_calls(&self) -> usize {
        self.state.lock().await.list_services_calls
    }

    fn paginate(&self, ids: Vec<String>, next_token: Option<String>) -> ApiResult<Page<String>> {
        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ApiError::client("InvalidParameterException", "bad next token"))?,
            None => 0,
        };
        let end = (start + self.page_size).min(ids.len());
        let items = ids.get(start..end).map(<[String]>::to_vec).unwrap_or_default();
        let next_token = (end < ids.len()).then(|| end.to_string());
        Ok(Page { items, next_token })
    }
}

impl ControlPlane for InMemoryControlPlane {
    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        let ids = {
            let state = self.state.lock().await;
            if let Some(err) = &state.list_clusters_failure {
                return Err(err.clone());
            }
            state.clusters.iter().map(|c| c.id.clone()).collect()
        };
        self.paginate(ids, next_token)
    }

    async fn list_services(
        &self,
        cluster: &ClusterRef,
        next_token: Option<String>,
    ) -> ApiResult<Page<String>> {
        let ids = {
            let mut state = self.state.lock().await;
            state.list_services_calls += 1;
            if let Some(err) = state.list_services_failures.get(cluster.as_str()) {
                return Err(err.clone());
            }
            let c = state
                .cluster_mut(cluster.as_str())
                .ok_or_else(|| ApiError::NotFound(format!("cluster {cluster}")))?;
            c.services.iter().map(|s| s.id.clone()).collect()
        };
        self.paginate(ids, next_token)
    }

    async fn list_tags(&self, resource_id: &str) -> ApiResult<TagSet> {
        let state = self.state.lock().await;
        if let Some(err) = state.tag_failures.get(resource_id) {
            return Err(err.clone());
        }
        state
            .tags
            .get(resource_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("resource {resource_id}")))
    }

    async fn update_desired_count(
        &self,
        cluster: &ClusterRef,
        service: &str,
        desired_count: u32,
    ) -> ApiResult<()> {
        {
            let mut state = self.state.lock().await;
            state.updates.push(UpdateCall {
                cluster: cluster.to_string(),
                service: service.to_string(),
                desired_count,
                started_at: Instant::now(),
            });
        }

        if !self.call_latency.is_zero() {
            tokio::time::sleep(self.call_latency).await;
        }

        let mut state = self.state.lock().await;
        if let Some(err) = state.update_failures.get(service) {
            return Err(err.clone());
        }
        let c = state
            .cluster_mut(cluster.as_str())
            .ok_or_else(|| ApiError::NotFound(format!("cluster {cluster}")))?;
        let svc = c
            .services
            .iter_mut()
            .find(|s| display_name(&s.id) == service || s.id == service)
            .ok_or_else(|| ApiError::NotFound(format!("service {service} in {cluster}")))?;
        svc.desired_count = desired_count;
        Ok(())
    }

    async fn start_pipeline(&self, name: &str) -> ApiResult<Option<String>> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.pipeline_failures.get(name) {
            return Err(err.clone());
        }
        if !state.pipelines.iter().any(|p| p == name) {
            return Err(ApiError::NotFound(format!("pipeline {name}")));
        }
        state.pipeline_starts.push(name.to_string());
        Ok(Some(format!("exec-{}", state.pipeline_starts.len())))
    }
}
