//! Service enumerator: lazy, cursor-paginated walk over a cluster's services.
//!
//! Pages are fetched on demand, so a cluster with thousands of services is
//! never buffered in full. The enumerator is single-pass; call
//! [`enumerate_services`] again to restart from the first page.

use std::collections::VecDeque;

use tracing::debug;

use fleet_core::{ClusterRef, ServiceRef};

use crate::control_plane::{ApiError, ApiResult, ControlPlane};

pub struct ServiceEnumerator<'a, C> {
    client: &'a C,
    cluster: ClusterRef,
    buffer: VecDeque<String>,
    next_token: Option<String>,
    pages: usize,
    exhausted: bool,
}

/// Start enumerating the services of `cluster`.
pub fn enumerate_services<C: ControlPlane>(client: &C, cluster: ClusterRef) -> ServiceEnumerator<'_, C> {
    ServiceEnumerator {
        client,
        cluster,
        buffer: VecDeque::new(),
        next_token: None,
        pages: 0,
        exhausted: false,
    }
}

impl<C: ControlPlane> ServiceEnumerator<'_, C> {
    /// Next service, fetching another page when the current one is used up.
    ///
    /// A listing error is yielded once; the enumerator is exhausted after it.
    pub async fn next_service(&mut self) -> Option<ApiResult<ServiceRef>> {
        loop {
            if let Some(id) = self.buffer.pop_front() {
                return Some(Ok(ServiceRef::new(self.cluster.clone(), id)));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page().await {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }

    /// Drain the remaining services into a vector.
    pub async fn collect_all(mut self) -> ApiResult<Vec<ServiceRef>> {
        let mut services = Vec::new();
        while let Some(service) = self.next_service().await {
            services.push(service?);
        }
        Ok(services)
    }

    /// Number of pages fetched so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    async fn fetch_page(&mut self) -> ApiResult<()> {
        let requested = self.next_token.take();
        let page = self
            .client
            .list_services(&self.cluster, requested.clone())
            .await?;
        self.pages += 1;

        debug!(
            cluster = %self.cluster,
            page = self.pages,
            services = page.items.len(),
            "fetched service page"
        );
        self.buffer.extend(page.items);

        match page.next_token {
            Some(token) if token.is_empty() => self.exhausted = true,
            Some(token) if Some(&token) == requested.as_ref() => {
                return Err(ApiError::Unexpected(format!(
                    "service listing for {} returned the same cursor twice",
                    self.cluster
                )));
            }
            Some(token) => self.next_token = Some(token),
            None => self.exhausted = true,
        }
        Ok(())
    }
}
