//! Orchestrator: discovery, policy resolution and mutation for a whole run.
//!
//! ```text
//! for group in groups:
//!     clusters = discover(group.predicate)        // listing failure → group failure
//!     for cluster in clusters:
//!         for service in enumerate(cluster):      // page failure → cluster failure
//!             count   = resolve(group, service)   // tag failure → Failed(TagLookup)
//!             outcome = mutate(service, count)    // classified, never raised
//! ```
//!
//! No failure crosses a service boundary. Each service passes
//! Discovered → TagsFetched → DesiredResolved → MutationAttempted exactly
//! once per run and ends Applied, Skipped or Failed. Shutdown is checked
//! before each mutation: a call already in flight completes, nothing new
//! starts, and the summary gathered so far is returned.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use fleet_core::{
    ClusterRef, GroupConfig, NamedTarget, RunConfig, SelectBy, ServiceRef, TagPredicate,
    resolve_by_name, resolve_desired_count,
};

use crate::control_plane::ControlPlane;
use crate::discovery::discover_clusters;
use crate::enumerator::enumerate_services;
use crate::gate::RateGate;
use crate::mutator::Mutator;
use crate::summary::{
    ClusterFailure, ExcludedResource, Failure, FailureKind, GroupFailure, Outcome,
    PipelineOutcome, PipelineResult, RunSummary, SkipReason,
};
use crate::tags::TagResolver;

pub struct Orchestrator<C> {
    client: Arc<C>,
    mutator: Mutator<C>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C: ControlPlane> Orchestrator<C> {
    /// Create an orchestrator. Every mutation it issues passes through `gate`.
    pub fn new(client: Arc<C>, gate: Arc<RateGate>) -> Self {
        Self {
            mutator: Mutator::new(client.clone(), gate),
            client,
            shutdown: None,
        }
    }

    /// Stop starting new mutations once `shutdown` reads `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Apply every predicate group in order.
    pub async fn run(&self, groups: &[GroupConfig]) -> RunSummary {
        let mut summary = RunSummary::default();
        if self.run_groups(groups, &mut summary).await.is_break() {
            summary.cancelled = true;
        }
        log_finished(&summary);
        summary
    }

    /// Apply groups, then named targets, then pipelines, sharing one gate.
    pub async fn run_config(&self, config: &RunConfig) -> RunSummary {
        let mut summary = RunSummary::default();
        if self.run_all(config, &mut summary).await.is_break() {
            summary.cancelled = true;
        }
        log_finished(&summary);
        summary
    }

    async fn run_all(&self, config: &RunConfig, summary: &mut RunSummary) -> ControlFlow<()> {
        self.run_groups(&config.groups, summary).await?;
        for target in &config.targets {
            self.run_target(target, summary).await?;
        }
        self.run_pipelines(&config.pipelines, summary).await
    }

    async fn run_groups(&self, groups: &[GroupConfig], summary: &mut RunSummary) -> ControlFlow<()> {
        for group in groups {
            self.run_group(group, summary).await?;
        }
        ControlFlow::Continue(())
    }

    async fn run_group(&self, group: &GroupConfig, summary: &mut RunSummary) -> ControlFlow<()> {
        let label = group_label(group);
        info!(group = %label, "processing group");

        let discovery = match discover_clusters(self.client.as_ref(), &group.predicate).await {
            Ok(discovery) => discovery,
            Err(e) => {
                error!(group = %label, error = %e, "group abandoned");
                summary.group_failures.push(GroupFailure {
                    group: label,
                    message: e.to_string(),
                });
                return ControlFlow::Continue(());
            }
        };

        summary
            .excluded
            .extend(discovery.lookup_failures.into_iter().map(|e| ExcludedResource {
                group: label.clone(),
                resource: e.resource_id,
                message: e.cause.to_string(),
            }));

        if discovery.clusters.is_empty() {
            info!(group = %label, "no clusters matched");
        }

        for cluster in discovery.clusters {
            self.run_cluster(group, &label, cluster, summary).await?;
        }
        ControlFlow::Continue(())
    }

    async fn run_cluster(
        &self,
        group: &GroupConfig,
        label: &str,
        cluster: ClusterRef,
        summary: &mut RunSummary,
    ) -> ControlFlow<()> {
        info!(group = label, cluster = %cluster, "processing cluster");
        let mut services = enumerate_services(self.client.as_ref(), cluster.clone());
        let mut attempted = 0usize;

        while let Some(next) = services.next_service().await {
            let service = match next {
                Ok(service) => service,
                Err(e) => {
                    error!(cluster = %cluster, error = %e, "service listing failed");
                    summary.cluster_failures.push(ClusterFailure {
                        group: label.to_string(),
                        cluster: cluster.to_string(),
                        message: e.to_string(),
                    });
                    break;
                }
            };

            let outcome = match self.resolve_count(group, &service).await {
                Ok(count) => self.mutate(&service, count).await,
                Err(outcome) => outcome,
            };
            attempted += 1;

            let cancelled = outcome == Outcome::Skipped(SkipReason::Cancelled);
            summary.record(label, service, outcome);
            if cancelled {
                return ControlFlow::Break(());
            }
        }

        info!(cluster = %cluster, services = attempted, "cluster finished");
        ControlFlow::Continue(())
    }

    /// Desired count for a discovered service, or the outcome that ends it.
    async fn resolve_count(&self, group: &GroupConfig, service: &ServiceRef) -> Result<u32, Outcome> {
        if group.select_by == SelectBy::ServiceName {
            return Ok(resolve_by_name(service, &group.desired, group.default_count));
        }
        if !group.needs_service_tags() {
            return Ok(group.default_count);
        }

        match TagResolver::new(self.client.as_ref()).fetch_tags(&service.id).await {
            Ok(tags) => Ok(resolve_desired_count(
                service,
                tags.values(),
                &group.desired,
                group.default_count,
            )),
            Err(e) if e.cause.is_not_found() => {
                warn!(service = %service.display_name, "service vanished before tag lookup");
                Err(Outcome::Skipped(SkipReason::NotFound))
            }
            Err(e) => {
                error!(service = %service.display_name, error = %e, "service tags unreadable");
                Err(Outcome::Failed(Failure {
                    kind: FailureKind::TagLookup,
                    message: e.to_string(),
                }))
            }
        }
    }

    async fn mutate(&self, service: &ServiceRef, count: u32) -> Outcome {
        if self.shutdown_requested() {
            info!(service = %service.display_name, "shutdown requested, not starting update");
            return Outcome::Skipped(SkipReason::Cancelled);
        }
        self.mutator.apply_desired_count(service, count).await
    }

    async fn run_target(&self, target: &NamedTarget, summary: &mut RunSummary) -> ControlFlow<()> {
        let label = format!("cluster {}", target.cluster);
        let cluster = ClusterRef::new(target.cluster.clone());
        info!(cluster = %cluster, services = target.services.len(), "processing named services");

        for name in &target.services {
            let service = ServiceRef::new(cluster.clone(), name.clone());
            let count = resolve_by_name(&service, &target.desired, target.default_count);
            let outcome = self.mutate(&service, count).await;

            let cancelled = outcome == Outcome::Skipped(SkipReason::Cancelled);
            summary.record(&label, service, outcome);
            if cancelled {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn run_pipelines(&self, names: &[String], summary: &mut RunSummary) -> ControlFlow<()> {
        for name in names {
            if self.shutdown_requested() {
                summary.pipelines.push(PipelineResult {
                    name: name.clone(),
                    outcome: PipelineOutcome::Skipped(SkipReason::Cancelled),
                });
                return ControlFlow::Break(());
            }
            let outcome = self.mutator.start_pipeline(name).await;
            summary.pipelines.push(PipelineResult {
                name: name.clone(),
                outcome,
            });
        }
        ControlFlow::Continue(())
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Group name, or a rendering of its predicate when unnamed.
pub fn group_label(group: &GroupConfig) -> String {
    if !group.name.is_empty() {
        return group.name.clone();
    }
    match &group.predicate {
        TagPredicate::AllOf { key, value } => format!("{key}={value}"),
        TagPredicate::AnyOf { pairs } if pairs.is_empty() => "any-of()".to_string(),
        TagPredicate::AnyOf { pairs } => pairs
            .iter()
            .map(|t| format!("{}={}", t.key, t.value))
            .collect::<Vec<_>>()
            .join("|"),
    }
}

fn log_finished(summary: &RunSummary) {
    let (applied, skipped, failed) = (summary.applied(), summary.skipped(), summary.failed());
    if summary.is_success() {
        info!(applied, skipped, failed, cancelled = summary.cancelled, "run finished");
    } else {
        warn!(
            applied,
            skipped,
            failed,
            group_failures = summary.group_failures.len(),
            cluster_failures = summary.cluster_failures.len(),
            cancelled = summary.cancelled,
            "run finished with failures"
        );
    }
}
