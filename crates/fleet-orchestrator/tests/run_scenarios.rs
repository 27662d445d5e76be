//! End-to-end runs against the in-memory control plane.
//!
//! Covers discovery by tag, policy resolution, failure isolation, the rate
//! floor over a full run, and repeated stop runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use fleet_core::{DesiredStateMap, GroupConfig, NamedTarget, RunConfig, Tag, TagPredicate};
use fleet_orchestrator::*;

fn fast_gate() -> Arc<RateGate> {
    Arc::new(RateGate::per_second(1000))
}

fn policy(pairs: &[(&str, u32)]) -> DesiredStateMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

async fn prod_and_dev() -> Arc<InMemoryControlPlane> {
    let cp = InMemoryControlPlane::new().with_page_size(2);
    cp.add_cluster("arn:cluster/prod", &[("Env", "prod")]).await;
    cp.add_cluster("arn:cluster/dev", &[("Env", "dev")]).await;
    for name in ["api", "worker", "cache"] {
        cp.add_service(
            "arn:cluster/prod",
            &format!("arn:service/prod/{name}"),
            &[("role", name)],
        )
        .await;
    }
    for name in ["api", "worker"] {
        cp.add_service(
            "arn:cluster/dev",
            &format!("arn:service/dev/{name}"),
            &[("role", name)],
        )
        .await;
    }
    Arc::new(cp)
}

#[tokio::test]
async fn only_services_in_matching_clusters_are_touched() {
    let cp = prod_and_dev().await;
    let group = GroupConfig::new("prod", TagPredicate::all_of("Env", "prod"), 1);

    let summary = Orchestrator::new(cp.clone(), fast_gate()).run(&[group]).await;

    assert_eq!(summary.results.len(), 3);
    assert!(summary
        .results
        .iter()
        .all(|r| r.service.cluster.as_str() == "arn:cluster/prod"));
    assert!(summary.is_success());
    assert_eq!(cp.desired_count("arn:cluster/dev", "api").await, Some(0));
}

#[tokio::test]
async fn policy_map_with_default() {
    let cp = prod_and_dev().await;
    let group = GroupConfig::new("prod", TagPredicate::all_of("Env", "prod"), 1)
        .with_desired(policy(&[("worker", 5), ("api", 2)]));

    let summary = Orchestrator::new(cp.clone(), fast_gate()).run(&[group]).await;

    assert_eq!(summary.applied(), 3);
    assert_eq!(cp.desired_count("arn:cluster/prod", "worker").await, Some(5));
    assert_eq!(cp.desired_count("arn:cluster/prod", "api").await, Some(2));
    assert_eq!(cp.desired_count("arn:cluster/prod", "cache").await, Some(1));
}

#[tokio::test]
async fn services_are_mutated_in_enumeration_order() {
    let cp = prod_and_dev().await;
    let group = GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod"));

    Orchestrator::new(cp.clone(), fast_gate()).run(&[group]).await;

    let order: Vec<_> = cp.updates().await.into_iter().map(|u| u.service).collect();
    assert_eq!(order, vec!["api", "worker", "cache"]);
}

#[tokio::test]
async fn not_found_is_skipped_and_processing_continues() {
    let cp = prod_and_dev().await;
    cp.fail_update("api", ApiError::NotFound("service api".into()))
        .await;
    let group = GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod"));

    let summary = Orchestrator::new(cp.clone(), fast_gate()).run(&[group]).await;

    assert_eq!(summary.results[0].outcome, Outcome::Skipped(SkipReason::NotFound));
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.applied(), 2);
    assert!(summary.is_success());
}

#[tokio::test]
async fn failures_are_isolated_per_service() {
    let cp = prod_and_dev().await;
    cp.fail_update("api", ApiError::client("AccessDeniedException", "not allowed"))
        .await;
    cp.fail_update("worker", ApiError::Unexpected("connection reset".into()))
        .await;
    let group = GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod"));

    let summary = Orchestrator::new(cp.clone(), fast_gate()).run(&[group]).await;

    assert_eq!(summary.failed(), 2);
    assert_eq!(summary.applied(), 1);
    assert!(!summary.is_success());
    let kinds: Vec<_> = summary.failures().map(|(_, f)| f.kind).collect();
    assert_eq!(kinds, vec![FailureKind::ClientRejected, FailureKind::Unexpected]);
}

#[tokio::test]
async fn group_setup_failure_does_not_stop_other_groups() {
    let cp = prod_and_dev().await;
    cp.fail_list_clusters(ApiError::client("AccessDeniedException", "denied"))
        .await;

    let groups = [
        GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod")),
        GroupConfig::stop("dev", TagPredicate::all_of("Env", "dev")),
    ];
    let config = RunConfig {
        groups: groups.to_vec(),
        targets: vec![NamedTarget {
            cluster: "arn:cluster/dev".into(),
            services: vec!["api".into()],
            desired: DesiredStateMap::new(),
            default_count: 2,
        }],
        ..Default::default()
    };

    let summary = Orchestrator::new(cp.clone(), fast_gate()).run_config(&config).await;

    assert_eq!(summary.group_failures.len(), 2);
    assert_eq!(summary.group_failures[0].group, "prod");
    assert_eq!(summary.applied(), 1);
    assert_eq!(cp.desired_count("arn:cluster/dev", "api").await, Some(2));
    assert!(!summary.is_success());
}

#[tokio::test]
async fn service_listing_failure_moves_to_next_cluster() {
    let cp = prod_and_dev().await;
    cp.fail_list_services("arn:cluster/prod", ApiError::Unexpected("timeout".into()))
        .await;
    let group = GroupConfig::stop(
        "all",
        TagPredicate::any_of([Tag::new("Env", "prod"), Tag::new("Env", "dev")]),
    );

    let summary = Orchestrator::new(cp.clone(), fast_gate()).run(&[group]).await;

    assert_eq!(summary.cluster_failures.len(), 1);
    assert_eq!(summary.cluster_failures[0].cluster, "arn:cluster/prod");
    assert_eq!(summary.applied(), 2);
}

#[tokio::test]
async fn unreadable_cluster_tags_exclude_the_cluster() {
    let cp = prod_and_dev().await;
    cp.fail_tags("arn:cluster/prod", ApiError::Unexpected("timeout".into()))
        .await;
    let group = GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod"));

    let summary = Orchestrator::new(cp.clone(), fast_gate()).run(&[group]).await;

    assert!(summary.results.is_empty());
    assert_eq!(summary.excluded.len(), 1);
    assert_eq!(summary.excluded[0].resource, "arn:cluster/prod");
    assert!(cp.updates().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn rate_floor_holds_over_a_full_run() {
    let cp = InMemoryControlPlane::new().with_page_size(10);
    cp.add_cluster("c", &[("Env", "prod")]).await;
    for i in 0..25 {
        cp.add_service("c", &format!("svc/c/s{i}"), &[]).await;
    }
    let cp = Arc::new(cp);

    let start = Instant::now();
    let summary = Orchestrator::new(cp.clone(), Arc::new(RateGate::per_second(20)))
        .run(&[GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod"))])
        .await;

    assert_eq!(summary.applied(), 25);
    assert!(start.elapsed() >= Duration::from_millis(1200));

    let updates = cp.updates().await;
    for pair in updates.windows(2) {
        assert!(pair[1].started_at - pair[0].started_at >= Duration::from_millis(49));
    }
}

#[tokio::test]
async fn stopping_twice_is_idempotent() {
    let cp = prod_and_dev().await;
    let orchestrator = Orchestrator::new(cp.clone(), fast_gate());
    let groups = [GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod"))];

    let first = orchestrator.run(&groups).await;
    let second = orchestrator.run(&groups).await;

    for summary in [&first, &second] {
        assert_eq!(summary.results.len(), 3);
        assert!(summary.results.iter().all(|r| r.outcome == Outcome::Applied(0)));
    }
}

#[tokio::test]
async fn pipelines_run_after_services() {
    let cp = prod_and_dev().await;
    cp.add_pipeline("Pipeline1").await;

    let config = RunConfig {
        groups: vec![GroupConfig::stop("dev", TagPredicate::all_of("Env", "dev"))],
        pipelines: vec!["Pipeline1".into(), "Pipeline2".into()],
        ..Default::default()
    };
    let summary = Orchestrator::new(cp.clone(), fast_gate()).run_config(&config).await;

    assert_eq!(summary.pipelines.len(), 2);
    assert!(matches!(summary.pipelines[0].outcome, PipelineOutcome::Started { .. }));
    assert_eq!(
        summary.pipelines[1].outcome,
        PipelineOutcome::Skipped(SkipReason::NotFound)
    );
    assert_eq!(cp.pipeline_starts().await, vec!["Pipeline1"]);
    assert!(summary.is_success());
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_run_lets_in_flight_call_finish() {
    let cp = InMemoryControlPlane::new().with_call_latency(Duration::from_millis(100));
    cp.add_cluster("c", &[("Env", "prod")]).await;
    for i in 0..5 {
        cp.add_service("c", &format!("svc/c/s{i}"), &[]).await;
    }
    let cp = Arc::new(cp);
    let (tx, rx) = tokio::sync::watch::channel(false);

    let orchestrator = Orchestrator::new(cp.clone(), Arc::new(RateGate::per_second(20)))
        .with_shutdown(rx);
    let run = tokio::spawn(async move {
        orchestrator
            .run(&[GroupConfig::stop("prod", TagPredicate::all_of("Env", "prod"))])
            .await
    });

    // Lands while the second call (started at 100ms) is in flight.
    tokio::time::sleep(Duration::from_millis(150)).await;
    tx.send(true).unwrap();
    let summary = run.await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.applied(), 2);
    assert_eq!(
        summary.results.last().map(|r| &r.outcome),
        Some(&Outcome::Skipped(SkipReason::Cancelled))
    );
    assert_eq!(cp.updates().await.len(), 2);
}
