//! Human-readable run report and exit-code mapping.

use std::fmt::Write as _;
use std::process::ExitCode;

use fleet_orchestrator::{Outcome, PipelineOutcome, RunSummary};

/// Exit status when at least one target failed.
pub const EXIT_PARTIAL_FAILURE: u8 = 2;
/// Exit status when shutdown interrupted an otherwise clean run.
pub const EXIT_CANCELLED: u8 = 130;

pub fn format_report(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out);
    for result in &summary.results {
        let mark = match &result.outcome {
            Outcome::Applied(_) => "✓",
            Outcome::Skipped(_) => "-",
            Outcome::Failed(_) => "✗",
        };
        let _ = writeln!(
            out,
            "  {mark} {:<32} {:<24} {}",
            result.service.display_name, result.group, result.outcome
        );
    }

    for pipeline in &summary.pipelines {
        let line = match &pipeline.outcome {
            PipelineOutcome::Started { execution_id } => format!(
                "✓ pipeline {} started ({})",
                pipeline.name,
                execution_id.as_deref().unwrap_or("no execution id")
            ),
            PipelineOutcome::Skipped(reason) => {
                format!("- pipeline {} skipped ({})", pipeline.name, reason.as_str())
            }
            PipelineOutcome::Failed(failure) => {
                format!("✗ pipeline {} failed ({failure})", pipeline.name)
            }
        };
        let _ = writeln!(out, "  {line}");
    }

    if !summary.excluded.is_empty() {
        let _ = writeln!(out, "\nExcluded (tags unreadable):");
        for e in &summary.excluded {
            let _ = writeln!(out, "  • {} [{}]: {}", e.resource, e.group, e.message);
        }
    }

    if !summary.group_failures.is_empty() || !summary.cluster_failures.is_empty() {
        let _ = writeln!(out, "\nAbandoned:");
        for g in &summary.group_failures {
            let _ = writeln!(out, "  ✗ group {}: {}", g.group, g.message);
        }
        for c in &summary.cluster_failures {
            let _ = writeln!(out, "  ✗ cluster {} [{}]: {}", c.cluster, c.group, c.message);
        }
    }

    let failed: Vec<_> = summary.failures().collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nFailed services:");
        for (result, failure) in failed {
            let _ = writeln!(
                out,
                "  ✗ {} in {}: {failure}",
                result.service.display_name, result.service.cluster
            );
        }
    }

    let _ = writeln!(
        out,
        "\nApplied: {}  Skipped: {}  Failed: {}",
        summary.applied(),
        summary.skipped(),
        summary.failed()
    );
    let verdict = if !summary.is_success() {
        "partially failed"
    } else if summary.cancelled {
        "cancelled"
    } else {
        "succeeded"
    };
    let _ = writeln!(out, "Run {verdict}.");

    out
}

/// Failures dominate cancellation; a clean, complete run exits 0.
pub fn exit_code(summary: &RunSummary) -> ExitCode {
    if !summary.is_success() {
        ExitCode::from(EXIT_PARTIAL_FAILURE)
    } else if summary.cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::{ClusterRef, ServiceRef};
    use fleet_orchestrator::summary::GroupFailure;
    use fleet_orchestrator::{Failure, FailureKind, SkipReason};

    fn svc(name: &str) -> ServiceRef {
        ServiceRef::new(ClusterRef::new("arn:cluster/prod"), format!("svc/prod/{name}"))
    }

    fn mixed() -> RunSummary {
        let mut summary = RunSummary::default();
        summary.record("prod", svc("api"), Outcome::Applied(2));
        summary.record("prod", svc("gone"), Outcome::Skipped(SkipReason::NotFound));
        summary.record(
            "prod",
            svc("worker"),
            Outcome::Failed(Failure {
                kind: FailureKind::ClientRejected,
                message: "AccessDeniedException: nope".into(),
            }),
        );
        summary
    }

    #[test]
    fn lists_failures_individually() {
        let text = format_report(&mixed());
        assert!(text.contains("Failed services:"));
        assert!(text.contains("worker in arn:cluster/prod"));
        assert!(text.contains("AccessDeniedException: nope"));
        assert!(text.contains("Applied: 1  Skipped: 1  Failed: 1"));
        assert!(text.contains("Run partially failed."));
    }

    #[test]
    fn reports_abandoned_groups() {
        let summary = RunSummary {
            group_failures: vec![GroupFailure {
                group: "prod".into(),
                message: "cluster listing failed".into(),
            }],
            ..Default::default()
        };
        let text = format_report(&summary);
        assert!(text.contains("✗ group prod: cluster listing failed"));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(&RunSummary::default()), ExitCode::SUCCESS);
        assert_eq!(exit_code(&mixed()), ExitCode::from(EXIT_PARTIAL_FAILURE));

        let cancelled = RunSummary {
            cancelled: true,
            ..Default::default()
        };
        assert_eq!(exit_code(&cancelled), ExitCode::from(EXIT_CANCELLED));
    }
}
