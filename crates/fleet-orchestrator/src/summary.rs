//! Run summary: the orchestrator's externally observable result.

use std::fmt;

use serde::Serialize;

use fleet_core::ServiceRef;

use crate::control_plane::ApiError;

/// Why a service was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The service vanished between discovery and mutation.
    NotFound,
    /// Shutdown was requested before the call was issued.
    Cancelled,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The API refused the call for a caller-correctable reason.
    ClientRejected,
    /// Transport, server or otherwise unclassified failure.
    Unexpected,
    /// The service's tags could not be read, so no count was resolved.
    TagLookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Terminal state of one service in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Applied(u32),
    Skipped(SkipReason),
    Failed(Failure),
}

impl Outcome {
    /// Classify a failed control-plane call.
    pub fn from_api_error(error: &ApiError) -> Self {
        match error {
            ApiError::NotFound(_) => Self::Skipped(SkipReason::NotFound),
            ApiError::Client { .. } => Self::Failed(Failure {
                kind: FailureKind::ClientRejected,
                message: error.to_string(),
            }),
            ApiError::Unexpected(message) => Self::Failed(Failure {
                kind: FailureKind::Unexpected,
                message: message.clone(),
            }),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied(count) => write!(f, "applied (desired count {count})"),
            Self::Skipped(reason) => write!(f, "skipped ({})", reason.as_str()),
            Self::Failed(failure) => write!(f, "failed ({failure})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Label of the group or target that produced this service.
    pub group: String,
    pub service: ServiceRef,
    pub outcome: Outcome,
}

/// Outcome of one pipeline start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Started { execution_id: Option<String> },
    Skipped(SkipReason),
    Failed(Failure),
}

impl From<Outcome> for PipelineOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Applied(_) => Self::Started { execution_id: None },
            Outcome::Skipped(reason) => Self::Skipped(reason),
            Outcome::Failed(failure) => Self::Failed(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    pub name: String,
    pub outcome: PipelineOutcome,
}

/// A whole group abandoned because its cluster listing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFailure {
    pub group: String,
    pub message: String,
}

/// A cluster whose service listing broke off part-way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterFailure {
    pub group: String,
    pub cluster: String,
    pub message: String,
}

/// A cluster left out of discovery because its tags were unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedResource {
    pub group: String,
    pub resource: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub results: Vec<RunResult>,
    pub pipelines: Vec<PipelineResult>,
    pub group_failures: Vec<GroupFailure>,
    pub cluster_failures: Vec<ClusterFailure>,
    pub excluded: Vec<ExcludedResource>,
    /// Shutdown stopped the run before every target was attempted.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn record(&mut self, group: &str, service: ServiceRef, outcome: Outcome) {
        self.results.push(RunResult {
            group: group.to_string(),
            service,
            outcome,
        });
    }

    pub fn applied(&self) -> usize {
        let services = self
            .results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Applied(_)))
            .count();
        let pipelines = self
            .pipelines
            .iter()
            .filter(|p| matches!(p.outcome, PipelineOutcome::Started { .. }))
            .count();
        services + pipelines
    }

    pub fn skipped(&self) -> usize {
        let services = self
            .results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Skipped(_)))
            .count();
        let pipelines = self
            .pipelines
            .iter()
            .filter(|p| matches!(p.outcome, PipelineOutcome::Skipped(_)))
            .count();
        services + pipelines
    }

    pub fn failed(&self) -> usize {
        let services = self.results.iter().filter(|r| r.outcome.is_failed()).count();
        let pipelines = self
            .pipelines
            .iter()
            .filter(|p| matches!(p.outcome, PipelineOutcome::Failed(_)))
            .count();
        services + pipelines
    }

    /// Failed service outcomes, for individual reporting.
    pub fn failures(&self) -> impl Iterator<Item = (&RunResult, &Failure)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            Outcome::Failed(f) => Some((r, f)),
            _ => None,
        })
    }

    /// No failed outcome and no abandoned group or cluster.
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.group_failures.is_empty() && self.cluster_failures.is_empty()
    }
}
