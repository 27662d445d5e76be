//! fleet-orchestrator: tag-based discovery and rate-limited bulk scaling.
//!
//! Resolves tag predicates into clusters and services, maps each service to
//! a desired task count, and applies the counts one call at a time through a
//! shared rate gate, isolating failures to the service that caused them.
//!
//! # Components
//!
//! - **`control_plane`**: the `ControlPlane` trait every cloud backend implements
//! - **`tags`**: tag resolver (read-only lookups)
//! - **`discovery`**: paginated cluster listing filtered by predicate
//! - **`enumerator`**: lazy, cursor-paginated service enumeration
//! - **`gate`**: minimum-interval gate shared by all mutations
//! - **`mutator`**: one desired-count update per call, classified outcome
//! - **`orchestrator`**: composes the above into a run
//! - **`summary`**: per-service outcomes and run counters
//! - **`memory`**: in-memory control plane for tests and fixtures

pub mod control_plane;
pub mod discovery;
pub mod enumerator;
pub mod gate;
pub mod memory;
pub mod mutator;
pub mod orchestrator;
pub mod summary;
pub mod tags;

pub use control_plane::{ApiError, ApiResult, ControlPlane, Page};
pub use discovery::{Discovery, GroupSetupError, discover_clusters};
pub use enumerator::{ServiceEnumerator, enumerate_services};
pub use gate::RateGate;
pub use memory::InMemoryControlPlane;
pub use mutator::Mutator;
pub use orchestrator::Orchestrator;
pub use summary::{
    Failure, FailureKind, Outcome, PipelineOutcome, PipelineResult, RunResult, RunSummary,
    SkipReason,
};
pub use tags::{TagLookupError, TagResolver};
