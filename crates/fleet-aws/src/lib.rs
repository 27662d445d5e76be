//! fleet-aws: AWS backend for FleetSwitch.
//!
//! Implements [`fleet_orchestrator::ControlPlane`] over Amazon ECS (cluster,
//! service and tag listing, `UpdateService`) and CodePipeline
//! (`StartPipelineExecution`). SDK errors are mapped onto the orchestrator's
//! not-found / client / unexpected kinds.

pub mod client;
pub mod error;

pub use client::{AwsControlPlane, AwsSettings};
pub use error::classify_code;
