//! Rate-limited mutator: applies one desired-count change per call.
//!
//! Every call goes through the shared [`RateGate`] and the resulting API
//! error (if any) is classified into an [`Outcome`]. There is no retry here;
//! the gate keeps the throttling probability low, and a caller wanting
//! retries can wrap [`Mutator::apply_desired_count`].

use std::sync::Arc;

use tracing::{error, info, warn};

use fleet_core::ServiceRef;

use crate::control_plane::ControlPlane;
use crate::gate::RateGate;
use crate::summary::{Outcome, PipelineOutcome};

pub struct Mutator<C> {
    client: Arc<C>,
    gate: Arc<RateGate>,
}

impl<C> Clone for Mutator<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<C: ControlPlane> Mutator<C> {
    pub fn new(client: Arc<C>, gate: Arc<RateGate>) -> Self {
        Self { client, gate }
    }

    /// Set the desired task count of `service`.
    pub async fn apply_desired_count(&self, service: &ServiceRef, count: u32) -> Outcome {
        let result = {
            let _permit = self.gate.acquire().await;
            self.client
                .update_desired_count(&service.cluster, &service.display_name, count)
                .await
        };

        let outcome = match result {
            Ok(()) => Outcome::Applied(count),
            Err(e) => Outcome::from_api_error(&e),
        };

        match &outcome {
            Outcome::Applied(count) => info!(
                service = %service.display_name,
                cluster = %service.cluster,
                desired_count = count,
                "desired count updated"
            ),
            Outcome::Skipped(reason) => warn!(
                service = %service.display_name,
                cluster = %service.cluster,
                reason = reason.as_str(),
                "service skipped"
            ),
            Outcome::Failed(failure) => error!(
                service = %service.display_name,
                cluster = %service.cluster,
                kind = ?failure.kind,
                error = %failure.message,
                "desired count update failed"
            ),
        }

        outcome
    }

    /// Start an execution of the pipeline `name`.
    pub async fn start_pipeline(&self, name: &str) -> PipelineOutcome {
        let result = {
            let _permit = self.gate.acquire().await;
            self.client.start_pipeline(name).await
        };

        match result {
            Ok(execution_id) => {
                info!(
                    pipeline = name,
                    execution_id = execution_id.as_deref().unwrap_or("-"),
                    "pipeline execution started"
                );
                PipelineOutcome::Started { execution_id }
            }
            Err(e) => {
                let outcome = PipelineOutcome::from(Outcome::from_api_error(&e));
                match &outcome {
                    PipelineOutcome::Skipped(_) => {
                        warn!(pipeline = name, "pipeline not found, skipping")
                    }
                    _ => error!(pipeline = name, error = %e, "pipeline start failed"),
                }
                outcome
            }
        }
    }
}
