//! ECS + CodePipeline implementation of [`ControlPlane`].

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_ecs::config::Region;
use tracing::{debug, info};

use fleet_core::{ClusterRef, TagSet};
use fleet_orchestrator::{ApiError, ApiResult, ControlPlane, Page};

use crate::error::classify;

/// Largest page `ListClusters` and `ListServices` accept.
const MAX_PAGE_SIZE: i32 = 100;

/// How to build the SDK clients.
#[derive(Debug, Clone)]
pub struct AwsSettings {
    /// Region override; falls back to the default provider chain.
    pub region: Option<String>,
    /// Named profile from the shared config files.
    pub profile: Option<String>,
    /// Upper bound on a single API operation, retries included.
    pub operation_timeout: Duration,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            operation_timeout: Duration::from_secs(30),
        }
    }
}

pub struct AwsControlPlane {
    ecs: aws_sdk_ecs::Client,
    pipelines: aws_sdk_codepipeline::Client,
}

impl AwsControlPlane {
    pub fn new(ecs: aws_sdk_ecs::Client, pipelines: aws_sdk_codepipeline::Client) -> Self {
        Self { ecs, pipelines }
    }

    /// Load credentials and region from the environment and build both clients.
    pub async fn from_settings(settings: &AwsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(settings.operation_timeout)
                .build(),
        );
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        info!(
            region = config.region().map(|r| r.as_ref()).unwrap_or("default"),
            "aws clients configured"
        );
        Self::new(
            aws_sdk_ecs::Client::new(&config),
            aws_sdk_codepipeline::Client::new(&config),
        )
    }
}

impl ControlPlane for AwsControlPlane {
    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        let out = self
            .ecs
            .list_clusters()
            .max_results(MAX_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| classify(e, |_| false))?;

        Ok(Page {
            items: out.cluster_arns().to_vec(),
            next_token: out.next_token().map(str::to_string),
        })
    }

    async fn list_services(
        &self,
        cluster: &ClusterRef,
        next_token: Option<String>,
    ) -> ApiResult<Page<String>> {
        let out = self
            .ecs
            .list_services()
            .cluster(cluster.as_str())
            .max_results(MAX_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| classify(e, |e| e.is_cluster_not_found_exception()))?;

        debug!(cluster = %cluster, services = out.service_arns().len(), "listed services");
        Ok(Page {
            items: out.service_arns().to_vec(),
            next_token: out.next_token().map(str::to_string),
        })
    }

    async fn list_tags(&self, resource_id: &str) -> ApiResult<TagSet> {
        let out = self
            .ecs
            .list_tags_for_resource()
            .resource_arn(resource_id)
            .send()
            .await
            .map_err(|e| classify(e, |e| e.is_cluster_not_found_exception()))?;

        Ok(out
            .tags()
            .iter()
            .filter_map(|t| Some((t.key()?, t.value().unwrap_or_default())))
            .collect())
    }

    async fn update_desired_count(
        &self,
        cluster: &ClusterRef,
        service: &str,
        desired_count: u32,
    ) -> ApiResult<()> {
        let desired = i32::try_from(desired_count).map_err(|_| {
            ApiError::client(
                "InvalidParameterException",
                format!("desired count {desired_count} out of range"),
            )
        })?;

        self.ecs
            .update_service()
            .cluster(cluster.as_str())
            .service(service)
            .desired_count(desired)
            .send()
            .await
            .map_err(|e| {
                classify(e, |e| {
                    e.is_service_not_found_exception()
                        || e.is_service_not_active_exception()
                        || e.is_cluster_not_found_exception()
                })
            })?;
        Ok(())
    }

    async fn start_pipeline(&self, name: &str) -> ApiResult<Option<String>> {
        let out = self
            .pipelines
            .start_pipeline_execution()
            .name(name)
            .send()
            .await
            .map_err(|e| classify(e, |e| e.is_pipeline_not_found_exception()))?;

        Ok(out.pipeline_execution_id().map(str::to_string))
    }
}
