//! Execute a [`RunConfig`] against AWS and render the summary.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;

use fleet_aws::{AwsControlPlane, AwsSettings};
use fleet_core::RunConfig;
use fleet_orchestrator::{Orchestrator, RateGate, RunSummary};

use crate::OutputFormat;
use crate::report::{exit_code, format_report};

/// Apply `rate` over the configured limit, then validate.
pub fn finalize(mut config: RunConfig, rate: Option<u32>) -> anyhow::Result<RunConfig> {
    if let Some(rate) = rate {
        config.rate_limit.calls_per_second = rate;
    }
    config.validate().context("invalid run configuration")?;
    Ok(config)
}

pub async fn run(
    config: RunConfig,
    settings: &AwsSettings,
    shutdown: watch::Receiver<bool>,
    output: OutputFormat,
) -> anyhow::Result<ExitCode> {
    if config.is_empty() {
        info!("nothing to do");
    }

    let client = Arc::new(AwsControlPlane::from_settings(settings).await);
    let gate = Arc::new(RateGate::new(config.rate_limit.min_interval()));
    let summary = Orchestrator::new(client, gate)
        .with_shutdown(shutdown)
        .run_config(&config)
        .await;

    render(&summary, output)?;
    Ok(exit_code(&summary))
}

pub fn render(summary: &RunSummary, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Text => print!("{}", format_report(summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_flag_overrides_config() {
        let config = finalize(RunConfig::default(), Some(5)).unwrap();
        assert_eq!(config.rate_limit.calls_per_second, 5);

        let config = finalize(RunConfig::default(), None).unwrap();
        assert_eq!(
            config.rate_limit.calls_per_second,
            fleet_core::config::DEFAULT_CALLS_PER_SECOND
        );
    }

    #[test]
    fn zero_rate_is_a_config_error() {
        assert!(finalize(RunConfig::default(), Some(0)).is_err());
    }

    #[test]
    fn json_summary_serializes() {
        let value = serde_json::to_value(RunSummary::default()).unwrap();
        assert_eq!(value["cancelled"], false);
        assert!(value["results"].as_array().unwrap().is_empty());
    }
}
