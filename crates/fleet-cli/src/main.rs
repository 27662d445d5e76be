use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fleet_aws::AwsSettings;
use fleet_core::Tag;

mod commands;
mod report;

use commands::config::{parse_desired, parse_tag};

#[derive(Parser)]
#[command(
    name = "fleetctl",
    about = "FleetSwitch — tag-driven bulk scaling for ECS services",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Maximum mutation calls per second (overrides the config file)
    #[arg(long, global = true)]
    rate: Option<u32>,
    /// Report format on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
    /// Log format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
    /// AWS region (default: provider chain)
    #[arg(long, global = true)]
    region: Option<String>,
    /// AWS shared-config profile
    #[arg(long, global = true)]
    profile: Option<String>,
    /// Per-operation AWS timeout in seconds, retries included
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the groups, targets and pipelines in a TOML or JSON file
    Apply {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Scale services in clusters tagged KEY=VALUE.
    ///
    /// Each service's count is looked up by its tag values in --desired;
    /// services with no mapped value get --default-count.
    Start {
        #[arg(long, value_parser = parse_tag)]
        tag: Tag,
        /// SELECTOR=COUNT, repeatable
        #[arg(long, value_parser = parse_desired)]
        desired: Vec<(String, u32)>,
        #[arg(long, default_value_t = 1)]
        default_count: u32,
        /// Match --desired selectors against service names instead of tag values
        #[arg(long)]
        by_name: bool,
    },
    /// Scale to zero every service in clusters carrying any of the tags
    Stop {
        #[arg(long = "tag", value_parser = parse_tag, required = true)]
        tags: Vec<Tag>,
    },
    /// Scale named services in one cluster to zero
    StopServices {
        #[arg(long)]
        cluster: String,
        #[arg(long, num_args = 1.., required = true)]
        services: Vec<String>,
    },
    /// Scale named services in one cluster
    StartServices {
        #[arg(long)]
        cluster: String,
        #[arg(long, num_args = 1.., required = true)]
        services: Vec<String>,
        /// SERVICE=COUNT, repeatable
        #[arg(long, value_parser = parse_desired)]
        desired: Vec<(String, u32)>,
        #[arg(long, default_value_t = 1)]
        default_count: u32,
    },
    /// Start a new execution of each pipeline
    StartPipelines {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Read the run from environment variables (CLUSTERS, STOP_TAGS, ...)
    Env {
        #[command(subcommand)]
        action: EnvAction,
        /// File read for variables the environment does not set
        #[arg(long, global = true, default_value = ".env")]
        env_file: PathBuf,
    },
}

#[derive(Subcommand)]
enum EnvAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new("info,aws_config=warn,aws_smithy_runtime=warn")?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn build_config(command: Commands) -> anyhow::Result<fleet_core::RunConfig> {
    use commands::config;

    Ok(match command {
        Commands::Apply { config: path } => config::from_file(&path)?,
        Commands::Start {
            tag,
            desired,
            default_count,
            by_name,
        } => config::start(tag, desired, default_count, by_name),
        Commands::Stop { tags } => config::stop(tags)?,
        Commands::StopServices { cluster, services } => {
            config::services(cluster, services, Default::default(), 0)
        }
        Commands::StartServices {
            cluster,
            services,
            desired,
            default_count,
        } => config::services(cluster, services, desired.into_iter().collect(), default_count),
        Commands::StartPipelines { names } => config::pipelines(names),
        Commands::Env { action, env_file } => {
            config::from_env(matches!(action, EnvAction::Start), &env_file)?
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = commands::run::finalize(build_config(cli.command)?, cli.rate)?;
    let settings = AwsSettings {
        region: cli.region,
        profile: cli.profile,
        operation_timeout: Duration::from_secs(cli.timeout_secs),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received, finishing in-flight call");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "failed to install CTRL+C handler"),
        }
    });

    commands::run::run(config, &settings, shutdown_rx, cli.output).await
}
