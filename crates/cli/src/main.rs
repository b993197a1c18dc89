//! Performance Portal CLI
//!
//! Sizes an application against live cluster capacity and generates its
//! Kubernetes manifests and Grafana dashboard.

mod cluster;
mod commands;
mod config;
mod output;
mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::{capacity, generate, plan};
use portal_lib::{AppLanguage, AppProfile, PolicyConfig, PortalMetrics, Tier};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Performance Portal CLI
#[derive(Parser)]
#[command(name = "perf-portal")]
#[command(author, version, about = "Performance Portal: capacity-aware Kubernetes manifest generator", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Where to read node capacity from
    #[arg(long, value_enum, global = true)]
    pub source: Option<cluster::CapacitySource>,

    /// Policy configuration file (TOML, JSON or YAML)
    #[arg(long, env = "PERF_PORTAL_POLICY", global = true)]
    pub policy_file: Option<PathBuf>,

    /// Fail instead of falling back when the cluster reports unparseable capacity
    #[arg(long, global = true)]
    pub strict_capacity: bool,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Write run metrics in Prometheus text format to this file
    #[arg(long, global = true)]
    pub metrics_file: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate manifests and dashboard into the output directory
    Generate {
        #[command(flatten)]
        app: AppArgs,

        /// Output directory (default: ./output)
        #[arg(long, short)]
        output_dir: Option<PathBuf>,
    },

    /// Show the computed sizing, scaling and safety plan without writing files
    Plan {
        #[command(flatten)]
        app: AppArgs,
    },

    /// Show the cluster capacity snapshot
    Capacity,
}

#[derive(Args)]
pub struct AppArgs {
    /// Name of the application
    #[arg(long)]
    pub name: String,

    /// Expected peak requests per second
    #[arg(long, default_value_t = 100)]
    pub rps: u64,

    /// Docker image repository
    #[arg(long, default_value = portal_lib::profile::DEFAULT_IMAGE_REPO)]
    pub image: String,

    /// App language (java, go, python, dotnet)
    #[arg(long, default_value = "java")]
    pub lang: AppLanguage,

    /// Target P99 latency in milliseconds
    #[arg(long, default_value_t = portal_lib::profile::DEFAULT_LATENCY_SLA_MS)]
    pub latency: u32,

    /// Target tier - production or development (prod, dev)
    #[arg(long, default_value = "prod")]
    pub tier: Tier,

    /// Namespace (defaults to the configured namespace, then perf-test)
    #[arg(long, short)]
    pub namespace: Option<String>,

    /// Fraction of average node CPU per instance
    #[arg(long, default_value_t = portal_lib::profile::DEFAULT_CPU_PERCENT)]
    pub cpu_percent: f64,

    /// Fraction of average node memory per instance
    #[arg(long, default_value_t = portal_lib::profile::DEFAULT_MEM_PERCENT)]
    pub mem_percent: f64,

    /// Ingress host name
    #[arg(long)]
    pub ingress_host: Option<String>,

    /// Skip Prometheus annotations and the ServiceMonitor
    #[arg(long)]
    pub no_monitoring: bool,
}

impl AppArgs {
    /// Build the profile; validation happens when the plan is built
    pub fn into_profile(self, default_namespace: Option<&str>) -> AppProfile {
        let mut profile = AppProfile::new(self.name, self.rps)
            .with_tier(self.tier)
            .with_language(self.lang)
            .with_footprint(self.cpu_percent, self.mem_percent);
        profile.image_repo = self.image;
        profile.latency_sla_ms = self.latency;
        profile.monitoring_enabled = !self.no_monitoring;
        if let Some(namespace) = self.namespace.as_deref().or(default_namespace) {
            profile.namespace = namespace.to_string();
        }
        if let Some(host) = self.ingress_host {
            profile.ingress_host = host;
        }
        profile
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let user_config = config::Config::load()?;

    let policy_file = cli.policy_file.clone().or_else(|| user_config.policy_file.clone());
    let policy = PolicyConfig::load(policy_file.as_deref()).context("Failed to load policy configuration")?;

    let source = cli
        .source
        .or(user_config.capacity_source)
        .unwrap_or_default();
    let kubeconfig = config::kubeconfig_path(cli.kubeconfig.as_deref());
    let provider = cluster::capacity_provider(source, kubeconfig, cli.context.clone(), &policy);

    let namespace = user_config.default_namespace.as_deref();

    // Execute command
    match cli.command {
        Commands::Generate { app, output_dir } => {
            let output_dir = output_dir
                .or_else(|| user_config.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(config::DEFAULT_OUTPUT_DIR));
            generate::generate(
                &provider,
                &policy,
                app.into_profile(namespace),
                &output_dir,
                cli.strict_capacity,
            )
            .await?;
        }
        Commands::Plan { app } => {
            plan::show_plan(
                &provider,
                &policy,
                app.into_profile(namespace),
                cli.strict_capacity,
                cli.format,
            )
            .await?;
        }
        Commands::Capacity => {
            capacity::show_capacity(&provider, cli.strict_capacity, cli.format).await?;
        }
    }

    if let Some(path) = &cli.metrics_file {
        let text = PortalMetrics::new()
            .encode_text()
            .context("Failed to encode run metrics")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics file {}", path.display()))?;
    }

    Ok(())
}
