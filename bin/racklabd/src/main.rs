//! ---
//! rl_section: "01-core-runtime"
//! rl_subsection: "binary"
//! rl_type: "source"
//! rl_scope: "code"
//! rl_description: "Binary entrypoint for the RackLab daemon."
//! rl_version: "v0.1.0"
//! rl_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use racklab_api::{spawn_api_server, ApiState};
use racklab_common::config::{AppConfig, SimulationConfig};
use racklab_common::logging::init_tracing;
use racklab_engine::{execute_plan_file, ExecutionOptions};
use racklab_metrics::{new_registry, serve_metrics, RunMetrics};
use tokio::signal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "RackLab hardware stress-test harness", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Serve the run-tracking API and metrics exporter")]
    Serve,
    #[command(about = "Execute a plan file and print its report as JSON")]
    Exec {
        /// Plan document to execute
        plan: PathBuf,

        /// Override the sensor jitter seed from configuration
        #[arg(long)]
        seed: Option<u64>,

        /// Sleep between modeled load seconds for a watchable demo
        #[arg(long)]
        paced: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/racklab.toml"));
    candidates.push(PathBuf::from("configs/racklab.dev.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("racklabd", &config.logging)?;
    if let Some(source) = &loaded.source {
        info!(config_path = %source.display(), "configuration loaded");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Exec { plan, seed, paced } => exec_plan(&config, &plan, seed, paced),
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    if !config.api.enabled && !config.metrics.enabled {
        bail!("both api and metrics are disabled; nothing to serve");
    }

    let registry = new_registry();
    let run_metrics = if config.metrics.enabled {
        Some(RunMetrics::new(&registry)?)
    } else {
        None
    };

    let state = Arc::new(ApiState::new(
        config.api.effective_api_key(),
        execution_options(&config.simulation, None, false),
        run_metrics,
    ));

    let api_server = if config.api.enabled {
        Some(spawn_api_server(state.clone(), config.api.listen).await?)
    } else {
        None
    };
    let metrics_server = if config.metrics.enabled {
        Some(serve_metrics(registry.clone(), config.metrics.listen).await?)
    } else {
        None
    };

    info!("racklabd running; press ctrl-c to stop");
    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    if let Some(server) = api_server {
        server.shutdown().await?;
    }
    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    info!("racklabd shutdown complete");
    Ok(())
}

fn exec_plan(config: &AppConfig, plan: &Path, seed: Option<u64>, paced: bool) -> Result<()> {
    let options = execution_options(&config.simulation, seed, paced);
    let report = execute_plan_file(plan, &options)
        .with_context(|| format!("failed to execute plan {}", plan.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!(
        "executed {} steps ({})",
        report.len(),
        if report.has_failures() {
            "with failures"
        } else {
            "all passing"
        }
    );
    Ok(())
}

fn execution_options(
    simulation: &SimulationConfig,
    seed_override: Option<u64>,
    force_paced: bool,
) -> ExecutionOptions {
    let mut options = ExecutionOptions::seeded(seed_override.unwrap_or(simulation.random_seed));
    if force_paced || simulation.paced {
        options = options.with_pacing(simulation.tick_pause);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn options_follow_configuration() {
        let simulation = SimulationConfig::default();
        let options = execution_options(&simulation, None, false);
        assert_eq!(options.seed, simulation.random_seed);
        assert!(options.tick_pause.is_none());
    }

    #[test]
    fn cli_flags_override_configuration() {
        let simulation = SimulationConfig::default();
        let options = execution_options(&simulation, Some(99), true);
        assert_eq!(options.seed, 99);
        assert_eq!(options.tick_pause, Some(Duration::from_millis(200)));
    }
}
