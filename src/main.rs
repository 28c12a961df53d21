//! Cluster gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────── PRIMARY ────────────────────────┐
//!   Client ──HTTP────▶│  front server (axum)  ──▶  worker pool (random pick)    │
//!   Client ──HTTPS───▶│  rustls listener              │            ▲            │
//!                     └───────────────────────────────┼────────────┼────────────┘
//!                                          stdin frame│            │stdout frame
//!                     ┌──────────────────────── WORKER (× N) ──────▼────────────┐
//!                     │  rule engine → health snapshot → load balancer          │
//!                     │      → proxy client (one retry) ──────────────▶ Upstream│
//!                     └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The same binary runs both roles; `GATEWAY_ROLE=worker` selects the worker.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cluster_gateway::cluster::{self, ClusterManager, Role};
use cluster_gateway::config::{load_config, loader::load_worker_config, GatewayConfig};
use cluster_gateway::observability::{logging::init_logging, metrics::init_metrics};

#[derive(Debug, Parser)]
#[command(name = "cluster-gateway", version, about = "Multi-process reverse-proxy gateway")]
struct Cli {
    /// Path to the YAML (or .toml) config file
    #[arg(short, long)]
    config: PathBuf,

    /// Override the number of worker processes
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    match Role::from_env() {
        Role::Worker => worker_main(),
        Role::Primary => primary_main(Cli::parse()),
    }
}

fn primary_main(cli: Cli) -> ExitCode {
    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.observability.log_level);

    if let Some(workers) = cli.workers {
        if workers == 0 {
            tracing::error!("--workers must be at least 1");
            return ExitCode::FAILURE;
        }
        config.server.workers = Some(workers);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = config.server.listen,
        workers = config.server.worker_count(),
        upstreams = config.server.upstreams.len(),
        rules = config.server.rules.len(),
        loadbalancer = ?config.server.loadbalancer,
        "cluster-gateway starting"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        start_metrics(&config);
        ClusterManager::new(config).run_primary().await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

fn start_metrics(config: &GatewayConfig) {
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse() {
        Ok(addr) => init_metrics(addr),
        Err(_) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

fn worker_main() -> ExitCode {
    let config = match load_worker_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(error = %e, "Worker could not read its configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.observability.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build worker runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(cluster::run_worker(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Worker failed");
            ExitCode::FAILURE
        }
    }
}
