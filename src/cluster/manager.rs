//! Process roles and the top-level lifecycle of each.
//!
//! # Data Flow
//! ```text
//! primary: config file → worker pool → front server → wait for signal
//!              → shutdown broadcast → listeners drain → workers stop
//! worker:  GATEWAY_CONFIG → request handler + health loop
//!              → serve stdin/stdout until EOF or signal
//! ```

use std::sync::Arc;

use crate::cluster::launcher::ProcessLauncher;
use crate::cluster::worker;
use crate::cluster::workers::WorkerManager;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::FrontServer;
use crate::lifecycle::{wait_for_signal, Shutdown};
use crate::proxy::RequestHandler;

/// Environment flag selecting the process role.
pub const ROLE_ENV: &str = "GATEWAY_ROLE";
pub const WORKER_ROLE: &str = "worker";
/// Worker id assigned by the primary, for log correlation.
pub const WORKER_ID_ENV: &str = "GATEWAY_WORKER_ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Primary,
    Worker,
}

impl Role {
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(ROLE_ENV).ok().as_deref())
    }

    fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(WORKER_ROLE) => Role::Worker,
            _ => Role::Primary,
        }
    }
}

/// Runs the primary: worker pool plus front server.
pub struct ClusterManager {
    config: GatewayConfig,
}

impl ClusterManager {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Start everything, serve until a shutdown signal, then stop in order.
    pub async fn run_primary(self) -> Result<(), GatewayError> {
        let shutdown = Shutdown::new();
        let launcher = Arc::new(ProcessLauncher::current_exe(&self.config)?);
        let workers = WorkerManager::new(launcher, self.config.server.worker_count(), shutdown.clone());

        if let Err(e) = workers.initialize_workers() {
            shutdown.trigger();
            workers.stop().await;
            return Err(e);
        }

        let server = FrontServer::new(Arc::new(self.config.server), workers.clone());
        let running = match server.start(&shutdown).await {
            Ok(running) => running,
            Err(e) => {
                shutdown.trigger();
                workers.stop().await;
                return Err(e);
            }
        };

        wait_for_signal().await;
        tracing::info!("Shutdown signal received, draining");

        shutdown.trigger();
        running.wait().await;
        workers.stop().await;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Worker entry point: serve dispatches on stdin/stdout.
pub async fn run_worker(config: GatewayConfig) -> Result<(), GatewayError> {
    let worker_id = std::env::var(WORKER_ID_ENV).unwrap_or_else(|_| "-".to_string());
    let shutdown = Shutdown::new();

    let (handler, monitor) = RequestHandler::from_config(Arc::new(config.server), shutdown.subscribe())?;
    tracing::info!(worker = %worker_id, pid = std::process::id(), "Worker ready");

    let result = tokio::select! {
        result = worker::serve(Arc::new(handler), tokio::io::stdin(), tokio::io::stdout(), shutdown.subscribe()) => result,
        _ = wait_for_signal() => Ok(()),
    };

    shutdown.trigger();
    if let Err(e) = monitor.await {
        tracing::error!(error = %e, "Health monitor task failed");
    }
    tracing::info!(worker = %worker_id, "Worker stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_flag() {
        assert_eq!(Role::from_flag(Some("worker")), Role::Worker);
        assert_eq!(Role::from_flag(Some("primary")), Role::Primary);
        assert_eq!(Role::from_flag(None), Role::Primary);
    }
}
