//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! start_periodic_checks:
//!     mark every upstream active
//!     → every interval: probe all upstreams concurrently (active.rs)
//!     → 200 within timeout → active, anything else → inactive (state.rs)
//!
//! request handler:
//!     active_upstreams() snapshot → load balancer filter
//! ```
//!
//! # Design Decisions
//! - One checker per worker, injected into the request handler
//! - A failing probe is logged and never stops the loop
//! - Probes use their own client, separate from the data path

pub mod active;
pub mod state;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::UpstreamTarget;

pub use active::HttpHealthChecker;
pub use state::ActiveSet;

/// Tracks which upstreams are currently usable.
pub trait HealthChecker: Send + Sync + 'static {
    /// Probe one upstream now and record the outcome.
    fn check_health(&self, upstream: &UpstreamTarget) -> impl Future<Output = bool> + Send;

    /// Snapshot of the active ids.
    fn active_upstreams(&self) -> HashSet<String>;

    fn is_upstream_active(&self, id: &str) -> bool;

    /// Mark an upstream active without probing it.
    fn mark_active(&self, id: &str);

    /// Mark every upstream active, then probe them all every `interval` until
    /// `shutdown` fires.
    fn start_periodic_checks(
        self: Arc<Self>,
        upstreams: Vec<UpstreamTarget>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()>
    where
        Self: Sized,
    {
        for upstream in &upstreams {
            self.mark_active(&upstream.id);
        }

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            upstreams = upstreams.len(),
            "Health monitor starting"
        );

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        join_all(upstreams.iter().map(|u| self.check_health(u))).await;
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Health monitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}
