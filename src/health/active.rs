//! Active health checking over HTTP(S).
//!
//! # Responsibilities
//! - Probe an upstream's health path
//! - Update the worker's active set from the result

use std::collections::HashSet;

use tokio::time;

use crate::config::{HealthCheckConfig, UpstreamTarget};
use crate::error::GatewayError;
use crate::health::state::ActiveSet;
use crate::health::HealthChecker;
use crate::observability::metrics;
use crate::proxy::upstream;

pub struct HttpHealthChecker {
    active: ActiveSet,
    config: HealthCheckConfig,
    client: reqwest::Client,
}

impl HttpHealthChecker {
    pub fn new(config: HealthCheckConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle)
            .connect_timeout(config.timeout())
            .user_agent("cluster-gateway-health-check")
            .no_proxy()
            .build()
            .map_err(std::io::Error::other)?;

        Ok(Self {
            active: ActiveSet::new(),
            config,
            client,
        })
    }

    fn probe_path<'a>(&'a self, upstream: &'a UpstreamTarget) -> &'a str {
        upstream.health_path.as_deref().unwrap_or(&self.config.path)
    }

    /// Run the probe and report whether it returned 200 in time.
    async fn probe(&self, upstream: &UpstreamTarget) -> bool {
        let url = match upstream::endpoint(upstream, self.probe_path(upstream)) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(upstream = %upstream.id, error = %e, "Failed to build health check request");
                return false;
            }
        };

        match time::timeout(self.config.timeout(), self.client.get(url).send()).await {
            Ok(Ok(response)) => {
                let healthy = response.status() == reqwest::StatusCode::OK;
                if !healthy {
                    tracing::warn!(upstream = %upstream.id, status = %response.status(), "Health check failed: non-200 status");
                }
                healthy
            }
            Ok(Err(e)) => {
                tracing::warn!(upstream = %upstream.id, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(upstream = %upstream.id, "Health check failed: timeout");
                false
            }
        }
    }
}

impl HealthChecker for HttpHealthChecker {
    async fn check_health(&self, upstream: &UpstreamTarget) -> bool {
        let healthy = self.probe(upstream).await;

        if healthy {
            if self.active.activate(&upstream.id) {
                tracing::info!(upstream = %upstream.id, "Upstream marked active");
            }
        } else if self.active.deactivate(&upstream.id) {
            tracing::warn!(upstream = %upstream.id, "Upstream marked inactive");
        }

        metrics::record_upstream_health(&upstream.id, healthy);
        healthy
    }

    fn active_upstreams(&self) -> HashSet<String> {
        self.active.snapshot()
    }

    fn is_upstream_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    fn mark_active(&self, id: &str) {
        self.active.activate(id);
    }
}
