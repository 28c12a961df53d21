//! Outbound data-path client.
//!
//! # Responsibilities
//! - Issue one GET to a chosen upstream and return the full body
//! - Pool keep-alive connections per upstream
//! - Bound concurrent in-flight requests per upstream
//! - Fail with `Upstream` on connection error or timeout
//!
//! # Design Decisions
//! - Any HTTP status yields its body; only transport failures are errors
//! - Bodies are buffered, never streamed through

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::config::{ProxyClientConfig, UpstreamTarget};
use crate::error::GatewayError;
use crate::proxy::upstream;

/// Executes a single upstream request.
pub trait ProxyClient: Send + Sync + 'static {
    fn make_request(
        &self,
        upstream: &UpstreamTarget,
        path: &str,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;
}

/// reqwest-backed client with per-upstream concurrency limits.
#[derive(Debug)]
pub struct HttpProxyClient {
    client: reqwest::Client,
    limits: DashMap<String, Arc<Semaphore>>,
    max_per_upstream: usize,
}

impl HttpProxyClient {
    pub fn new(config: &ProxyClientConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_upstream)
            .timeout(config.timeout())
            .no_proxy()
            .build()
            .map_err(std::io::Error::other)?;

        Ok(Self {
            client,
            limits: DashMap::new(),
            max_per_upstream: config.max_connections_per_upstream.max(1),
        })
    }

    fn limit_for(&self, upstream_id: &str) -> Arc<Semaphore> {
        self.limits
            .entry(upstream_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_upstream)))
            .clone()
    }
}

fn upstream_error(upstream: &UpstreamTarget, reason: impl ToString) -> GatewayError {
    GatewayError::Upstream {
        id: upstream.id.clone(),
        reason: reason.to_string(),
    }
}

impl ProxyClient for HttpProxyClient {
    async fn make_request(
        &self,
        upstream: &UpstreamTarget,
        path: &str,
    ) -> Result<String, GatewayError> {
        let url = upstream::endpoint(upstream, path)?;

        let _permit = self
            .limit_for(&upstream.id)
            .acquire_owned()
            .await
            .map_err(|e| upstream_error(upstream, e))?;

        tracing::debug!(upstream = %upstream.id, url = %url, "Forwarding request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                upstream_error(upstream, "request timed out")
            } else {
                upstream_error(upstream, e)
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| upstream_error(upstream, e))?;

        tracing::debug!(
            upstream = %upstream.id,
            status = %status,
            bytes = body.len(),
            "Upstream responded"
        );
        Ok(body)
    }
}
