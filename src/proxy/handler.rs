//! Worker-side request handling.
//!
//! # Data Flow
//! ```text
//! DispatchMessage.url
//!     → rule lookup (404 when nothing matches)
//!     → resolve rule ids to targets
//!     → active snapshot → load balancer
//!     → proxy client
//!     → on failure: fresh snapshot minus the failed id → one retry
//!     → ReplyMessage
//! ```
//!
//! # Design Decisions
//! - At most two upstream attempts per request
//! - Every outcome is a reply; nothing here ends the worker

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{Rule, ServerConfig, UpstreamTarget};
use crate::error::GatewayError;
use crate::health::{HealthChecker, HttpHealthChecker};
use crate::load_balancer::{self, LoadBalancer};
use crate::protocol::{DispatchMessage, ReplyMessage};
use crate::proxy::client::{HttpProxyClient, ProxyClient};
use crate::routing::{PrefixRuleEngine, RuleEngine};

pub struct RequestHandler<H, P> {
    config: Arc<ServerConfig>,
    health: Arc<H>,
    client: P,
    balancer: Box<dyn LoadBalancer>,
    rules: Box<dyn RuleEngine>,
}

impl RequestHandler<HttpHealthChecker, HttpProxyClient> {
    /// Build the production handler for one worker and start its health loop.
    pub fn from_config(
        config: Arc<ServerConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(Self, JoinHandle<()>), GatewayError> {
        let health = Arc::new(HttpHealthChecker::new(config.health_check.clone())?);
        let monitor = health.clone().start_periodic_checks(
            config.upstreams.clone(),
            config.health_check.interval(),
            shutdown,
        );

        let client = HttpProxyClient::new(&config.proxy)?;
        let balancer = load_balancer::from_strategy(config.loadbalancer);
        let handler = Self::new(config, health, client, balancer, Box::new(PrefixRuleEngine::new()));
        Ok((handler, monitor))
    }
}

impl<H: HealthChecker, P: ProxyClient> RequestHandler<H, P> {
    pub fn new(
        config: Arc<ServerConfig>,
        health: Arc<H>,
        client: P,
        balancer: Box<dyn LoadBalancer>,
        rules: Box<dyn RuleEngine>,
    ) -> Self {
        Self {
            config,
            health,
            client,
            balancer,
            rules,
        }
    }

    pub fn health(&self) -> &Arc<H> {
        &self.health
    }

    pub async fn handle_request(&self, message: &DispatchMessage) -> ReplyMessage {
        match self.route(message).await {
            Ok(data) => ReplyMessage::success(data),
            Err(e) => {
                tracing::warn!(request_id = %message.id, url = %message.url, error = %e, "Request failed");
                ReplyMessage::from(&e)
            }
        }
    }

    async fn route(&self, message: &DispatchMessage) -> Result<String, GatewayError> {
        let url = message.url.as_str();
        let rule = self
            .rules
            .find_matching_rule(url, &self.config.rules)
            .ok_or_else(|| GatewayError::RuleNotFound(url.to_string()))?;

        let candidates = self.resolve(rule);
        if candidates.is_empty() {
            return Err(GatewayError::NoActiveUpstreams(format!(
                "No valid upstreams found for rule: {}",
                describe(rule)
            )));
        }

        let active = self.health.active_upstreams();
        if !candidates.iter().any(|u| active.contains(&u.id)) {
            return Err(no_active(rule));
        }

        let selected = self
            .balancer
            .select_upstream(&candidates, &active)
            .ok_or_else(|| {
                GatewayError::NoActiveUpstreams(format!(
                    "Load balancer could not select an upstream for rule: {}",
                    describe(rule)
                ))
            })?;

        tracing::debug!(
            request_id = %message.id,
            proto = message.header("x-forwarded-proto").unwrap_or("http"),
            upstream = %selected.id,
            "Routing request"
        );

        let first_error = match self.client.make_request(&selected, url).await {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };
        tracing::warn!(upstream = %selected.id, error = %first_error, "Upstream request failed, retrying");

        let mut active = self.health.active_upstreams();
        active.remove(&selected.id);
        let fallback = self
            .balancer
            .select_upstream(&candidates, &active)
            .ok_or_else(|| no_active(rule))?;

        self.client.make_request(&fallback, url).await.map_err(|e| {
            tracing::error!(upstream = %fallback.id, error = %e, "Retry failed");
            no_active(rule)
        })
    }

    /// Rule ids mapped to configured targets; unknown ids are dropped.
    fn resolve(&self, rule: &Rule) -> Vec<UpstreamTarget> {
        rule.upstreams
            .iter()
            .filter_map(|id| self.config.upstream(id).cloned())
            .collect()
    }
}

fn describe(rule: &Rule) -> String {
    serde_json::to_string(rule).unwrap_or_else(|_| rule.path.clone())
}

fn no_active(rule: &Rule) -> GatewayError {
    GatewayError::NoActiveUpstreams(format!(
        "No active upstreams available for rule: {}",
        describe(rule)
    ))
}
