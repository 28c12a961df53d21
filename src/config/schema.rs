//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits: the primary deserializes them from the
//! config file, workers from the JSON copy carried in their environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener, routing and upstream definitions.
    pub server: ServerConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Server configuration shared by the primary and every worker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Plain HTTP listen port.
    pub listen: u16,

    /// Number of worker processes (default: available parallelism).
    pub workers: Option<usize>,

    /// Upstream targets, addressed by id from rules.
    pub upstreams: Vec<UpstreamTarget>,

    /// Routing rules, evaluated in declared order.
    pub rules: Vec<Rule>,

    /// Load balancing strategy used by every worker.
    pub loadbalancer: LoadBalancerStrategy,

    /// Optional TLS termination.
    pub ssl: Option<TlsConfig>,

    /// Active health probe settings.
    pub health_check: HealthCheckConfig,

    /// Data-path client settings.
    pub proxy: ProxyClientConfig,

    /// How long the primary waits for a worker reply.
    pub dispatch_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: 8080,
            workers: None,
            upstreams: Vec::new(),
            rules: Vec::new(),
            loadbalancer: LoadBalancerStrategy::default(),
            ssl: None,
            health_check: HealthCheckConfig::default(),
            proxy: ProxyClientConfig::default(),
            dispatch_timeout_ms: 30_000,
        }
    }
}

impl ServerConfig {
    /// Configured worker count, falling back to the number of CPUs.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Look up an upstream by id.
    pub fn upstream(&self, id: &str) -> Option<&UpstreamTarget> {
        self.upstreams.iter().find(|u| u.id == id)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// TLS settings, only when termination is switched on.
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.ssl.as_ref().filter(|tls| tls.enabled)
    }
}

/// A backend service instance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct UpstreamTarget {
    /// Unique identifier referenced by rules.
    pub id: String,

    /// Address as `host[:port]`, optionally prefixed with a scheme.
    pub url: String,

    /// Probe path override for this upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_path: Option<String>,
}

impl UpstreamTarget {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            health_path: None,
        }
    }
}

/// A path-prefix to upstream-set routing entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Rule {
    /// Path prefix to match.
    pub path: String,

    /// Candidate upstream ids, in load balancing / fallback order.
    pub upstreams: Vec<String>,
}

impl Rule {
    pub fn new<I, S>(path: impl Into<String>, upstreams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            upstreams: upstreams.into_iter().map(Into::into).collect(),
        }
    }
}

/// Load balancing strategy selector.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerStrategy {
    #[default]
    RoundRobin,
    Random,
}

/// TLS termination settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    /// Start the TLS listener.
    pub enabled: bool,

    /// Path to certificate chain (PEM).
    pub cert: Option<String>,

    /// Path to private key (PEM).
    pub key: Option<String>,

    /// TLS listen port (default 8443).
    pub port: Option<u16>,

    /// Allowed protocol versions, e.g. `["TLSv1.2", "TLSv1.3"]`.
    pub protocols: Option<Vec<String>>,

    /// Colon-separated cipher suite preference list.
    pub ciphers: Option<String>,
}

impl TlsConfig {
    pub const DEFAULT_PORT: u16 = 8443;

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(Self::DEFAULT_PORT)
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Default probe path.
    pub path: String,

    /// Idle probe connections kept per upstream.
    pub max_idle: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            timeout_ms: 5_000,
            path: "/health-check".to_string(),
            max_idle: 2,
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Data-path client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProxyClientConfig {
    /// Whole-request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Concurrent in-flight requests per upstream.
    pub max_connections_per_upstream: usize,

    /// Idle keep-alive sockets kept per upstream.
    pub max_idle_per_upstream: usize,
}

impl Default for ProxyClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_connections_per_upstream: 50,
            max_idle_per_upstream: 10,
        }
    }
}

impl ProxyClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint in the primary.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
