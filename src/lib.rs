//! Multi-process reverse-proxy gateway library.
//!
//! A primary process terminates HTTP (and optionally TLS) and hands every
//! request to one of N worker processes; workers route by path prefix,
//! balance across healthy upstreams, and answer over their stdout.

// Core subsystems
pub mod cluster;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod protocol;
pub mod proxy;
pub mod routing;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use cluster::{ClusterManager, Role};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use lifecycle::Shutdown;
