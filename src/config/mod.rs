//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! primary:
//!     config file (YAML/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → serialized into each worker's environment
//!
//! worker:
//!     GATEWAY_CONFIG env var (JSON)
//!     → loader.rs (deserialize)
//!     → shared via Arc by the request handler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    GatewayConfig, HealthCheckConfig, LoadBalancerStrategy, ObservabilityConfig,
    ProxyClientConfig, Rule, ServerConfig, TlsConfig, UpstreamTarget,
};
