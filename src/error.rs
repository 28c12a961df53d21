//! Gateway-wide error taxonomy.
//!
//! Per-request variants map onto an HTTP status via [`GatewayError::status_code`]
//! and are always turned into a reply; only configuration and bootstrap errors
//! are allowed to end a process.

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::loader::ConfigError;

/// Errors produced anywhere in the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No routing rule matched the request path.
    #[error("Rule not found for {0}")]
    RuleNotFound(String),

    /// An upstream request failed (connection error, timeout, broken body).
    #[error("Upstream {id} failed: {reason}")]
    Upstream { id: String, reason: String },

    /// Rule resolved, but no candidate is usable.
    #[error("{0}")]
    NoActiveUpstreams(String),

    /// The worker pool is momentarily empty.
    #[error("No workers available")]
    NoWorkersAvailable,

    /// The chosen worker stopped accepting dispatches.
    #[error("worker {0} is not accepting dispatches")]
    WorkerUnavailable(u64),

    /// A worker process could not be started.
    #[error("failed to launch worker: {0}")]
    WorkerLaunch(#[source] std::io::Error),

    /// Certificate or key file could not be read or parsed.
    #[error("Failed to load certificate: {0}")]
    CertificateLoad(String),

    /// Development certificate generation failed.
    #[error("Failed to generate self-signed certificate: {0}")]
    CertificateGeneration(String),

    /// Credentials were readable but rustls rejected the resulting setup.
    #[error("Invalid TLS configuration: {0}")]
    Tls(String),

    /// No worker reply arrived before the dispatch deadline.
    #[error("Gateway timeout")]
    GatewayTimeout,

    /// Malformed message on the primary/worker channel.
    #[error("IPC protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// HTTP status a client sees when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RuleNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::NoWorkersAvailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            GatewayError::RuleNotFound("/x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::NoWorkersAvailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::GatewayTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::NoActiveUpstreams("none".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rule_not_found_message() {
        let err = GatewayError::RuleNotFound("/unknown".into());
        assert_eq!(err.to_string(), "Rule not found for /unknown");
    }
}
