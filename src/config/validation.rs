//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (rules reference existing upstreams)
//! - Validate value ranges (intervals > 0, worker count > 0, ports distinct)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in an otherwise well-formed config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate upstream id '{0}'")]
    DuplicateUpstream(String),

    #[error("upstream '{0}' has an empty url")]
    EmptyUpstreamUrl(String),

    #[error("rule '{rule}' references unknown upstream '{upstream}'")]
    UnknownUpstream { rule: String, upstream: String },

    #[error("rule #{0} has an empty path")]
    EmptyRulePath(usize),

    #[error("rule '{0}' lists no upstreams")]
    EmptyRule(String),

    #[error("worker count must be greater than zero")]
    ZeroWorkers,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("TLS port {0} collides with the HTTP listen port")]
    PortCollision(u16),

    #[error("TLS certificate and key must be configured together")]
    IncompleteCertificate,
}

/// Validate a parsed configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let server = &config.server;
    let mut errors = Vec::new();

    let mut ids = HashSet::new();
    for upstream in &server.upstreams {
        if !ids.insert(upstream.id.as_str()) {
            errors.push(ValidationError::DuplicateUpstream(upstream.id.clone()));
        }
        if upstream.url.trim().is_empty() {
            errors.push(ValidationError::EmptyUpstreamUrl(upstream.id.clone()));
        }
    }

    for (index, rule) in server.rules.iter().enumerate() {
        if rule.path.is_empty() {
            errors.push(ValidationError::EmptyRulePath(index));
        }
        if rule.upstreams.is_empty() {
            errors.push(ValidationError::EmptyRule(rule.path.clone()));
        }
        for id in &rule.upstreams {
            if !ids.contains(id.as_str()) {
                errors.push(ValidationError::UnknownUpstream {
                    rule: rule.path.clone(),
                    upstream: id.clone(),
                });
            }
        }
    }

    if server.workers == Some(0) {
        errors.push(ValidationError::ZeroWorkers);
    }
    if server.dispatch_timeout_ms == 0 {
        errors.push(ValidationError::ZeroDuration("dispatch_timeout_ms"));
    }
    if server.health_check.interval_ms == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.interval_ms"));
    }
    if server.health_check.timeout_ms == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.timeout_ms"));
    }
    if server.proxy.timeout_ms == 0 {
        errors.push(ValidationError::ZeroDuration("proxy.timeout_ms"));
    }

    if let Some(tls) = server.tls() {
        if tls.port() == server.listen {
            errors.push(ValidationError::PortCollision(tls.port()));
        }
        if tls.cert.is_some() != tls.key.is_some() {
            errors.push(ValidationError::IncompleteCertificate);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
