//! Configuration loading from disk and from the worker environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable carrying the serialized config into worker processes.
pub const CONFIG_ENV: &str = "GATEWAY_CONFIG";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Toml(toml::de::Error),
    Json(serde_json::Error),
    Missing(&'static str),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML parse error: {}", e),
            ConfigError::Toml(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON parse error: {}", e),
            ConfigError::Missing(what) => write!(f, "Missing {}", what),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a YAML (default) or TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config = if is_toml {
        parse_toml(&content)?
    } else {
        parse_yaml(&content)?
    };

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn parse_yaml(content: &str) -> Result<GatewayConfig, ConfigError> {
    serde_yaml::from_str(content).map_err(ConfigError::Yaml)
}

pub fn parse_toml(content: &str) -> Result<GatewayConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Toml)
}

/// Serialize a config for handoff to a worker process.
pub fn encode_for_worker(config: &GatewayConfig) -> Result<String, ConfigError> {
    serde_json::to_string(config).map_err(ConfigError::Json)
}

/// Read the config the primary placed in this worker's environment.
pub fn load_worker_config() -> Result<GatewayConfig, ConfigError> {
    let raw = std::env::var(CONFIG_ENV).map_err(|_| ConfigError::Missing(CONFIG_ENV))?;
    serde_json::from_str(&raw).map_err(ConfigError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LoadBalancerStrategy;

    const YAML: &str = r#"
server:
  listen: 8080
  workers: 2
  loadbalancer: random
  upstreams:
    - id: a
      url: localhost:3001
    - id: b
      url: localhost:3002
      health_path: /ping
  rules:
    - path: /api
      upstreams: [a, b]
  ssl:
    enabled: true
    port: 9443
observability:
  log_level: debug
"#;

    #[test]
    fn parses_yaml() {
        let config = parse_yaml(YAML).unwrap();
        assert_eq!(config.server.worker_count(), 2);
        assert_eq!(config.server.loadbalancer, LoadBalancerStrategy::Random);
        assert_eq!(config.server.rules[0].upstreams, vec!["a", "b"]);
        assert_eq!(
            config.server.upstream("b").and_then(|u| u.health_path.as_deref()),
            Some("/ping")
        );
        assert_eq!(config.server.tls().map(|t| t.port()), Some(9443));
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn parses_toml() {
        let config = parse_toml(
            r#"
[server]
listen = 8081

[[server.upstreams]]
id = "a"
url = "localhost:3001"

[[server.rules]]
path = "/"
upstreams = ["a"]
"#,
        )
        .unwrap();
        assert_eq!(config.server.listen, 8081);
        assert_eq!(config.server.rules.len(), 1);
    }

    #[test]
    fn worker_handoff_preserves_config() {
        let config = parse_yaml(YAML).unwrap();
        let encoded = encode_for_worker(&config).unwrap();
        let decoded: GatewayConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
