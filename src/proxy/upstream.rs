//! Upstream addressing.
//!
//! Turns an [`UpstreamTarget`] `url` (`host[:port]`, optionally with a scheme
//! prefix) plus a request path into the URL the clients call. The transport
//! scheme is decided by host, not by the configured prefix: loopback hosts
//! speak plain HTTP, everything else HTTPS.

use std::net::IpAddr;

use url::Url;

use crate::config::UpstreamTarget;
use crate::error::GatewayError;

/// Host and optional port parsed from an upstream's `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl UpstreamAddress {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let bare = raw
            .strip_prefix("http://")
            .or_else(|| raw.strip_prefix("https://"))
            .unwrap_or(raw);
        let normalized = format!("http://{}", bare);

        let url = Url::parse(&normalized)
            .map_err(|e| GatewayError::Protocol(format!("invalid upstream url '{}': {}", raw, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| GatewayError::Protocol(format!("upstream url '{}' has no host", raw)))?;

        // `Url` hides a port equal to the parse scheme's default, but a port the
        // user wrote must survive the scheme being chosen by host.
        let port = if has_explicit_port(bare) {
            url.port_or_known_default()
        } else {
            None
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn is_loopback(&self) -> bool {
        let bare = self.host.trim_start_matches('[').trim_end_matches(']');
        bare.eq_ignore_ascii_case("localhost")
            || bare.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
    }

    pub fn scheme(&self) -> &'static str {
        if self.is_loopback() {
            "http"
        } else {
            "https"
        }
    }

    /// Full URL for `path` (which may carry a query string).
    pub fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let authority = match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        };

        Url::parse(&format!("{}://{}{}", self.scheme(), authority, path))
            .map_err(|e| GatewayError::Protocol(format!("invalid upstream path '{}': {}", path, e)))
    }
}

fn has_explicit_port(bare: &str) -> bool {
    let authority = bare.split(['/', '?', '#']).next().unwrap_or(bare);
    let after_host = match authority.rfind(']') {
        Some(end) => &authority[end..],
        None => authority,
    };
    after_host.contains(':')
}

/// URL for calling `path` on `upstream`.
pub fn endpoint(upstream: &UpstreamTarget, path: &str) -> Result<Url, GatewayError> {
    UpstreamAddress::parse(&upstream.url)?.endpoint(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_hosts_use_plain_http() {
        for raw in ["localhost:3001", "127.0.0.1:3001", "127.0.0.5", "[::1]:8080", "LOCALHOST"] {
            let addr = UpstreamAddress::parse(raw).unwrap();
            assert!(addr.is_loopback(), "{raw} should be loopback");
            assert_eq!(addr.scheme(), "http");
        }
    }

    #[test]
    fn remote_hosts_use_https() {
        let addr = UpstreamAddress::parse("jsonplaceholder.typicode.com").unwrap();
        assert_eq!(addr.scheme(), "https");
        assert_eq!(
            addr.endpoint("/posts/1").unwrap().as_str(),
            "https://jsonplaceholder.typicode.com/posts/1"
        );
    }

    #[test]
    fn configured_scheme_is_normalized_away() {
        let upstream = UpstreamTarget::new("a", "https://localhost:3001");
        assert_eq!(
            endpoint(&upstream, "/api/x?q=1").unwrap().as_str(),
            "http://localhost:3001/api/x?q=1"
        );
    }

    #[test]
    fn path_without_slash_is_rooted() {
        let upstream = UpstreamTarget::new("a", "localhost:3001");
        assert_eq!(
            endpoint(&upstream, "health").unwrap().as_str(),
            "http://localhost:3001/health"
        );
    }

    #[test]
    fn port_matching_a_default_is_kept_for_remote_hosts() {
        let upstream = UpstreamTarget::new("r", "api.example.com:80");
        let url = endpoint(&upstream, "/x").unwrap();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.port_or_known_default(), Some(80));
        assert_eq!(url.as_str(), "https://api.example.com:80/x");
    }

    #[test]
    fn https_default_port_is_kept_for_loopback() {
        let upstream = UpstreamTarget::new("l", "https://localhost:443");
        let url = endpoint(&upstream, "/x").unwrap();

        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port_or_known_default(), Some(443));
        assert_eq!(url.as_str(), "http://localhost:443/x");
    }

    #[test]
    fn ipv6_without_port_has_none() {
        let addr = UpstreamAddress::parse("[::1]").unwrap();
        assert_eq!(addr.port, None);
        assert_eq!(UpstreamAddress::parse("[::1]:8080").unwrap().port, Some(8080));
    }
}
