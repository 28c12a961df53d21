//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Read PEM credentials from disk, or generate a development certificate
//! - Build the rustls server config: protocol versions, cipher preference,
//!   server-side cipher ordering
//!
//! Callers treat any error here as "serve HTTP only".

use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rcgen::{Certificate, CertificateParams, DistinguishedName, DnType};
use rustls::crypto::ring::{self as ring_provider, cipher_suite};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{SupportedCipherSuite, SupportedProtocolVersion};

use crate::config::TlsConfig;
use crate::error::GatewayError;

/// Where the served certificate came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateSource {
    Files { cert: String, key: String },
    SelfSigned,
}

/// PEM-encoded certificate chain and private key.
#[derive(Debug, Clone)]
pub struct TlsCredentials {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
    pub source: CertificateSource,
}

/// Protocol and cipher policy applied to the TLS listener.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    pub versions: Vec<&'static SupportedProtocolVersion>,
    pub cipher_suites: Vec<SupportedCipherSuite>,
    pub ignore_client_order: bool,
}

/// TLS 1.2 and 1.3, AEAD suites only, server preference enforced.
pub fn default_tls_options() -> TlsOptions {
    TlsOptions {
        versions: vec![&rustls::version::TLS13, &rustls::version::TLS12],
        cipher_suites: vec![
            cipher_suite::TLS13_AES_128_GCM_SHA256,
            cipher_suite::TLS13_AES_256_GCM_SHA384,
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        ],
        ignore_client_order: true,
    }
}

/// Read a PEM certificate chain and key from disk.
pub async fn load_certificate(cert_path: &str, key_path: &str) -> Result<TlsCredentials, GatewayError> {
    let cert = read_pem(cert_path).await?;
    let key = read_pem(key_path).await?;

    Ok(TlsCredentials {
        cert,
        key,
        source: CertificateSource::Files {
            cert: cert_path.to_string(),
            key: key_path.to_string(),
        },
    })
}

async fn read_pem(path: &str) -> Result<Vec<u8>, GatewayError> {
    tokio::fs::read(Path::new(path))
        .await
        .map_err(|e| GatewayError::CertificateLoad(format!("{}: {}", path, e)))
}

/// Development certificate for `localhost` and `127.0.0.1`, kept in memory.
pub fn create_self_signed_certificate() -> Result<TlsCredentials, GatewayError> {
    let mut params = CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()]);
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, "localhost");

    let cert = Certificate::from_params(params)
        .map_err(|e| GatewayError::CertificateGeneration(e.to_string()))?;
    let cert_pem = cert
        .serialize_pem()
        .map_err(|e| GatewayError::CertificateGeneration(e.to_string()))?;

    Ok(TlsCredentials {
        cert: cert_pem.into_bytes(),
        key: cert.serialize_private_key_pem().into_bytes(),
        source: CertificateSource::SelfSigned,
    })
}

/// Configured files when both are set, otherwise a generated certificate.
pub async fn resolve_credentials(tls: &TlsConfig) -> Result<TlsCredentials, GatewayError> {
    match (&tls.cert, &tls.key) {
        (Some(cert), Some(key)) => load_certificate(cert, key).await,
        _ => create_self_signed_certificate(),
    }
}

/// Defaults with the configured protocol and cipher overrides applied.
pub fn tls_options(tls: &TlsConfig) -> TlsOptions {
    let mut options = default_tls_options();

    if let Some(names) = &tls.protocols {
        let versions: Vec<_> = names.iter().filter_map(|n| protocol_version(n)).collect();
        if versions.is_empty() {
            tracing::warn!(protocols = ?names, "No supported TLS protocol versions configured, using defaults");
        } else {
            options.versions = versions;
        }
    }

    if let Some(list) = &tls.ciphers {
        let suites: Vec<_> = list
            .split(':')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .filter_map(|n| {
                let suite = cipher_suite_by_name(n);
                if suite.is_none() {
                    tracing::warn!(cipher = n, "Ignoring unsupported cipher suite");
                }
                suite
            })
            .collect();
        if suites.is_empty() {
            tracing::warn!("No supported cipher suites configured, using defaults");
        } else {
            options.cipher_suites = suites;
        }
    }

    options
}

pub fn build_server_config(
    credentials: &TlsCredentials,
    tls: &TlsConfig,
) -> Result<rustls::ServerConfig, GatewayError> {
    let options = tls_options(tls);

    let certs = rustls_pemfile::certs(&mut credentials.cert.as_slice())
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(|e| GatewayError::CertificateLoad(e.to_string()))?;
    if certs.is_empty() {
        return Err(GatewayError::CertificateLoad(
            "no certificates found in PEM data".to_string(),
        ));
    }
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut credentials.key.as_slice())
        .map_err(|e| GatewayError::CertificateLoad(e.to_string()))?
        .ok_or_else(|| GatewayError::CertificateLoad("no private key found in PEM data".to_string()))?;

    let mut provider = ring_provider::default_provider();
    provider.cipher_suites = options.cipher_suites;

    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&options.versions)
        .map_err(|e| GatewayError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| GatewayError::Tls(e.to_string()))?;
    config.ignore_client_order = options.ignore_client_order;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

/// Credentials plus policy, ready for the axum-server TLS listener.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<(RustlsConfig, CertificateSource), GatewayError> {
    let credentials = resolve_credentials(tls).await?;
    let config = build_server_config(&credentials, tls)?;
    Ok((RustlsConfig::from_config(Arc::new(config)), credentials.source))
}

fn protocol_version(name: &str) -> Option<&'static SupportedProtocolVersion> {
    match name.trim() {
        "TLSv1.2" | "TLSv1_2" | "TLS1.2" => Some(&rustls::version::TLS12),
        "TLSv1.3" | "TLSv1_3" | "TLS1.3" => Some(&rustls::version::TLS13),
        other => {
            tracing::warn!(protocol = other, "Ignoring unsupported TLS protocol version");
            None
        }
    }
}

/// Accepts both OpenSSL and IANA spellings.
fn cipher_suite_by_name(name: &str) -> Option<SupportedCipherSuite> {
    let suite = match name {
        "TLS_AES_128_GCM_SHA256" | "TLS13_AES_128_GCM_SHA256" => cipher_suite::TLS13_AES_128_GCM_SHA256,
        "TLS_AES_256_GCM_SHA384" | "TLS13_AES_256_GCM_SHA384" => cipher_suite::TLS13_AES_256_GCM_SHA384,
        "TLS_CHACHA20_POLY1305_SHA256" | "TLS13_CHACHA20_POLY1305_SHA256" => {
            cipher_suite::TLS13_CHACHA20_POLY1305_SHA256
        }
        "ECDHE-RSA-AES128-GCM-SHA256" | "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256" => {
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        }
        "ECDHE-RSA-AES256-GCM-SHA384" | "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384" => {
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
        }
        "ECDHE-ECDSA-AES128-GCM-SHA256" | "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256" => {
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
        }
        "ECDHE-ECDSA-AES256-GCM-SHA384" | "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384" => {
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
        }
        "ECDHE-RSA-CHACHA20-POLY1305" | "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256" => {
            cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
        }
        "ECDHE-ECDSA-CHACHA20-POLY1305" | "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256" => {
            cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
        }
        _ => return None,
    };
    Some(suite)
}
