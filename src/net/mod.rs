//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ssl.enabled
//!     → tls.rs: credentials from ssl.cert/ssl.key, or a generated certificate
//!     → rustls ServerConfig (versions, cipher preference, server order)
//!     → axum-server TLS listener (http/server.rs)
//! ```
//!
//! # Design Decisions
//! - TLS is optional; any failure leaves the gateway serving plain HTTP
//! - Certificates live in memory only

pub mod tls;
