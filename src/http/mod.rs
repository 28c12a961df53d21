//! HTTP front of the primary.
//!
//! # Data Flow
//! ```text
//! TCP / TLS connection
//!     → server.rs (axum router, one per scheme)
//!     → DispatchMessage {headers, path+query, x-forwarded-proto}
//!     → random live worker, bounded by the dispatch timeout
//!     → response.rs (reply or error → status, body, headers)
//!     → client
//! ```

pub mod response;
pub mod server;

pub use server::{FrontServer, RunningServer};
