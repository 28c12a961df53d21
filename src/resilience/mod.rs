//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Worker exits → supervisor relaunches it
//!     → relaunch fails: backoff.rs (exponential delay with jitter)
//!     → try again until it succeeds or shutdown fires
//! ```
//!
//! Per-request retry lives in the request handler (one attempt on another
//! upstream), not here.

pub mod backoff;

pub use backoff::calculate_backoff;
