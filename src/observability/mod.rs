//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, always on stderr)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → stderr of the primary (workers inherit it)
//!     → Prometheus scrape endpoint, primary only
//! ```
//!
//! # Design Decisions
//! - stdout is reserved for the worker reply channel
//! - Workers record metrics through the facade with no exporter installed

pub mod logging;
pub mod metrics;
