//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatched request (url)
//!     → router.rs (rule lookup, declared order)
//!     → matcher.rs (evaluate path prefix)
//!     → Return: matched Rule or NoMatch (404)
//! ```
//!
//! # Design Decisions
//! - Rules are immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same rule

pub mod matcher;
pub mod router;

pub use router::{PrefixRuleEngine, RuleEngine};
