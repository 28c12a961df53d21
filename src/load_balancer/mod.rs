//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Rule matched → upstream ids resolved to targets
//!     → active snapshot from the health checker
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through active targets, cursor per group)
//!         - random.rs (uniform pick over active targets)
//!     → Return target or none
//! ```
//!
//! # Design Decisions
//! - Strategy chosen once from config, used through the trait
//! - Inactive targets are never returned
//! - Callers pass the full candidate list; filtering happens here

pub mod random;
pub mod round_robin;

use std::collections::HashSet;

use crate::config::{LoadBalancerStrategy, UpstreamTarget};

pub use random::RandomBalancer;
pub use round_robin::RoundRobin;

/// Picks one target from a candidate list.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Select among `upstreams` whose id is in `active`; `None` if there is none.
    fn select_upstream(
        &self,
        upstreams: &[UpstreamTarget],
        active: &HashSet<String>,
    ) -> Option<UpstreamTarget>;
}

/// Build the balancer named by the config.
pub fn from_strategy(strategy: LoadBalancerStrategy) -> Box<dyn LoadBalancer> {
    match strategy {
        LoadBalancerStrategy::RoundRobin => Box::new(RoundRobin::new()),
        LoadBalancerStrategy::Random => Box::new(RandomBalancer::new()),
    }
}

/// Candidates that are currently active, in candidate order.
fn active_candidates<'a>(
    upstreams: &'a [UpstreamTarget],
    active: &HashSet<String>,
) -> Vec<&'a UpstreamTarget> {
    upstreams.iter().filter(|u| active.contains(&u.id)).collect()
}
