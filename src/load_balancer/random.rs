//! Uniform random load balancing strategy.

use std::collections::HashSet;

use rand::seq::SliceRandom;

use crate::config::UpstreamTarget;
use crate::load_balancer::{active_candidates, LoadBalancer};

/// Random selector. Stateless.
#[derive(Debug, Default)]
pub struct RandomBalancer;

impl RandomBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomBalancer {
    fn select_upstream(
        &self,
        upstreams: &[UpstreamTarget],
        active: &HashSet<String>,
    ) -> Option<UpstreamTarget> {
        active_candidates(upstreams, active)
            .choose(&mut rand::thread_rng())
            .map(|u| (*u).clone())
    }
}
