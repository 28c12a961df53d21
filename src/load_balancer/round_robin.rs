//! Round-robin load balancing strategy.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::config::UpstreamTarget;
use crate::load_balancer::{active_candidates, LoadBalancer};

/// Round-robin selector.
///
/// Keeps one rotation cursor per upstream group. The group key is built from
/// the sorted ids of *all* candidates handed in, while the cursor indexes the
/// active subset; when that subset changes size the rotation position shifts
/// with it.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursors: DashMap<String, usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature shared by every rule listing the same upstream ids.
    pub fn group_key(upstreams: &[UpstreamTarget]) -> String {
        let mut ids: Vec<&str> = upstreams.iter().map(|u| u.id.as_str()).collect();
        ids.sort_unstable();
        ids.join(",")
    }
}

impl LoadBalancer for RoundRobin {
    fn select_upstream(
        &self,
        upstreams: &[UpstreamTarget],
        active: &HashSet<String>,
    ) -> Option<UpstreamTarget> {
        let candidates = active_candidates(upstreams, active);
        if candidates.is_empty() {
            return None;
        }

        let len = candidates.len();
        let mut cursor = self.cursors.entry(Self::group_key(upstreams)).or_insert(0);
        let index = *cursor % len;
        *cursor = (index + 1) % len;

        Some(candidates[index].clone())
    }
}
