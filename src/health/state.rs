//! The set of upstream ids currently considered healthy.
//!
//! # State Transitions
//! ```text
//! start:      every configured upstream → active
//! probe 200:  → active
//! otherwise:  → inactive
//! ```
//!
//! One set per worker process; nothing is shared across processes.

use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct ActiveSet {
    ids: RwLock<HashSet<String>>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an id active. Returns true if it was inactive before.
    pub fn activate(&self, id: &str) -> bool {
        let mut ids = self.ids.write().unwrap_or_else(|e| e.into_inner());
        ids.insert(id.to_string())
    }

    /// Mark an id inactive. Returns true if it was active before.
    pub fn deactivate(&self, id: &str) -> bool {
        let mut ids = self.ids.write().unwrap_or_else(|e| e.into_inner());
        ids.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    /// Owned copy; later mutation of the set does not affect it.
    pub fn snapshot(&self) -> HashSet<String> {
        self.ids.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_report_changes() {
        let set = ActiveSet::new();
        assert!(set.activate("a"));
        assert!(!set.activate("a"));
        assert!(set.contains("a"));

        assert!(set.deactivate("a"));
        assert!(!set.deactivate("a"));
        assert!(!set.contains("a"));
    }

    #[test]
    fn snapshot_is_detached() {
        let set = ActiveSet::new();
        set.activate("a");
        let mut snapshot = set.snapshot();
        snapshot.remove("a");

        assert!(set.contains("a"));
        set.deactivate("a");
        assert!(set.snapshot().is_empty());
    }
}
