//! Rule lookup.
//!
//! # Responsibilities
//! - Look up the first rule whose path prefix matches a request path
//! - Return the matched rule or an explicit no-match
//!
//! # Design Decisions
//! - Stateless; rules are passed in, so one engine serves any rule set
//! - O(n) prefix scan (acceptable for typical rule counts)
//! - Declared order is priority: first match wins

use crate::config::Rule;
use crate::routing::matcher::{Matcher, PathPrefixMatcher};

/// Finds the routing rule responsible for a request path.
pub trait RuleEngine: Send + Sync {
    fn find_matching_rule<'a>(&self, path: &str, rules: &'a [Rule]) -> Option<&'a Rule>;
}

/// Prefix rule engine: a rule matches when its `path` starts the request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixRuleEngine;

impl PrefixRuleEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RuleEngine for PrefixRuleEngine {
    fn find_matching_rule<'a>(&self, path: &str, rules: &'a [Rule]) -> Option<&'a Rule> {
        rules
            .iter()
            .find(|rule| PathPrefixMatcher::new(rule.path.as_str()).matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<Rule> {
        vec![
            Rule::new("/api/admin", ["admin"]),
            Rule::new("/api", ["a", "b"]),
            Rule::new("/", ["fallback"]),
            Rule::new("/api/late", ["never"]),
        ]
    }

    #[test]
    fn first_declared_match_wins() {
        let engine = PrefixRuleEngine::new();
        let rules = rules();

        let rule = engine.find_matching_rule("/api/admin/users", &rules).unwrap();
        assert_eq!(rule.upstreams, vec!["admin"]);

        let rule = engine.find_matching_rule("/api/late", &rules).unwrap();
        assert_eq!(rule.path, "/api");

        let rule = engine.find_matching_rule("/static/app.js", &rules).unwrap();
        assert_eq!(rule.path, "/");
    }

    #[test]
    fn no_match_is_none() {
        let engine = PrefixRuleEngine::new();
        let rules = vec![Rule::new("/api", ["a"])];

        assert!(engine.find_matching_rule("/unknown", &rules).is_none());
        assert!(engine.find_matching_rule("/x", &[]).is_none());
    }
}
