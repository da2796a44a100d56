//! Compiled matching pipeline.
//!
//! `CompiledRouter` is the executable form of the subscription table: for
//! an incoming (method, path) it produces the *visited set*, the subset of
//! subscriptions whose own pattern matches the request, keyed by peer with
//! their declared requirements. Interest is decoupled from the exact path
//! being requested: a peer subscribed to `*` is visited by every request.

use std::collections::HashMap;

use tracing::debug;

use switchboard_state::{SubscriptionEntry, normalize_method};

use crate::pattern::PathPattern;

/// Matched peers for one request: peer key mapped to the peers it
/// requires to be dispatched first.
pub type VisitedSet = HashMap<String, Vec<String>>;

/// One subscription, pattern pre-compiled.
#[derive(Debug)]
struct CompiledEntry {
    method: String,
    pattern: PathPattern,
    key: String,
    require: Vec<String>,
}

/// The executable matching pipeline compiled from a table snapshot.
#[derive(Debug, Default)]
pub struct CompiledRouter {
    entries: Vec<CompiledEntry>,
}

impl CompiledRouter {
    /// Compile a snapshot of the subscription table.
    pub fn compile(entries: &[SubscriptionEntry]) -> Self {
        let compiled = entries
            .iter()
            .map(|e| CompiledEntry {
                method: e.method.clone(),
                pattern: PathPattern::parse(&e.path),
                key: e.key.clone(),
                require: e.require.clone(),
            })
            .collect::<Vec<_>>();
        debug!(entries = compiled.len(), "router compiled");
        Self { entries: compiled }
    }

    /// Mark every subscription matching this request.
    ///
    /// When a peer holds several matching subscriptions their requirement
    /// lists are unioned, preserving every declared happens-before edge.
    pub fn visited(&self, method: &str, path: &str) -> VisitedSet {
        let method = normalize_method(method);
        let mut visited = VisitedSet::new();

        for entry in &self.entries {
            if entry.method != method || !entry.pattern.matches(path) {
                continue;
            }
            let require = visited.entry(entry.key.clone()).or_default();
            for dep in &entry.require {
                if !require.contains(dep) {
                    require.push(dep.clone());
                }
            }
        }

        visited
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(method: &str, path: &str, key: &str, require: &[&str]) -> SubscriptionEntry {
        SubscriptionEntry {
            method: normalize_method(method),
            path: path.to_string(),
            key: key.to_string(),
            require: require.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn visited_contains_only_matching_entries() {
        let router = CompiledRouter::compile(&[
            entry("GET", "/hello", "echo", &[]),
            entry("GET", "/other", "audit", &[]),
            entry("POST", "/hello", "writer", &[]),
        ]);

        let visited = router.visited("GET", "/hello");
        assert_eq!(visited.len(), 1);
        assert!(visited.contains_key("echo"));
    }

    #[test]
    fn method_comparison_is_case_insensitive() {
        let router = CompiledRouter::compile(&[entry("GET", "/hello", "echo", &[])]);
        assert!(router.visited("get", "/hello").contains_key("echo"));
    }

    #[test]
    fn wildcard_subscription_is_visited_by_every_request() {
        let router = CompiledRouter::compile(&[entry("GET", "*", "audit", &[])]);
        assert!(router.visited("GET", "/hello").contains_key("audit"));
        assert!(router.visited("GET", "/a/b/c").contains_key("audit"));
        assert!(router.visited("POST", "/hello").is_empty());
    }

    #[test]
    fn visited_carries_requirements() {
        let router = CompiledRouter::compile(&[
            entry("GET", "/hello", "renderer", &["auth"]),
            entry("GET", "/hello", "auth", &[]),
        ]);

        let visited = router.visited("GET", "/hello");
        assert_eq!(visited["renderer"], vec!["auth".to_string()]);
        assert!(visited["auth"].is_empty());
    }

    #[test]
    fn multiple_subscriptions_for_one_peer_union_requirements() {
        let router = CompiledRouter::compile(&[
            entry("GET", "/hello", "renderer", &["auth"]),
            entry("GET", "*", "renderer", &["audit", "auth"]),
        ]);

        let visited = router.visited("GET", "/hello");
        let mut require = visited["renderer"].clone();
        require.sort();
        assert_eq!(require, vec!["audit".to_string(), "auth".to_string()]);
    }

    #[test]
    fn empty_router_visits_nothing() {
        let router = CompiledRouter::default();
        assert!(router.is_empty());
        assert!(router.visited("GET", "/hello").is_empty());
    }
}
