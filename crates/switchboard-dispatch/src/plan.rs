//! Dependency-ordered dispatch planning.
//!
//! The matched peers for a flight form a directed graph: an edge runs from
//! each required peer to the peer that requires it. A valid plan is a
//! topological order of that graph. Keys that appear only in `require`
//! lists are planned too, since their position still constrains everyone
//! downstream, but the dispatcher only notifies the matched ones.

use std::collections::{BTreeMap, BTreeSet};

use switchboard_router::VisitedSet;

use crate::error::{DispatchError, DispatchResult};

/// Compute the notification order for one dispatch round.
///
/// The order is a topological sort of the requirement graph with ties broken
/// lexicographically, so a given subscription table always yields the same
/// plan. Returns [`DispatchError::DependencyCycle`] naming the keys stuck in
/// a cycle when no order exists.
pub fn dispatch_order(visited: &VisitedSet) -> DispatchResult<Vec<String>> {
    let mut nodes: BTreeSet<&str> = BTreeSet::new();
    let mut edges: BTreeSet<(&str, &str)> = BTreeSet::new();

    for (key, require) in visited {
        nodes.insert(key.as_str());
        for dep in require {
            nodes.insert(dep.as_str());
            edges.insert((dep.as_str(), key.as_str()));
        }
    }

    let mut indegree: BTreeMap<&str, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (dep, dependent) in &edges {
        if let Some(count) = indegree.get_mut(dependent) {
            *count += 1;
        }
        dependents.entry(dep).or_default().push(dependent);
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());
        if let Some(next) = dependents.get(node) {
            for &dependent in next {
                if let Some(count) = indegree.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let placed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        let stuck: Vec<String> = nodes
            .iter()
            .filter(|n| !placed.contains(*n))
            .map(|n| n.to_string())
            .collect();
        return Err(DispatchError::DependencyCycle(stuck));
    }

    Ok(order)
}

// ── Tests ───────────────────────────────────────────────────────────────────
