//! Dependency-ordered layering (spec §4.4: "components start in dependency
//! order, dependents after their HARD dependencies; same-level components
//! may move in parallel"). Stop order is simply the reverse of start order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::SupervisorError;

/// Kahn's-algorithm layering over a HARD-dependency graph keyed by component
/// name. `depends_on[x]` lists the names `x` hard-depends on; only names that
/// are keys of the map themselves are honored as edges (an unresolved
/// dependency name with no entry is treated as already-satisfied external
/// state, since the resolver guarantees every HARD dependency was already
/// placed in the plan).
pub fn start_layers(depends_on: &HashMap<String, Vec<String>>) -> Result<Vec<Vec<String>>, SupervisorError> {
    let mut remaining_deps: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for name in depends_on.keys() {
        remaining_deps.entry(name.as_str()).or_default();
        dependents.entry(name.as_str()).or_default();
    }
    for (name, deps) in depends_on {
        for dep in deps {
            if depends_on.contains_key(dep) {
                remaining_deps.entry(name.as_str()).or_default().insert(dep.as_str());
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
    }

    let mut layers = Vec::new();
    let mut ready: VecDeque<&str> = remaining_deps
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(name, _)| *name)
        .collect();
    let mut placed: HashSet<&str> = HashSet::new();

    while !ready.is_empty() {
        let mut layer: Vec<&str> = ready.drain(..).collect();
        layer.sort_unstable();
        for name in &layer {
            placed.insert(*name);
        }
        let mut next_ready = Vec::new();
        for name in &layer {
            if let Some(affected) = dependents.get(name) {
                for dependent in affected {
                    let deps = remaining_deps.get_mut(dependent).expect("dependent tracked");
                    deps.remove(name);
                    if deps.is_empty() && !placed.contains(dependent) {
                        next_ready.push(*dependent);
                    }
                }
            }
        }
        layers.push(layer.into_iter().map(String::from).collect());
        ready.extend(next_ready);
    }

    if placed.len() != remaining_deps.len() {
        let mut stuck: Vec<String> = remaining_deps
            .keys()
            .filter(|name| !placed.contains(*name))
            .map(|name| name.to_string())
            .collect();
        stuck.sort();
        return Err(SupervisorError::DependencyCycle(stuck));
    }

    Ok(layers)
}

/// Stop order: forward topological, i.e. dependents before their
/// dependencies. Exactly the reverse of `start_layers`.
pub fn stop_layers(depends_on: &HashMap<String, Vec<String>>) -> Result<Vec<Vec<String>>, SupervisorError> {
    let mut layers = start_layers(depends_on)?;
    layers.reverse();
    Ok(layers)
}
