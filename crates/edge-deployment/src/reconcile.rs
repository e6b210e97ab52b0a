//! Three-set reconciliation (spec §4.5 step 3): `toInstall`, `toUpgrade`,
//! `toRemove`, computed by diffing the fleet's previously-desired component
//! set against the resolver's output for the union of all active roots.

use std::collections::BTreeMap;

use edge_core::ComponentIdentifier;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_install: Vec<ComponentIdentifier>,
    /// `(old, new)` pairs sharing a name. The old version must reach
    /// `FINISHED` before the new one starts (spec: "stop-then-replace").
    pub to_upgrade: Vec<(ComponentIdentifier, ComponentIdentifier)>,
    pub to_remove: Vec<ComponentIdentifier>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_upgrade.is_empty() && self.to_remove.is_empty()
    }

    /// The inverse plan: swap what was added/removed, used for a ROLLBACK
    /// (spec §4.5's failure semantics).
    pub fn inverse(&self) -> ReconciliationPlan {
        ReconciliationPlan {
            to_install: self.to_remove.clone(),
            to_upgrade: self.to_upgrade.iter().map(|(old, new)| (new.clone(), old.clone())).collect(),
            to_remove: self.to_install.clone(),
        }
    }
}

fn by_name(identifiers: &[ComponentIdentifier]) -> BTreeMap<&str, &ComponentIdentifier> {
    identifiers.iter().map(|id| (id.name.as_str(), id)).collect()
}

/// `previous` and `resolved` are both name-unique snapshots (the resolver
/// guarantees at most one version per name in its output).
pub fn reconcile(previous: &[ComponentIdentifier], resolved: &[ComponentIdentifier]) -> ReconciliationPlan {
    let old = by_name(previous);
    let new = by_name(resolved);

    let mut plan = ReconciliationPlan::default();
    for (name, new_id) in &new {
        match old.get(name) {
            None => plan.to_install.push((*new_id).clone()),
            Some(old_id) if old_id.version != new_id.version => {
                plan.to_upgrade.push(((*old_id).clone(), (*new_id).clone()));
            }
            Some(_) => {}
        }
    }
    for (name, old_id) in &old {
        if !new.contains_key(name) {
            plan.to_remove.push((*old_id).clone());
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn id(name: &str, version: (u64, u64, u64)) -> ComponentIdentifier {
        ComponentIdentifier::new(name, Version::new(version.0, version.1, version.2))
    }

    #[test]
    fn classifies_new_upgraded_and_removed_components() {
        let previous = vec![id("Keep", (1, 0, 0)), id("Old", (1, 0, 0))];
        let resolved = vec![id("Keep", (1, 0, 0)), id("Old", (2, 0, 0)), id("New", (1, 0, 0))];
        let plan = reconcile(&previous, &resolved);
        assert_eq!(plan.to_install, vec![id("New", (1, 0, 0))]);
        assert_eq!(plan.to_upgrade, vec![(id("Old", (1, 0, 0)), id("Old", (2, 0, 0)))]);
        assert_eq!(plan.to_remove, vec![]);
    }

    #[test]
    fn detects_pure_removal() {
        let previous = vec![id("Gone", (1, 0, 0))];
        let resolved = vec![];
        let plan = reconcile(&previous, &resolved);
        assert_eq!(plan.to_remove, vec![id("Gone", (1, 0, 0))]);
    }

    #[test]
    fn inverse_swaps_install_and_remove() {
        let plan = ReconciliationPlan {
            to_install: vec![id("A", (1, 0, 0))],
            to_upgrade: vec![(id("B", (1, 0, 0)), id("B", (2, 0, 0)))],
            to_remove: vec![id("C", (1, 0, 0))],
        };
        let inverse = plan.inverse();
        assert_eq!(inverse.to_install, vec![id("C", (1, 0, 0))]);
        assert_eq!(inverse.to_remove, vec![id("A", (1, 0, 0))]);
        assert_eq!(inverse.to_upgrade, vec![(id("B", (2, 0, 0)), id("B", (1, 0, 0)))]);
    }
}
