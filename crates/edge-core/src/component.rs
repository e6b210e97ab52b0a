//! `ComponentRecord` and `ComponentState` (spec §3, §4.4).
//!
//! `ComponentState` is the supervisor's state machine vocabulary, but it
//! lives here (rather than in `edge-supervisor`) because the deployment
//! engine and status reporter both need to read it off a `ComponentRecord`
//! snapshot without depending on the supervisor crate's transition logic.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::deployment::DeploymentId;
use crate::identifier::ComponentIdentifier;
use crate::recipe::Recipe;

/// Lifecycle state (spec §4.4). `Finished` and `Broken` are terminal for a
/// given installation; `Errored` is transient and may auto-retry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ComponentState {
    New,
    Installing,
    Installed,
    Starting,
    Running,
    Stopping,
    Finished,
    Errored,
    Broken,
}

impl ComponentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ComponentState::Finished | ComponentState::Broken)
    }

    pub fn is_healthy(self) -> bool {
        !matches!(self, ComponentState::Broken | ComponentState::Errored)
    }

    /// Whether `self -> next` is one of the transitions spec §4.4 names.
    /// Used as an assertion in the supervisor's control task, and directly
    /// in tests, so the allowed-edges list has exactly one source of truth.
    pub fn can_transition_to(self, next: ComponentState) -> bool {
        use ComponentState::*;
        matches!(
            (self, next),
            (New, Installing)
                | (Installing, Installed)
                | (Installing, Errored)
                | (Installed, Starting)
                | (Starting, Running)
                | (Starting, Errored)
                | (Starting, Installed)  // demoted: a HARD dependency broke while starting
                | (Running, Stopping)
                | (Running, Installed)   // demoted: a HARD dependency broke while running
                | (Stopping, Finished)
                | (Stopping, Broken)
                | (Errored, Installing) // restart budget allows another attempt
                | (Errored, Broken)     // restart budget exhausted
                | (_, Broken)           // authoritative BROKEN signal, any state
        )
    }
}

/// One known component, owned by the supervisor's single control task
/// (spec §3 lifecycle ownership). The deployment engine only ever observes
/// a cloned snapshot.
#[derive(Clone, Debug)]
pub struct ComponentRecord {
    pub identifier: ComponentIdentifier,
    pub recipe: Recipe,
    pub desired_state: ComponentState,
    pub observed_state: ComponentState,
    pub last_transition_at: Instant,
    pub restart_budget_remaining: u32,
    pub status_details: Option<String>,
    /// True for a component that is a root of at least one active
    /// deployment (as opposed to a transitive dependency).
    pub root_flag: bool,
    pub owning_deployments: BTreeSet<DeploymentId>,
}

impl ComponentRecord {
    pub fn new(identifier: ComponentIdentifier, recipe: Recipe, now: Instant) -> Self {
        Self {
            identifier,
            recipe,
            desired_state: ComponentState::New,
            observed_state: ComponentState::New,
            last_transition_at: now,
            restart_budget_remaining: 3,
            status_details: None,
            root_flag: false,
            owning_deployments: BTreeSet::new(),
        }
    }

    /// Invariant 3 (spec §8): a record should be dropped from memory iff it
    /// has no owning deployments left and has reached a state where it is
    /// safe to forget (freshly created, or cleanly finished).
    pub fn is_eligible_for_removal(&self) -> bool {
        self.owning_deployments.is_empty()
            && matches!(self.observed_state, ComponentState::Finished | ComponentState::New)
    }

    pub fn transition(&mut self, next: ComponentState, now: Instant) {
        debug_assert!(
            self.observed_state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.observed_state,
            next
        );
        self.observed_state = next;
        self.last_transition_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn sample_identifier() -> ComponentIdentifier {
        ComponentIdentifier::new("App", Version::new(1, 0, 0))
    }

    fn sample_recipe() -> Recipe {
        Recipe {
            identifier: sample_identifier(),
            dependencies: vec![],
            artifacts: vec![],
            hooks: Default::default(),
            platform: None,
            default_configuration: Default::default(),
        }
    }

    #[test]
    fn removal_eligible_only_when_unowned_and_finished_or_new() {
        let mut record = ComponentRecord::new(sample_identifier(), sample_recipe(), Instant::now());
        assert!(record.is_eligible_for_removal());

        record.owning_deployments.insert(DeploymentId::new("d1"));
        assert!(!record.is_eligible_for_removal());

        record.owning_deployments.clear();
        record.transition(ComponentState::Installing, Instant::now());
        assert!(!record.is_eligible_for_removal());
    }

    #[test]
    fn any_state_can_become_broken() {
        for state in [
            ComponentState::New,
            ComponentState::Installing,
            ComponentState::Installed,
            ComponentState::Starting,
            ComponentState::Running,
            ComponentState::Stopping,
        ] {
            assert!(state.can_transition_to(ComponentState::Broken));
        }
    }
}
