//! The orchestrator: owns every component's actor handle, sequences
//! dependency-ordered start/stop through `topology`, and reacts to restart
//! budget exhaustion by demoting dependents (spec §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use edge_core::{Clock, ComponentRecord, ComponentState};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::actor::{self, ActorCommand, ActorEvent, ActorTimeouts, ComponentHandle};
use crate::error::SupervisorError;
use crate::executor::ExternalExecutor;
use crate::restart_budget::RestartBudget;
use crate::topology::{start_layers, stop_layers};

struct Entry {
    handle: ComponentHandle,
    state: watch::Receiver<ComponentState>,
    depends_on: Vec<String>,
    dependents: Vec<String>,
}

/// Coordinates every component's control task. Not `Clone`; callers share it
/// behind an `Arc`.
pub struct Supervisor {
    entries: DashMap<String, Entry>,
    states: DashMap<String, watch::Sender<ComponentState>>,
    clock: Arc<dyn Clock>,
}

impl Supervisor {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            states: DashMap::new(),
            clock,
        })
    }

    /// Registers a component and spawns its control task. `depends_on` lists
    /// the names of its HARD dependencies; the supervisor derives the
    /// reverse (dependents) edges itself.
    pub fn register(
        self: &Arc<Self>,
        record: ComponentRecord,
        executor: Arc<dyn ExternalExecutor>,
        timeouts: ActorTimeouts,
        restart_budget: RestartBudget,
        depends_on: Vec<String>,
    ) {
        let name = record.identifier.name.clone();
        let (state_tx, state_rx) = watch::channel(record.observed_state);
        let (events_tx, events_rx) = mpsc::channel(64);

        let handle = actor::spawn(record, executor, Arc::clone(&self.clock), timeouts, restart_budget, events_tx);

        for dep in &depends_on {
            if let Some(mut dep_entry) = self.entries.get_mut(dep) {
                dep_entry.dependents.push(name.clone());
            }
        }

        self.entries.insert(
            name.clone(),
            Entry {
                handle,
                state: state_rx,
                depends_on,
                dependents: Vec::new(),
            },
        );
        self.states.insert(name.clone(), state_tx);

        let supervisor = Arc::clone(self);
        tokio::spawn(supervisor.forward_events(events_rx));
    }

    async fn forward_events(self: Arc<Self>, mut events_rx: mpsc::Receiver<ActorEvent>) {
        while let Some(event) = events_rx.recv().await {
            match event {
                ActorEvent::StateChanged { name, state } => {
                    if let Some(tx) = self.states.get(&name) {
                        let _ = tx.send(state);
                    }
                }
                ActorEvent::RestartBudgetExhausted { name } => {
                    warn!(component = %name, "restart budget exhausted, demoting dependents");
                    self.demote_dependents(&name).await;
                }
            }
        }
    }

    async fn demote_dependents(&self, name: &str) {
        let dependents = self.entries.get(name).map(|e| e.dependents.clone()).unwrap_or_default();
        for dependent in dependents {
            if let Some(entry) = self.entries.get(&dependent) {
                entry.handle.send(ActorCommand::Demote).await;
            }
        }
    }

    fn depends_on_map(&self) -> HashMap<String, Vec<String>> {
        self.entries.iter().map(|entry| (entry.key().clone(), entry.value().depends_on.clone())).collect()
    }

    async fn wait_for(&self, name: &str, target: ComponentState) {
        let mut rx = match self.entries.get(name) {
            Some(entry) => entry.state.clone(),
            None => return,
        };
        loop {
            {
                let current = *rx.borrow();
                if current == target || current.is_terminal() {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Starts every registered component in dependency order: each layer's
    /// members are issued `Install` then `Start` in parallel, and the
    /// supervisor waits for the whole layer to reach `Running` (or a
    /// terminal failure state) before moving to the next.
    pub async fn start_all(&self) -> Result<(), SupervisorError> {
        let layers = start_layers(&self.depends_on_map())?;
        self.run_start_layers(layers).await
    }

    /// Starts only `names` in dependency order among themselves; a
    /// dependency outside `names` is assumed to already be running (the
    /// deployment engine only asks for a subset here when the rest of the
    /// fleet's desired set is unchanged).
    pub async fn start_subset(&self, names: &[String]) -> Result<(), SupervisorError> {
        let layers = start_layers(&self.restricted_depends_on_map(names))?;
        self.run_start_layers(layers).await
    }

    async fn run_start_layers(&self, layers: Vec<Vec<String>>) -> Result<(), SupervisorError> {
        for layer in layers {
            for name in &layer {
                if let Some(entry) = self.entries.get(name) {
                    entry.handle.send(ActorCommand::Install).await;
                }
            }
            for name in &layer {
                self.wait_for(name, ComponentState::Installed).await;
                self.require_state(name, ComponentState::Installed)?;
            }
            for name in &layer {
                if let Some(entry) = self.entries.get(name) {
                    entry.handle.send(ActorCommand::Start).await;
                }
            }
            for name in &layer {
                self.wait_for(name, ComponentState::Running).await;
                self.require_state(name, ComponentState::Running)?;
            }
            info!(?layer, "layer started");
        }
        Ok(())
    }

    /// `wait_for` returns on either the expected state or any terminal state,
    /// since a component stuck in a hook can reach `BROKEN` instead. This
    /// turns "reached some terminal state" into "reached the *right* one".
    fn require_state(&self, name: &str, expected: ComponentState) -> Result<(), SupervisorError> {
        match self.state_of(name) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(SupervisorError::ConvergenceIncomplete { component: name.to_string(), expected, actual }),
            None => Ok(()),
        }
    }

    /// Stops every registered component in reverse dependency order.
    pub async fn stop_all(&self) -> Result<(), SupervisorError> {
        let layers = stop_layers(&self.depends_on_map())?;
        self.run_stop_layers(layers).await
    }

    /// Stops only `names`, in reverse dependency order among themselves.
    pub async fn stop_subset(&self, names: &[String]) -> Result<(), SupervisorError> {
        let layers = stop_layers(&self.restricted_depends_on_map(names))?;
        self.run_stop_layers(layers).await
    }

    async fn run_stop_layers(&self, layers: Vec<Vec<String>>) -> Result<(), SupervisorError> {
        for layer in layers {
            for name in &layer {
                if let Some(entry) = self.entries.get(name) {
                    entry.handle.send(ActorCommand::Stop).await;
                }
            }
            for name in &layer {
                self.wait_for(name, ComponentState::Finished).await;
                self.require_state(name, ComponentState::Finished)?;
            }
            info!(?layer, "layer stopped");
        }
        Ok(())
    }

    fn restricted_depends_on_map(&self, names: &[String]) -> HashMap<String, Vec<String>> {
        let full = self.depends_on_map();
        names.iter().filter_map(|name| full.get(name).map(|deps| (name.clone(), deps.clone()))).collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drops a `FINISHED` component's entry so the name can be re-registered
    /// by a later deployment (e.g. a component removed by one deployment and
    /// reinstalled, possibly at a different version, by a later one).
    pub fn deregister_if_finished(&self, name: &str) -> bool {
        let finished = self.entries.get(name).map(|entry| *entry.state.borrow() == ComponentState::Finished).unwrap_or(false);
        if finished {
            self.entries.remove(name);
            self.states.remove(name);
        }
        finished
    }

    pub fn state_of(&self, name: &str) -> Option<ComponentState> {
        self.entries.get(name).map(|entry| *entry.state.borrow())
    }
}
