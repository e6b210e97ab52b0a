//! Adapts `edge_supervisor::Supervisor` + a recipe store to
//! `edge_deployment::ComponentConverger` (spec §4.5 step 5: "drive the
//! supervisor to converge the running set").

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use edge_core::{ComponentIdentifier, ComponentRecord};
use edge_deployment::{ComponentConverger, DeploymentError};
use edge_resolver::RecipeStore;
use edge_supervisor::{ActorTimeouts, ExternalExecutor, RestartBudget, Supervisor};

pub struct SupervisorConverger<S> {
    supervisor: Arc<Supervisor>,
    store: Arc<S>,
    executor: Arc<dyn ExternalExecutor>,
    timeouts: ActorTimeouts,
}

impl<S: RecipeStore> SupervisorConverger<S> {
    pub fn new(supervisor: Arc<Supervisor>, store: Arc<S>, executor: Arc<dyn ExternalExecutor>, timeouts: ActorTimeouts) -> Self {
        Self { supervisor, store, executor, timeouts }
    }
}

#[async_trait]
impl<S: RecipeStore + 'static> ComponentConverger for SupervisorConverger<S> {
    async fn install(&self, identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
        let mut names = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            names.push(identifier.name.clone());
            if self.supervisor.is_registered(&identifier.name) {
                continue;
            }
            let recipe = self
                .store
                .recipe(identifier)
                .await
                .map_err(|source| DeploymentError::ConvergenceFailed { reason: source.to_string() })?;
            let depends_on = recipe.hard_dependencies().map(|dep| dep.name.clone()).collect();
            let record = ComponentRecord::new(identifier.clone(), recipe, Instant::now());
            self.supervisor.register(record, Arc::clone(&self.executor), self.timeouts.clone(), RestartBudget::default(), depends_on);
        }

        self.supervisor
            .start_subset(&names)
            .await
            .map_err(|source| DeploymentError::ConvergenceFailed { reason: source.to_string() })
    }

    async fn remove(&self, identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
        let names: Vec<String> = identifiers.iter().map(|identifier| identifier.name.clone()).collect();
        self.supervisor
            .stop_subset(&names)
            .await
            .map_err(|source| DeploymentError::ConvergenceFailed { reason: source.to_string() })?;
        for name in &names {
            self.supervisor.deregister_if_finished(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{ComponentState, LifecycleHooks, Recipe, SystemClock};
    use edge_resolver::RecipeStore;
    use edge_supervisor::{ActorTimeouts, HookKind, InProcessExecutor};
    use semver::Version;
    use std::collections::HashMap;
    use std::sync::RwLock;
    use std::time::Duration;

    struct FixtureStore(RwLock<HashMap<ComponentIdentifier, Recipe>>);

    #[async_trait]
    impl RecipeStore for FixtureStore {
        async fn versions_of(&self, name: &str) -> anyhow::Result<Vec<ComponentIdentifier>> {
            Ok(self.0.read().unwrap().keys().filter(|id| id.name == name).cloned().collect())
        }
        async fn recipe(&self, identifier: &ComponentIdentifier) -> anyhow::Result<Recipe> {
            self.0.read().unwrap().get(identifier).cloned().ok_or_else(|| anyhow::anyhow!("unknown"))
        }
        fn is_installed(&self, _identifier: &ComponentIdentifier) -> bool {
            false
        }
        fn published_at(&self, _identifier: &ComponentIdentifier) -> Option<u64> {
            None
        }
    }

    fn identifier() -> ComponentIdentifier {
        ComponentIdentifier::new("com.example.App", Version::new(1, 0, 0))
    }

    fn timeouts() -> ActorTimeouts {
        ActorTimeouts { startup: Duration::from_secs(5), shutdown: Duration::from_secs(5), hook: Duration::from_secs(5) }
    }

    #[tokio::test]
    async fn install_registers_and_starts_a_not_yet_known_component() {
        let mut recipes = HashMap::new();
        recipes.insert(
            identifier(),
            Recipe {
                identifier: identifier(),
                dependencies: vec![],
                artifacts: vec![],
                hooks: LifecycleHooks::default(),
                platform: None,
                default_configuration: Default::default(),
            },
        );
        let store = Arc::new(FixtureStore(RwLock::new(recipes)));
        let supervisor = Supervisor::new(Arc::new(SystemClock));
        let executor: Arc<dyn ExternalExecutor> = Arc::new(InProcessExecutor::new(|_: &str, _: HookKind, _: &str| 0));
        let converger = SupervisorConverger::new(Arc::clone(&supervisor), store, executor, timeouts());

        converger.install(&[identifier()]).await.unwrap();

        assert!(supervisor.is_registered("com.example.App"));
        assert_eq!(supervisor.state_of("com.example.App"), Some(ComponentState::Running));
    }

    #[tokio::test]
    async fn install_surfaces_a_convergence_failure_when_the_install_hook_fails() {
        let mut recipes = HashMap::new();
        recipes.insert(
            identifier(),
            Recipe {
                identifier: identifier(),
                dependencies: vec![],
                artifacts: vec![],
                hooks: LifecycleHooks { install: Some("install".into()), run: None, shutdown: None },
                platform: None,
                default_configuration: Default::default(),
            },
        );
        let store = Arc::new(FixtureStore(RwLock::new(recipes)));
        let supervisor = Supervisor::new(Arc::new(SystemClock));
        let executor: Arc<dyn ExternalExecutor> = Arc::new(InProcessExecutor::new(|_: &str, kind: HookKind, _: &str| if kind == HookKind::Install { 1 } else { 0 }));
        let converger = SupervisorConverger::new(Arc::clone(&supervisor), store, executor, timeouts());

        let result = converger.install(&[identifier()]).await;

        assert!(result.is_err());
        assert_ne!(supervisor.state_of("com.example.App"), Some(ComponentState::Installed));
    }

    #[tokio::test]
    async fn remove_stops_and_deregisters_a_finished_component() {
        let mut recipes = HashMap::new();
        recipes.insert(
            identifier(),
            Recipe {
                identifier: identifier(),
                dependencies: vec![],
                artifacts: vec![],
                hooks: LifecycleHooks::default(),
                platform: None,
                default_configuration: Default::default(),
            },
        );
        let store = Arc::new(FixtureStore(RwLock::new(recipes)));
        let supervisor = Supervisor::new(Arc::new(SystemClock));
        let executor: Arc<dyn ExternalExecutor> = Arc::new(InProcessExecutor::new(|_: &str, _: HookKind, _: &str| 0));
        let converger = SupervisorConverger::new(Arc::clone(&supervisor), store, executor, timeouts());

        converger.install(&[identifier()]).await.unwrap();
        converger.remove(&[identifier()]).await.unwrap();

        assert!(!supervisor.is_registered("com.example.App"));
    }

    #[tokio::test]
    async fn remove_surfaces_a_convergence_failure_when_the_shutdown_hook_fails() {
        let mut recipes = HashMap::new();
        recipes.insert(
            identifier(),
            Recipe {
                identifier: identifier(),
                dependencies: vec![],
                artifacts: vec![],
                hooks: LifecycleHooks { install: None, run: None, shutdown: Some("shutdown".into()) },
                platform: None,
                default_configuration: Default::default(),
            },
        );
        let store = Arc::new(FixtureStore(RwLock::new(recipes)));
        let supervisor = Supervisor::new(Arc::new(SystemClock));
        let executor: Arc<dyn ExternalExecutor> = Arc::new(InProcessExecutor::new(|_: &str, kind: HookKind, _: &str| if kind == HookKind::Shutdown { 1 } else { 0 }));
        let converger = SupervisorConverger::new(Arc::clone(&supervisor), store, executor, timeouts());

        converger.install(&[identifier()]).await.unwrap();
        let result = converger.remove(&[identifier()]).await;

        assert!(result.is_err());
        assert_eq!(supervisor.state_of("com.example.App"), Some(ComponentState::Broken));
    }
}
