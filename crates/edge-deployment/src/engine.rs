//! The deployment engine (spec §4.5): per-group serialized queueing,
//! staleness rejection, three-set reconciliation, staging, convergence, and
//! rollback.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use edge_core::{Classify, ComponentIdentifier, Deployment, DeploymentSource, DetailedStatus, FailurePolicy, GroupId, RootComponentRequest};
use edge_resolver::{RecipeStore, Resolver};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::converger::{ComponentConverger, StagingService};
use crate::document::DeploymentDocument;
use crate::error::DeploymentError;
use crate::journal::DeploymentJournal;
use crate::reconcile::{reconcile, ReconciliationPlan};

/// Notified on each deployment-terminal transition (spec §4.5: "publishes
/// via the Fleet Status Reporter"). Implemented by `edge-status` in the
/// fully wired agent; a no-op implementation is fine for tests.
#[async_trait]
pub trait DeploymentStatusSink: Send + Sync {
    async fn report(&self, deployment: &Deployment, status: DetailedStatus);
}

pub struct NullStatusSink;

#[async_trait]
impl DeploymentStatusSink for NullStatusSink {
    async fn report(&self, _deployment: &Deployment, _status: DetailedStatus) {}
}

#[derive(Default)]
struct GroupState {
    last_accepted_timestamp: Option<u64>,
}

pub struct DeploymentEngine<S: RecipeStore> {
    resolver: Resolver<S>,
    staging: Arc<dyn StagingService>,
    converger: Arc<dyn ComponentConverger>,
    journal: Arc<dyn DeploymentJournal>,
    status_sink: Arc<dyn DeploymentStatusSink>,
    groups: DashMap<GroupId, Arc<Mutex<GroupState>>>,
    committed_roots: DashMap<GroupId, Vec<RootComponentRequest>>,
    desired: Mutex<BTreeMap<String, ComponentIdentifier>>,
    /// One lock per component name, held from just before `desired` is read
    /// through staging, convergence, and the `desired` update (spec §4.5:
    /// "Cross-group deployments may proceed in parallel if and only if their
    /// root sets are disjoint; otherwise they are serialized by
    /// shared-component lock"). Acquired in sorted name order so two
    /// deployments with overlapping resolved sets never deadlock against
    /// each other.
    component_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: RecipeStore + 'static> DeploymentEngine<S> {
    pub fn new(
        store: Arc<S>,
        staging: Arc<dyn StagingService>,
        converger: Arc<dyn ComponentConverger>,
        journal: Arc<dyn DeploymentJournal>,
        status_sink: Arc<dyn DeploymentStatusSink>,
    ) -> Self {
        Self {
            resolver: Resolver::new(store),
            staging,
            converger,
            journal,
            status_sink,
            groups: DashMap::new(),
            committed_roots: DashMap::new(),
            desired: Mutex::new(BTreeMap::new()),
            component_locks: DashMap::new(),
        }
    }

    /// Locks every name in `names` (sorted, deduplicated by the caller isn't
    /// required — this does it), held until the returned guards are dropped.
    async fn lock_components(&self, names: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted = names.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for name in sorted {
            let lock = self.component_locks.entry(name).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    /// Accepts one deployment document, processes it to completion, and
    /// returns its terminal `DetailedStatus` (spec §4.5's failure semantics
    /// are themselves successful outcomes of this call; `Err` is reserved
    /// for a document the engine could not even begin to process).
    pub async fn accept(&self, document: DeploymentDocument, source: DeploymentSource) -> Result<DetailedStatus, DeploymentError> {
        let deployment = document.into_deployment(source)?;

        let group_lock = self
            .groups
            .entry(deployment.group_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(GroupState::default())))
            .clone();
        let mut group_state = group_lock.lock().await;

        if deployment.is_stale(group_state.last_accepted_timestamp) {
            warn!(deployment_id = %deployment.id, group_id = %deployment.group_id, "stale deployment rejected");
            return Ok(DetailedStatus::StaleDeployment);
        }

        self.journal.record(&deployment).await;

        let mut all_roots: Vec<RootComponentRequest> = self
            .committed_roots
            .iter()
            .filter(|entry| *entry.key() != deployment.group_id)
            .flat_map(|entry| entry.value().clone())
            .collect();
        all_roots.extend(deployment.root_components.clone());

        let resolved = match self.resolver.resolve(&all_roots).await {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(deployment_id = %deployment.id, error = %err, "resolution failed, running set untouched");
                self.journal.complete(&deployment.id).await;
                let status = err.detailed_status();
                self.status_sink.report(&deployment, status).await;
                return Ok(status);
            }
        };

        // Held from before `desired` is read through the `desired` update
        // below, so a second group whose resolved set overlaps this one's
        // blocks until this deployment's convergence (and any rollback) is
        // fully settled, instead of racing it at the converge step.
        let component_names: Vec<String> = resolved.iter().map(|id| id.name.clone()).collect();
        let component_guards = self.lock_components(&component_names).await;

        let plan = {
            let desired = self.desired.lock().await;
            let previous: Vec<ComponentIdentifier> = desired.values().cloned().collect();
            reconcile(&previous, &resolved)
        };

        let status = self.run_plan(&deployment, &plan).await;
        self.journal.complete(&deployment.id).await;

        if status == DetailedStatus::Succeeded {
            group_state.last_accepted_timestamp = Some(deployment.timestamp);
            self.committed_roots.insert(deployment.group_id.clone(), deployment.root_components.clone());
            let mut desired = self.desired.lock().await;
            apply_to_desired(&mut desired, &plan);
        }
        drop(component_guards);

        self.status_sink.report(&deployment, status).await;
        Ok(status)
    }

    async fn run_plan(&self, deployment: &Deployment, plan: &ReconciliationPlan) -> DetailedStatus {
        if plan.is_empty() {
            info!(deployment_id = %deployment.id, "no-op deployment");
            return DetailedStatus::Succeeded;
        }

        match self.stage_and_converge(plan).await {
            Ok(()) => DetailedStatus::Succeeded,
            Err(err) => {
                warn!(deployment_id = %deployment.id, error = %err, "deployment failed");
                match deployment.failure_policy {
                    FailurePolicy::DoNothing => DetailedStatus::Failed,
                    FailurePolicy::Rollback => {
                        let inverse = plan.inverse();
                        match self.converge(&inverse).await {
                            Ok(()) => DetailedStatus::FailedRollbackComplete,
                            Err(rollback_err) => {
                                warn!(deployment_id = %deployment.id, error = %rollback_err, "rollback itself failed");
                                DetailedStatus::Failed
                            }
                        }
                    }
                }
            }
        }
    }

    async fn stage_and_converge(&self, plan: &ReconciliationPlan) -> Result<(), DeploymentError> {
        let staged: Vec<ComponentIdentifier> = plan
            .to_install
            .iter()
            .cloned()
            .chain(plan.to_upgrade.iter().map(|(_, new)| new.clone()))
            .collect();
        if !staged.is_empty() {
            self.staging.stage(&staged).await?;
        }
        self.converge(plan).await
    }

    /// `toUpgrade` is a stop-then-replace: the old version reaches
    /// `FINISHED` before the new one starts. `toRemove` is applied last.
    async fn converge(&self, plan: &ReconciliationPlan) -> Result<(), DeploymentError> {
        let old_versions: Vec<ComponentIdentifier> = plan.to_upgrade.iter().map(|(old, _)| old.clone()).collect();
        if !old_versions.is_empty() {
            self.converger.remove(&old_versions).await?;
        }

        let mut to_start = plan.to_install.clone();
        to_start.extend(plan.to_upgrade.iter().map(|(_, new)| new.clone()));
        if !to_start.is_empty() {
            self.converger.install(&to_start).await?;
        }

        if !plan.to_remove.is_empty() {
            self.converger.remove(&plan.to_remove).await?;
        }
        Ok(())
    }
}

fn apply_to_desired(desired: &mut BTreeMap<String, ComponentIdentifier>, plan: &ReconciliationPlan) {
    for id in &plan.to_install {
        desired.insert(id.name.clone(), id.clone());
    }
    for (_, new) in &plan.to_upgrade {
        desired.insert(new.name.clone(), new.clone());
    }
    for id in &plan.to_remove {
        desired.remove(&id.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FailureHandlingPolicy, PackageConfigEntry};
    use crate::journal::InMemoryDeploymentJournal;
    use async_trait::async_trait;
    use edge_core::{LifecycleHooks, Recipe};
    use semver::Version;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct FixtureStore {
        recipes: std::collections::HashMap<String, Vec<Recipe>>,
    }

    #[async_trait]
    impl RecipeStore for FixtureStore {
        async fn versions_of(&self, name: &str) -> anyhow::Result<Vec<ComponentIdentifier>> {
            Ok(self.recipes.get(name).map(|recipes| recipes.iter().map(|r| r.identifier.clone()).collect()).unwrap_or_default())
        }

        async fn recipe(&self, identifier: &ComponentIdentifier) -> anyhow::Result<Recipe> {
            self.recipes
                .get(&identifier.name)
                .and_then(|recipes| recipes.iter().find(|r| &r.identifier == identifier))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such recipe"))
        }

        fn is_installed(&self, _identifier: &ComponentIdentifier) -> bool {
            false
        }

        fn published_at(&self, _identifier: &ComponentIdentifier) -> Option<u64> {
            None
        }
    }

    fn recipe(name: &str, version: (u64, u64, u64)) -> Recipe {
        Recipe {
            identifier: ComponentIdentifier::new(name, Version::new(version.0, version.1, version.2)),
            dependencies: vec![],
            artifacts: vec![],
            hooks: LifecycleHooks::default(),
            platform: None,
            default_configuration: Default::default(),
        }
    }

    struct NoopConverger {
        installs: AtomicUsize,
        removes: AtomicUsize,
    }

    #[async_trait]
    impl ComponentConverger for NoopConverger {
        async fn install(&self, _identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn remove(&self, _identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NoopStaging;

    #[async_trait]
    impl StagingService for NoopStaging {
        async fn stage(&self, _identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
            Ok(())
        }
    }

    struct FailingConverger;

    #[async_trait]
    impl ComponentConverger for FailingConverger {
        async fn install(&self, _identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
            Err(DeploymentError::ConvergenceFailed { reason: "boom".into() })
        }

        async fn remove(&self, _identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
            Ok(())
        }
    }

    struct RecordingStatusSink {
        reports: StdMutex<Vec<DetailedStatus>>,
    }

    impl RecordingStatusSink {
        fn new() -> Self {
            Self { reports: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl DeploymentStatusSink for RecordingStatusSink {
        async fn report(&self, _deployment: &Deployment, status: DetailedStatus) {
            self.reports.lock().unwrap().push(status);
        }
    }

    fn document(id: &str, timestamp: u64, group: &str) -> DeploymentDocument {
        DeploymentDocument {
            deployment_id: id.into(),
            timestamp,
            configuration_arn: None,
            group_name: group.into(),
            failure_handling_policy: FailureHandlingPolicy::DoNothing,
            root_packages: vec!["App".into()],
            deployment_package_configuration_list: vec![PackageConfigEntry { name: "App".into(), version: "^1.0.0".into(), configuration: None }],
        }
    }

    fn store() -> Arc<FixtureStore> {
        let mut recipes = std::collections::HashMap::new();
        recipes.insert("App".to_string(), vec![recipe("App", (1, 0, 0))]);
        Arc::new(FixtureStore { recipes })
    }

    #[tokio::test]
    async fn accepts_and_installs_a_fresh_deployment() {
        let converger = Arc::new(NoopConverger { installs: AtomicUsize::new(0), removes: AtomicUsize::new(0) });
        let engine = DeploymentEngine::new(
            store(),
            Arc::new(NoopStaging),
            converger.clone(),
            Arc::new(InMemoryDeploymentJournal::new()),
            Arc::new(NullStatusSink),
        );

        let status = engine.accept(document("d1", 100, "g1"), DeploymentSource::CloudJob).await.unwrap();
        assert_eq!(status, DetailedStatus::Succeeded);
        assert_eq!(converger.installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_deployment_is_rejected_without_touching_state() {
        let engine = DeploymentEngine::new(
            store(),
            Arc::new(NoopStaging),
            Arc::new(NoopConverger { installs: AtomicUsize::new(0), removes: AtomicUsize::new(0) }),
            Arc::new(InMemoryDeploymentJournal::new()),
            Arc::new(NullStatusSink),
        );

        engine.accept(document("d1", 100, "g1"), DeploymentSource::CloudJob).await.unwrap();
        let status = engine.accept(document("d2", 100, "g1"), DeploymentSource::CloudJob).await.unwrap();
        assert_eq!(status, DetailedStatus::StaleDeployment);
    }

    #[tokio::test]
    async fn do_nothing_policy_reports_failed_without_rollback() {
        let sink = Arc::new(RecordingStatusSink::new());
        let engine = DeploymentEngine::new(store(), Arc::new(NoopStaging), Arc::new(FailingConverger), Arc::new(InMemoryDeploymentJournal::new()), sink.clone());

        let status = engine.accept(document("d1", 100, "g1"), DeploymentSource::CloudJob).await.unwrap();
        assert_eq!(status, DetailedStatus::Failed);
        assert_eq!(sink.reports.lock().unwrap().as_slice(), [DetailedStatus::Failed]);
    }

    struct ExclusivityCheckingConverger {
        busy: std::sync::atomic::AtomicBool,
        overlapped: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ComponentConverger for ExclusivityCheckingConverger {
        async fn install(&self, _identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.busy.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn remove(&self, _identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_groups_serialize_through_convergence() {
        let converger = Arc::new(ExclusivityCheckingConverger { busy: std::sync::atomic::AtomicBool::new(false), overlapped: std::sync::atomic::AtomicBool::new(false) });
        let engine = Arc::new(DeploymentEngine::new(store(), Arc::new(NoopStaging), converger.clone(), Arc::new(InMemoryDeploymentJournal::new()), Arc::new(NullStatusSink)));

        let engine_a = engine.clone();
        let engine_b = engine.clone();
        let (status_a, status_b) = tokio::join!(
            engine_a.accept(document("d1", 100, "g1"), DeploymentSource::CloudJob),
            engine_b.accept(document("d2", 100, "g2"), DeploymentSource::CloudJob),
        );

        assert_eq!(status_a.unwrap(), DetailedStatus::Succeeded);
        assert_eq!(status_b.unwrap(), DetailedStatus::Succeeded);
        assert!(!converger.overlapped.load(Ordering::SeqCst), "two groups sharing a root component converged concurrently");
    }

    #[tokio::test]
    async fn rollback_policy_reports_rollback_complete_when_inverse_succeeds() {
        let mut doc = document("d1", 100, "g1");
        doc.failure_handling_policy = FailureHandlingPolicy::Rollback;
        let engine = DeploymentEngine::new(store(), Arc::new(NoopStaging), Arc::new(FailingConverger), Arc::new(InMemoryDeploymentJournal::new()), Arc::new(NullStatusSink));

        let status = engine.accept(doc, DeploymentSource::CloudJob).await.unwrap();
        assert_eq!(status, DetailedStatus::FailedRollbackComplete);
    }
}
