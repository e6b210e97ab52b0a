//! Adapts `edge_downloader::DownloaderFactory` + a recipe store to
//! `edge_deployment::StagingService` (spec §4.5 step 4: "stage artifacts...
//! before touching the supervisor").

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edge_core::retry::{BackoffSchedule, RetryState};
use edge_core::ComponentIdentifier;
use edge_deployment::{DeploymentError, StagingService};
use edge_downloader::{is_connection_class, ArtifactDownloader, DownloaderError, DownloaderFactory};
use edge_resolver::RecipeStore;
use tracing::warn;

/// Connection-class failures (transport error, DNS failure, 5xx) retry
/// forever at a capped interval (spec §4.2). Everything else — including a
/// digest mismatch, which deletes the local file and is worth exactly one
/// re-download — gets a single retry before the failure is surfaced.
const CONNECTION_RETRY_BASE: Duration = Duration::from_millis(250);
const CONNECTION_RETRY_CAP: Duration = Duration::from_secs(30);
const BOUNDED_RETRY_ATTEMPTS: u32 = 1;

pub struct StagingAdapter<S> {
    store: Arc<S>,
    factory: Arc<DownloaderFactory>,
    base_dir: PathBuf,
}

impl<S: RecipeStore> StagingAdapter<S> {
    pub fn new(store: Arc<S>, factory: Arc<DownloaderFactory>, base_dir: PathBuf) -> Self {
        Self { store, factory, base_dir }
    }

    fn artifact_path(&self, identifier: &ComponentIdentifier, index: usize) -> PathBuf {
        self.base_dir.join(&identifier.name).join(identifier.version.to_string()).join(format!("artifact-{index}"))
    }

    /// Retries `download_required` + `download` as one unit, keyed on the
    /// resulting error's retry class: connection-class failures never give
    /// up, everything else gets one more try (spec §4.2, §8 scenario 6).
    async fn stage_one(
        &self,
        downloader: &dyn ArtifactDownloader,
        identifier: &ComponentIdentifier,
        artifact: &edge_core::ArtifactRef,
        path: &Path,
    ) -> Result<(), DownloaderError> {
        let mut connection_retry = RetryState::new(BackoffSchedule::unbounded(CONNECTION_RETRY_BASE, CONNECTION_RETRY_CAP));
        let mut bounded_retry = RetryState::new(BackoffSchedule::bounded(CONNECTION_RETRY_BASE, CONNECTION_RETRY_CAP, BOUNDED_RETRY_ATTEMPTS));
        loop {
            let attempt = async {
                if downloader.download_required(identifier, artifact, path).await? {
                    downloader.download(identifier, artifact, path).await?;
                }
                Ok(())
            }
            .await;

            let err = match attempt {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            let advice = if is_connection_class(&err) { connection_retry.record_failure() } else { bounded_retry.record_failure() };
            match advice {
                Some(advice) => {
                    warn!(component = %identifier.name, uri = %artifact.uri, error = %err, wait_ms = advice.wait.as_millis(), "retrying artifact download");
                    tokio::time::sleep(advice.wait).await;
                }
                None => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<S: RecipeStore + 'static> StagingService for StagingAdapter<S> {
    async fn stage(&self, identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError> {
        for identifier in identifiers {
            let recipe = self
                .store
                .recipe(identifier)
                .await
                .map_err(|source| DeploymentError::StagingFailed { reason: source.to_string() })?;

            for (index, artifact) in recipe.artifacts.iter().enumerate() {
                let downloader = self
                    .factory
                    .for_artifact(artifact)
                    .map_err(|source| DeploymentError::StagingFailed { reason: source.to_string() })?;
                let path = self.artifact_path(identifier, index);
                if let Some(parent) = path.parent() {
                    ensure_parent_is_a_directory(parent)?;
                }
                self.stage_one(downloader.as_ref(), identifier, artifact, &path)
                    .await
                    .map_err(|source| DeploymentError::StagingFailed { reason: source.to_string() })?;
            }
        }
        Ok(())
    }
}

/// Host filesystem I/O is otherwise untouched by this crate (directory
/// creation is the one on-disk side effect staging needs before handing a
/// path to a downloader variant).
fn ensure_parent_is_a_directory(parent: &Path) -> Result<(), DeploymentError> {
    std::fs::create_dir_all(parent).map_err(|source| DeploymentError::StagingFailed { reason: format!("creating {}: {source}", parent.display()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{ArtifactRef, LifecycleHooks, Recipe};
    use edge_downloader::DownloaderFactory;
    use edge_resolver::RecipeStore;
    use semver::Version;
    use std::collections::HashMap;
    use std::sync::RwLock;

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

    #[tokio::test]
    async fn staging_with_no_declared_artifacts_is_a_no_op() {
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
        let factory = Arc::new(DownloaderFactory::builder().build());
        let adapter = StagingAdapter::new(store, factory, std::env::temp_dir().join("edge-hosting-staging-noop"));

        adapter.stage(&[identifier()]).await.unwrap();
    }

    #[tokio::test]
    async fn an_unregistered_artifact_scheme_fails_staging() {
        let mut recipes = HashMap::new();
        recipes.insert(
            identifier(),
            Recipe {
                identifier: identifier(),
                dependencies: vec![],
                artifacts: vec![ArtifactRef::new("docker://registry/app:1.0.0")],
                hooks: LifecycleHooks::default(),
                platform: None,
                default_configuration: Default::default(),
            },
        );
        let store = Arc::new(FixtureStore(RwLock::new(recipes)));
        let factory = Arc::new(DownloaderFactory::builder().build());
        let adapter = StagingAdapter::new(store, factory, std::env::temp_dir().join("edge-hosting-staging-unregistered"));

        let err = adapter.stage(&[identifier()]).await.unwrap_err();
        assert!(matches!(err, DeploymentError::StagingFailed { .. }));
    }

    struct FlakyDownloader {
        attempts: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl edge_downloader::ArtifactDownloader for FlakyDownloader {
        async fn download_size(&self, _identifier: &ComponentIdentifier, _artifact: &edge_core::ArtifactRef) -> Result<u64, edge_downloader::DownloaderError> {
            Ok(0)
        }

        async fn download_required(&self, _identifier: &ComponentIdentifier, _artifact: &edge_core::ArtifactRef, path: &Path) -> Result<bool, edge_downloader::DownloaderError> {
            Ok(!path.exists())
        }

        async fn download(&self, _identifier: &ComponentIdentifier, artifact: &edge_core::ArtifactRef, path: &Path) -> Result<(), edge_downloader::DownloaderError> {
            if self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                return Err(edge_downloader::DownloaderError::Transport {
                    uri: artifact.uri.clone(),
                    source: reqwest::Client::new().get("").build().unwrap_err(),
                });
            }
            tokio::fs::write(path, b"payload").await.map_err(|source| edge_downloader::DownloaderError::Io { path: path.display().to_string(), source })
        }
    }

    #[tokio::test]
    async fn a_connection_class_failure_is_retried_until_it_succeeds() {
        let mut recipes = HashMap::new();
        recipes.insert(
            identifier(),
            Recipe {
                identifier: identifier(),
                dependencies: vec![],
                artifacts: vec![ArtifactRef::new("https://example.test/app.bin")],
                hooks: LifecycleHooks::default(),
                platform: None,
                default_configuration: Default::default(),
            },
        );
        let store = Arc::new(FixtureStore(RwLock::new(recipes)));
        let downloader = Arc::new(FlakyDownloader { attempts: std::sync::atomic::AtomicU32::new(0) });
        let factory = Arc::new(DownloaderFactory::builder().with_scheme("https", downloader.clone()).build());
        let base_dir = std::env::temp_dir().join(format!("edge-hosting-staging-retry-{}", std::process::id()));
        let adapter = StagingAdapter::new(store, factory, base_dir.clone());

        adapter.stage(&[identifier()]).await.unwrap();

        assert_eq!(downloader.attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
        let _ = std::fs::remove_dir_all(&base_dir);
    }
}
