//! Wires every subsystem crate into one running agent (SPEC_FULL §1):
//! resolver + recipe store, supervisor, MQTT multiplexer, deployment
//! engine, fleet status reporter, and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use edge_core::{AgentConfig, Clock, ConfigSnapshot, DeploymentSource, DetailedStatus, SystemClock};
use edge_deployment::{DeploymentDocument, DeploymentEngine, InMemoryDeploymentJournal};
use edge_downloader::{DownloaderFactory, DownloaderFactoryBuilder, ObjectStoreDownloader};
use edge_mqtt::{Multiplexer, SessionOptionsFactory};
use edge_status::StatusReporter;
use edge_supervisor::{ActorTimeouts, ExternalExecutor, Supervisor};
use tracing::info;

use crate::adapters::{MqttStatusPublisher, StagingAdapter, SupervisorBackedStatusSink, SupervisorConverger};
use crate::recipe_store::InMemoryRecipeStore;
use crate::shutdown::ShutdownCoordinator;

pub struct Agent {
    pub config: ConfigSnapshot,
    pub supervisor: Arc<Supervisor>,
    pub multiplexer: Arc<Multiplexer>,
    pub store: Arc<InMemoryRecipeStore>,
    pub deployment_engine: Arc<DeploymentEngine<InMemoryRecipeStore>>,
    pub status_reporter: Arc<StatusReporter>,
    pub shutdown: ShutdownCoordinator,
}

impl Agent {
    /// Accepts a deployment document against the given source and reports
    /// its resulting status through the fleet status reporter (spec §4.5,
    /// §4.6).
    pub async fn accept_deployment(&self, document: DeploymentDocument, source: DeploymentSource) -> Result<DetailedStatus, edge_deployment::DeploymentError> {
        self.status_reporter.on_deployment_started();
        self.deployment_engine.accept(document, source).await
    }

    /// Runs until the shutdown coordinator's token is cancelled, then drains
    /// spawned background tasks (cadence loop, MQTT driver) within
    /// `grace_period`.
    pub async fn run_until_shutdown(self, grace_period: Duration) {
        let token = self.shutdown.token();
        token.cancelled().await;
        info!("shutdown signal observed, draining background tasks");
        self.shutdown.shutdown(grace_period).await;
    }
}

pub struct AgentBuilder {
    thing_name: String,
    ggc_version: String,
    config: AgentConfig,
    executor: Option<Arc<dyn ExternalExecutor>>,
    mqtt_options_factory: Option<Arc<dyn SessionOptionsFactory>>,
    downloader_builder: DownloaderFactoryBuilder,
    artifact_base_dir: std::path::PathBuf,
    clock: Arc<dyn Clock>,
}

impl AgentBuilder {
    pub fn new(thing_name: impl Into<String>, ggc_version: impl Into<String>) -> Self {
        Self {
            thing_name: thing_name.into(),
            ggc_version: ggc_version.into(),
            config: AgentConfig::default(),
            executor: None,
            mqtt_options_factory: None,
            downloader_builder: DownloaderFactory::builder().with_scheme("https", Arc::new(ObjectStoreDownloader::new(reqwest::Client::new()))).with_scheme(
                "s3",
                Arc::new(ObjectStoreDownloader::new(reqwest::Client::new())),
            ),
            artifact_base_dir: std::path::PathBuf::from("artifacts"),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ExternalExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn mqtt_options_factory(mut self, factory: Arc<dyn SessionOptionsFactory>) -> Self {
        self.mqtt_options_factory = Some(factory);
        self
    }

    /// Registers an additional artifact scheme (e.g. `docker://`, `vendor://`)
    /// beyond the `https`/`s3` object-store default. Registry/vendor
    /// resolution endpoints are host-specific, so those variants aren't
    /// wired by default.
    pub fn downloader_scheme(mut self, scheme: &'static str, downloader: Arc<dyn edge_downloader::ArtifactDownloader>) -> Self {
        self.downloader_builder = self.downloader_builder.with_scheme(scheme, downloader);
        self
    }

    pub fn artifact_base_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.artifact_base_dir = dir.into();
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<Agent, AgentBuildError> {
        let config = self.config.normalized();
        let config_snapshot = ConfigSnapshot::new(config.clone());

        let executor = self.executor.ok_or(AgentBuildError::MissingExecutor)?;
        let mqtt_options_factory = self.mqtt_options_factory.ok_or(AgentBuildError::MissingMqttOptionsFactory)?;

        let supervisor = Supervisor::new(Arc::clone(&self.clock));
        let multiplexer = Multiplexer::with_clock(mqtt_options_factory, config.mqtt_max_subscriptions_per_session, Arc::clone(&self.clock));
        let store = Arc::new(InMemoryRecipeStore::new());

        let downloader_factory = Arc::new(self.downloader_builder.build());
        let staging = Arc::new(StagingAdapter::new(Arc::clone(&store), downloader_factory, self.artifact_base_dir));

        let actor_timeouts = ActorTimeouts {
            startup: config.supervisor_startup_timeout(),
            shutdown: config.supervisor_shutdown_timeout(),
            hook: config.hook_exec_timeout(),
        };
        let converger = Arc::new(SupervisorConverger::new(Arc::clone(&supervisor), Arc::clone(&store), executor, actor_timeouts));

        let journal = Arc::new(InMemoryDeploymentJournal::new());

        let status_publisher = Arc::new(MqttStatusPublisher::new(Arc::clone(&multiplexer), &self.thing_name, config.status_publish_timeout()));
        let status_reporter = StatusReporter::new(self.thing_name.clone(), self.ggc_version.clone(), status_publisher, config.status_chunk_size_bytes, Arc::clone(&self.clock));

        let status_sink = Arc::new(SupervisorBackedStatusSink::new(Arc::clone(&status_reporter), Arc::clone(&supervisor)));

        let deployment_engine = Arc::new(DeploymentEngine::new(Arc::clone(&store), staging, converger, journal, status_sink));

        Ok(Agent {
            config: config_snapshot,
            supervisor,
            multiplexer,
            store,
            deployment_engine,
            status_reporter,
            shutdown: ShutdownCoordinator::new(),
        })
    }
}

/// Raised by [`AgentBuilder::build`] when a required collaborator was never
/// supplied.
#[derive(Debug, thiserror::Error)]
pub enum AgentBuildError {
    #[error("an ExternalExecutor must be provided via AgentBuilder::executor before build()")]
    MissingExecutor,
    #[error("an MQTT SessionOptionsFactory must be provided via AgentBuilder::mqtt_options_factory before build()")]
    MissingMqttOptionsFactory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_mqtt::StaticSessionOptionsFactory;
    use edge_supervisor::{HookKind, InProcessExecutor};

    fn mqtt_factory() -> Arc<StaticSessionOptionsFactory> {
        Arc::new(StaticSessionOptionsFactory {
            host: "localhost".into(),
            port: 1883,
            client_id_prefix: "test".into(),
            keep_alive: Duration::from_secs(30),
        })
    }

    fn executor() -> Arc<InProcessExecutor<impl Fn(&str, HookKind, &str) -> i32 + Send + Sync>> {
        Arc::new(InProcessExecutor::new(|_component: &str, _kind: HookKind, _command: &str| 0))
    }

    #[test]
    fn builder_normalizes_config_and_wires_every_collaborator() {
        let agent = AgentBuilder::new("device-1", "2.14.0")
            .executor(executor())
            .mqtt_options_factory(mqtt_factory())
            .config(AgentConfig {
                fleet_status_periodic_publish_interval_sec: 10,
                ..AgentConfig::default()
            })
            .build()
            .unwrap();

        assert_eq!(agent.config.current().fleet_status_periodic_publish_interval_sec, 3600);
        assert!(!agent.supervisor.is_registered("nonexistent"));
    }

    #[test]
    fn build_without_an_executor_reports_the_missing_collaborator() {
        let err = AgentBuilder::new("device-1", "2.14.0").mqtt_options_factory(mqtt_factory()).build().unwrap_err();
        assert!(matches!(err, AgentBuildError::MissingExecutor));
    }

    #[test]
    fn build_without_an_mqtt_options_factory_reports_the_missing_collaborator() {
        let err = AgentBuilder::new("device-1", "2.14.0").executor(executor()).build().unwrap_err();
        assert!(matches!(err, AgentBuildError::MissingMqttOptionsFactory));
    }
}
