//! Adapts `edge_status::StatusReporter` to `edge_deployment::DeploymentStatusSink`
//! (spec §4.5: "publishes via the Fleet Status Reporter" on each terminal
//! transition).

use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{Deployment, DeploymentSource, DetailedStatus};
use edge_deployment::DeploymentStatusSink;
use edge_status::{ComponentDetail, DeploymentInformation, StatusReporter, Trigger};
use edge_supervisor::Supervisor;

pub struct SupervisorBackedStatusSink {
    reporter: Arc<StatusReporter>,
    supervisor: Arc<Supervisor>,
}

impl SupervisorBackedStatusSink {
    pub fn new(reporter: Arc<StatusReporter>, supervisor: Arc<Supervisor>) -> Self {
        Self { reporter, supervisor }
    }

    fn trigger_for(source: DeploymentSource) -> Trigger {
        match source {
            DeploymentSource::CloudJob | DeploymentSource::Shadow => Trigger::ThingGroupDeployment,
            DeploymentSource::Local => Trigger::LocalDeployment,
        }
    }

    /// The supervisor tracks state by component name only, not the exact
    /// resolved version; `version` here is the deployment's own constraint
    /// string rather than a fabricated concrete version.
    fn component_snapshot(&self, deployment: &Deployment) -> Vec<ComponentDetail> {
        deployment
            .root_components
            .iter()
            .filter_map(|root| {
                self.supervisor.state_of(&root.name).map(|state| ComponentDetail {
                    name: root.name.clone(),
                    version: root.version_constraint.to_string(),
                    state: format!("{:?}", state).to_uppercase(),
                    is_root: true,
                })
            })
            .collect()
    }
}

#[async_trait]
impl DeploymentStatusSink for SupervisorBackedStatusSink {
    async fn report(&self, deployment: &Deployment, status: DetailedStatus) {
        let trigger = Self::trigger_for(deployment.source);
        let info = DeploymentInformation::new(&deployment.id, status, None);
        let components = self.component_snapshot(deployment);
        if let Err(err) = self.reporter.on_deployment_completed(trigger, info, components).await {
            tracing::warn!(error = %err, deployment_id = %deployment.id, "failed to publish deployment status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{ComponentIdentifier, ComponentRecord, DeploymentId, GroupId, LifecycleHooks, MockClock, Recipe};
    use edge_status::StatusError;
    use edge_supervisor::{ActorTimeouts, HookKind, InProcessExecutor};
    use semver::{Version, VersionReq};
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    struct RecordingPublisher(StdMutex<Vec<edge_status::StatusPayload>>);

    #[async_trait]
    impl edge_status::StatusPublisher for RecordingPublisher {
        async fn publish(&self, payload: Vec<u8>) -> Result<(), StatusError> {
            let parsed = serde_json::from_slice(&payload).unwrap();
            self.0.lock().unwrap().push(parsed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn reports_a_cloud_deployment_with_the_supervisors_observed_state() {
        let supervisor = Supervisor::new(Arc::new(edge_core::SystemClock));
        let identifier = ComponentIdentifier::new("com.example.App", Version::new(1, 0, 0));
        let recipe = Recipe {
            identifier: identifier.clone(),
            dependencies: vec![],
            artifacts: vec![],
            hooks: LifecycleHooks::default(),
            platform: None,
            default_configuration: Default::default(),
        };
        let record = ComponentRecord::new(identifier, recipe, Instant::now());
        let executor: Arc<dyn edge_supervisor::ExternalExecutor> = Arc::new(InProcessExecutor::new(|_: &str, _: HookKind, _: &str| 0));
        supervisor.register(record, executor, ActorTimeouts { startup: Duration::from_secs(5), shutdown: Duration::from_secs(5), hook: Duration::from_secs(5) }, Default::default(), vec![]);
        supervisor.start_all().await.unwrap();

        let publisher = Arc::new(RecordingPublisher(StdMutex::new(Vec::new())));
        let reporter = StatusReporter::new("device-1", "2.14.0", publisher.clone(), 128 * 1024, Arc::new(MockClock::new()));
        let sink = SupervisorBackedStatusSink::new(reporter, Arc::clone(&supervisor));

        let deployment = Deployment {
            id: DeploymentId::new("d1"),
            group_id: GroupId::new("g1"),
            timestamp: 1,
            root_components: vec![edge_core::RootComponentRequest {
                name: "com.example.App".into(),
                version_constraint: VersionReq::parse("^1.0.0").unwrap(),
                configuration: None,
            }],
            failure_policy: edge_core::FailurePolicy::DoNothing,
            source: DeploymentSource::CloudJob,
            configuration_arn: None,
        };

        sink.report(&deployment, DetailedStatus::Succeeded).await;

        let payloads = publisher.0.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].trigger, Trigger::ThingGroupDeployment);
        assert_eq!(payloads[0].component_details.len(), 1);
        assert_eq!(payloads[0].component_details[0].state, "RUNNING");
    }
}
