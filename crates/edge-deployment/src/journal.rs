//! Durable deployment queue (spec §6: `deployments/ongoing/<deploymentId>.json`).
//! File I/O for recipes/config is out of scope, so this models the durable
//! queue as a trait with an in-memory default, keeping the "queued durably,
//! sent at next RECONNECT" contract testable without a filesystem format.

use async_trait::async_trait;
use dashmap::DashMap;
use edge_core::{Deployment, DeploymentId};

#[async_trait]
pub trait DeploymentJournal: Send + Sync {
    async fn record(&self, deployment: &Deployment);
    async fn complete(&self, id: &DeploymentId);
    async fn pending(&self) -> Vec<Deployment>;
}

#[derive(Default)]
pub struct InMemoryDeploymentJournal {
    entries: DashMap<DeploymentId, Deployment>,
}

impl InMemoryDeploymentJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeploymentJournal for InMemoryDeploymentJournal {
    async fn record(&self, deployment: &Deployment) {
        self.entries.insert(deployment.id.clone(), deployment.clone());
    }

    async fn complete(&self, id: &DeploymentId) {
        self.entries.remove(id);
    }

    async fn pending(&self) -> Vec<Deployment> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{DeploymentSource, FailurePolicy, GroupId};

    fn sample(id: &str) -> Deployment {
        Deployment {
            id: DeploymentId::new(id),
            group_id: GroupId::new("g1"),
            timestamp: 1,
            root_components: vec![],
            failure_policy: FailurePolicy::DoNothing,
            source: DeploymentSource::CloudJob,
            configuration_arn: None,
        }
    }

    #[tokio::test]
    async fn completed_entries_are_no_longer_pending() {
        let journal = InMemoryDeploymentJournal::new();
        journal.record(&sample("d1")).await;
        assert_eq!(journal.pending().await.len(), 1);
        journal.complete(&DeploymentId::new("d1")).await;
        assert!(journal.pending().await.is_empty());
    }
}
