//! Inbound deployment document (spec §6): the wire shape a cloud job or
//! local deployment source hands the engine, before it is turned into the
//! shared `edge_core::Deployment` model.

use edge_core::{ConfigurationArn, Deployment, DeploymentId, DeploymentSource, FailurePolicy, GroupId, RootComponentRequest};
use semver::VersionReq;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureHandlingPolicy {
    DoNothing,
    Rollback,
}

impl From<FailureHandlingPolicy> for FailurePolicy {
    fn from(policy: FailureHandlingPolicy) -> Self {
        match policy {
            FailureHandlingPolicy::DoNothing => FailurePolicy::DoNothing,
            FailureHandlingPolicy::Rollback => FailurePolicy::Rollback,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PackageConfigEntry {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub configuration: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDocument {
    pub deployment_id: String,
    pub timestamp: u64,
    #[serde(default)]
    pub configuration_arn: Option<String>,
    pub group_name: String,
    pub failure_handling_policy: FailureHandlingPolicy,
    pub root_packages: Vec<String>,
    pub deployment_package_configuration_list: Vec<PackageConfigEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("root package {name} is not present in deploymentPackageConfigurationList")]
    MissingPackageEntry { name: String },
    #[error("package {name} has an invalid version constraint {version}: {source}")]
    InvalidVersion { name: String, version: String, source: semver::Error },
}

impl DeploymentDocument {
    /// Converts the wire document into the shared data model, looking up
    /// each root package's entry in `deploymentPackageConfigurationList` for
    /// its version constraint and configuration overlay.
    pub fn into_deployment(self, source: DeploymentSource) -> Result<Deployment, DocumentError> {
        let mut root_components = Vec::with_capacity(self.root_packages.len());
        for name in &self.root_packages {
            let entry = self
                .deployment_package_configuration_list
                .iter()
                .find(|e| &e.name == name)
                .ok_or_else(|| DocumentError::MissingPackageEntry { name: name.clone() })?;
            let version_constraint = VersionReq::parse(&entry.version).map_err(|source| DocumentError::InvalidVersion {
                name: name.clone(),
                version: entry.version.clone(),
                source,
            })?;
            root_components.push(RootComponentRequest {
                name: name.clone(),
                version_constraint,
                configuration: entry.configuration.clone(),
            });
        }

        Ok(Deployment {
            id: DeploymentId::new(self.deployment_id),
            group_id: GroupId::new(self.group_name),
            timestamp: self.timestamp,
            root_components,
            failure_policy: self.failure_handling_policy.into(),
            source,
            configuration_arn: self.configuration_arn.map(ConfigurationArn),
        })
    }
}
