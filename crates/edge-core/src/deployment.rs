//! `Deployment` and `ConfigurationArn` (spec §3).

use std::fmt;

use semver::VersionReq;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct DeploymentId(pub String);

impl DeploymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier for one group revision (spec §3). A component may
/// belong to several ArNs by group-membership union; used only for
/// reporting, never for resolution or ordering.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ConfigurationArn(pub String);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FailurePolicy {
    DoNothing,
    Rollback,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DeploymentSource {
    CloudJob,
    Local,
    Shadow,
}

impl DeploymentSource {
    /// Local deployments are never rejected as stale (spec §3).
    pub fn is_staleness_exempt(self) -> bool {
        matches!(self, DeploymentSource::Local)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RootComponentRequest {
    pub name: String,
    #[serde(with = "version_req_serde")]
    pub version_constraint: VersionReq,
    #[serde(default)]
    pub configuration: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub group_id: GroupId,
    /// Epoch milliseconds; deployments within a group are compared
    /// monotonically (spec §3).
    pub timestamp: u64,
    pub root_components: Vec<RootComponentRequest>,
    pub failure_policy: FailurePolicy,
    pub source: DeploymentSource,
    pub configuration_arn: Option<ConfigurationArn>,
}

impl Deployment {
    /// Invariant 4 (spec §8): a deployment is accepted only if its timestamp
    /// is strictly greater than the last accepted one for its group, except
    /// for `Local` deployments which are exempt. A tie is rejected (spec §9
    /// open question, resolved in favor of "later arrival loses").
    pub fn is_stale(&self, last_accepted_timestamp: Option<u64>) -> bool {
        if self.source.is_staleness_exempt() {
            return false;
        }
        match last_accepted_timestamp {
            Some(last) => self.timestamp <= last,
            None => false,
        }
    }
}

mod version_req_serde {
    use semver::VersionReq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(req: &VersionReq, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(req)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VersionReq, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionReq::parse(&raw).map_err(serde::de::Error::custom)
    }
}
