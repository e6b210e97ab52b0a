//! `Recipe` (spec §3): the declarative spec of a single component version.

use std::collections::BTreeMap;

use semver::VersionReq;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactRef;
use crate::identifier::ComponentIdentifier;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Must be satisfied; resolution fails if it cannot be.
    Hard,
    /// Best-effort; elided from the plan rather than failing resolution.
    Soft,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    #[serde(with = "version_req_serde")]
    pub range: VersionReq,
    pub kind: DependencyKind,
}

impl DependencySpec {
    pub fn hard(name: impl Into<String>, range: VersionReq) -> Self {
        Self {
            name: name.into(),
            range,
            kind: DependencyKind::Hard,
        }
    }

    pub fn soft(name: impl Into<String>, range: VersionReq) -> Self {
        Self {
            name: name.into(),
            range,
            kind: DependencyKind::Soft,
        }
    }
}

/// Lifecycle hooks are opaque strings to everything except the external
/// executor that eventually runs them (spec §3, §4.4): the supervisor never
/// interprets their content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleHooks {
    pub install: Option<String>,
    pub run: Option<String>,
    pub shutdown: Option<String>,
}

/// A per-platform override of a recipe's hooks/artifacts. Selection between
/// platforms is a host-OS adapter concern (out of scope, spec §1); the data
/// model only carries the selector key a host would match against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSelector {
    pub os: Option<String>,
    pub architecture: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub identifier: ComponentIdentifier,
    pub dependencies: Vec<DependencySpec>,
    pub artifacts: Vec<ArtifactRef>,
    pub hooks: LifecycleHooks,
    pub platform: Option<PlatformSelector>,
    /// Arbitrary key/value configuration merged at deployment time
    /// (spec §6's `configuration` field on a deployment's package entry).
    #[serde(default)]
    pub default_configuration: BTreeMap<String, serde_json::Value>,
}

impl Recipe {
    pub fn hard_dependencies(&self) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies.iter().filter(|d| d.kind == DependencyKind::Hard)
    }

    pub fn soft_dependencies(&self) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies.iter().filter(|d| d.kind == DependencyKind::Soft)
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
