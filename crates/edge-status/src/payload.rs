//! The status payload shape (spec §4.6, §6): `{ggcVersion, thing,
//! overallStatus, messageType, trigger, chunkInfo?, deploymentInformation?,
//! componentDetails}`.

use edge_core::{ComponentIdentifier, ComponentState, DeploymentId, DetailedStatus};
use serde::{Deserialize, Serialize};

use crate::trigger::Trigger;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    Healthy,
    Unhealthy,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Complete,
    Partial,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub chunk_id: u32,
    pub total_chunks: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInformation {
    pub deployment_id: String,
    pub detailed_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_cause: Option<String>,
}

impl DeploymentInformation {
    pub fn new(deployment_id: &DeploymentId, detailed_status: DetailedStatus, failure_cause: Option<String>) -> Self {
        Self {
            deployment_id: deployment_id.to_string(),
            detailed_status: detailed_status.to_string(),
            failure_cause,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDetail {
    pub name: String,
    pub version: String,
    pub state: String,
    pub is_root: bool,
}

impl ComponentDetail {
    pub fn new(identifier: &ComponentIdentifier, state: ComponentState, is_root: bool) -> Self {
        Self {
            name: identifier.name.clone(),
            version: identifier.version.to_string(),
            state: format!("{:?}", state).to_uppercase(),
            is_root,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub ggc_version: String,
    pub thing: String,
    pub overall_status: OverallStatus,
    pub message_type: MessageType,
    pub trigger: Trigger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_info: Option<ChunkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_information: Option<DeploymentInformation>,
    pub component_details: Vec<ComponentDetail>,
}

impl StatusPayload {
    /// Invariant 6 (spec §8): UNHEALTHY iff any reported component is
    /// BROKEN or ERRORED.
    pub fn overall_status_for(component_details: &[ComponentDetail]) -> OverallStatus {
        let unhealthy = component_details.iter().any(|c| c.state == "BROKEN" || c.state == "ERRORED");
        if unhealthy {
            OverallStatus::Unhealthy
        } else {
            OverallStatus::Healthy
        }
    }
}
