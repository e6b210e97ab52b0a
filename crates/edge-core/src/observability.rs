//! Thin tracing facade.
//!
//! Structured logging infrastructure itself (aggregation, shipping) is an
//! external collaborator (spec §1); this module only standardizes the
//! field names call sites use so logs from different subsystems line up in
//! a shared index (`component`, `deployment_id`, `group_id`).

use tracing::{info_span, Span};

use crate::component::ComponentState;
use crate::deployment::{DeploymentId, GroupId};
use crate::identifier::ComponentIdentifier;

pub fn span_for_component(identifier: &ComponentIdentifier) -> Span {
    info_span!("component", name = %identifier.name, version = %identifier.version)
}

pub fn span_for_deployment(deployment_id: &DeploymentId, group_id: &GroupId) -> Span {
    info_span!("deployment", deployment_id = %deployment_id, group_id = %group_id)
}

pub fn log_transition(identifier: &ComponentIdentifier, from: ComponentState, to: ComponentState) {
    tracing::info!(
        component = %identifier,
        from = ?from,
        to = ?to,
        "component state transition"
    );
}
