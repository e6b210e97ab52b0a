//! Collaborator interfaces the engine drives but does not implement itself
//! (spec §4.5 steps 4-5): staging artifacts and asking the supervisor to
//! converge. Kept as traits so `edge-deployment` stays testable without
//! wiring a real downloader/resolver/supervisor stack, matching the
//! trait-at-the-seams style used by every other subsystem crate.

use async_trait::async_trait;
use edge_core::ComponentIdentifier;

use crate::error::DeploymentError;

#[async_trait]
pub trait StagingService: Send + Sync {
    /// Ensures every artifact for `identifiers` is present and integrity
    /// verified on disk before the supervisor touches them (spec: "stage
    /// artifacts... before touching the supervisor").
    async fn stage(&self, identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError>;
}

#[async_trait]
pub trait ComponentConverger: Send + Sync {
    /// Installs and starts `identifiers`, already topologically ordered by
    /// the resolver (dependencies before dependents). Returns once every
    /// identifier has reached a terminal state of this round (`RUNNING`
    /// counts as terminal-for-this-round; `BROKEN` is surfaced as an error).
    async fn install(&self, identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError>;

    /// Stops and removes `identifiers`. Returns once every identifier has
    /// reached `FINISHED` (or is surfaced as an error).
    async fn remove(&self, identifiers: &[ComponentIdentifier]) -> Result<(), DeploymentError>;
}
