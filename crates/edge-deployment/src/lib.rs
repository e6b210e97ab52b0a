//! Deployment engine (spec §4.5): turns a deployment document into a
//! staged, converged, possibly-rolled-back change to the fleet's desired
//! component set.

pub mod converger;
pub mod document;
pub mod engine;
pub mod error;
pub mod journal;
pub mod reconcile;

pub use converger::{ComponentConverger, StagingService};
pub use document::{DeploymentDocument, DocumentError, FailureHandlingPolicy, PackageConfigEntry};
pub use engine::{DeploymentEngine, DeploymentStatusSink, NullStatusSink};
pub use error::DeploymentError;
pub use journal::{DeploymentJournal, InMemoryDeploymentJournal};
pub use reconcile::{reconcile, ReconciliationPlan};
