use edge_core::{Classify, DetailedStatus, ErrorKind};

use crate::document::DocumentError;

#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error("deployment {deployment_id} for group {group_id} is stale (timestamp {timestamp} <= last accepted)")]
    Stale { deployment_id: String, group_id: String, timestamp: u64 },
    #[error("malformed deployment document: {0}")]
    Document(#[from] DocumentError),
    #[error("dependency resolution failed: {0}")]
    Unsatisfiable(#[from] edge_resolver::ResolverError),
    #[error("staging artifacts failed: {reason}")]
    StagingFailed { reason: String },
    #[error("supervisor convergence failed: {reason}")]
    ConvergenceFailed { reason: String },
    #[error("durable journal operation failed: {reason}")]
    JournalFailed { reason: String },
}

impl Classify for DeploymentError {
    fn kind(&self) -> ErrorKind {
        match self {
            DeploymentError::Unsatisfiable(_) => ErrorKind::UnsatisfiableDependency,
            // None of these are locally recoverable; HookFailure is the
            // closest-fitting non-retryable bucket in the shared taxonomy.
            _ => ErrorKind::HookFailure,
        }
    }

    fn detailed_status(&self) -> DetailedStatus {
        match self {
            DeploymentError::Stale { .. } => DetailedStatus::StaleDeployment,
            DeploymentError::Unsatisfiable(_) => DetailedStatus::UnsatisfiableDependency,
            _ => DetailedStatus::Failed,
        }
    }
}
