//! Shared error vocabulary (spec §7).
//!
//! Each subsystem crate defines its own `thiserror::Error` enum scoped to
//! its own failures. This module defines the *cross-cutting* vocabulary that
//! lets the deployment engine and status reporter fold any subsystem error
//! into a report without matching on every concrete error type: every
//! subsystem error implements [`Classify`] to say which [`ErrorKind`] row of
//! the §7 table it belongs to, and how it should render as a
//! [`DetailedStatus`] / [`FailureCause`] pair.

use std::fmt;

/// One row of the §7 error-kind table. Used to pick local-recovery policy
/// (retry vs. surface) independent of which crate raised the error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transient network/IO failure: retried with backoff, never surfaced on its own.
    TransientIo,
    /// Auth/credential expiry: refreshed once, then surfaced.
    CredentialExpiry,
    /// Digest mismatch on a staged artifact: local copy deleted, one re-download.
    Integrity,
    /// Resolver could not satisfy a HARD dependency, or found a HARD cycle.
    UnsatisfiableDependency,
    /// Lifecycle hook exited non-zero or failed to start/stop in time.
    HookFailure,
    /// Broker refused a subscribe/publish for authorization reasons.
    BrokerAuthorization,
    /// Configuration could not be read/validated at boot.
    ConfigRead,
}

impl ErrorKind {
    /// Whether this kind of failure should be retried locally rather than
    /// surfaced immediately, per the §7 table's "Local recovery" column.
    pub fn is_locally_recoverable(self) -> bool {
        matches!(self, ErrorKind::TransientIo)
    }
}

/// Stable, enumerated token surfaced to the control plane (spec §7: "a
/// stable enumerated token"). New values are additive; never repurpose an
/// existing token for a different meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DetailedStatus {
    Succeeded,
    Failed,
    FailedRollbackComplete,
    FailedRollbackNotRequested,
    StaleDeployment,
    UnsatisfiableDependency,
    DependencyCycle,
    IntegrityFailure,
    CredentialExpired,
    HookExecutionFailed,
    BrokerAuthorizationRefused,
    ConfigReadFailed,
}

impl fmt::Display for DetailedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            DetailedStatus::Succeeded => "SUCCEEDED",
            DetailedStatus::Failed => "FAILED",
            DetailedStatus::FailedRollbackComplete => "FAILED_ROLLBACK_COMPLETE",
            DetailedStatus::FailedRollbackNotRequested => "FAILED_ROLLBACK_NOT_REQUESTED",
            DetailedStatus::StaleDeployment => "STALE_DEPLOYMENT",
            DetailedStatus::UnsatisfiableDependency => "UNSATISFIABLE_DEPENDENCY",
            DetailedStatus::DependencyCycle => "DEPENDENCY_CYCLE",
            DetailedStatus::IntegrityFailure => "INTEGRITY_FAILURE",
            DetailedStatus::CredentialExpired => "CREDENTIAL_EXPIRED",
            DetailedStatus::HookExecutionFailed => "HOOK_EXECUTION_FAILED",
            DetailedStatus::BrokerAuthorizationRefused => "BROKER_AUTHORIZATION_REFUSED",
            DetailedStatus::ConfigReadFailed => "CONFIG_READ_FAILED",
        };
        f.write_str(token)
    }
}

/// A one-line, human-readable reason (spec §7: "`failureCause` is a one-line
/// reason"). Kept distinct from `DetailedStatus` so logs/operators get prose
/// while the control plane gets a stable token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureCause(pub String);

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FailureCause {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Implemented by every subsystem error enum so cross-cutting consumers
/// (deployment engine, status reporter) can classify a failure without
/// depending on that subsystem's concrete error type beyond this trait.
pub trait Classify: std::error::Error {
    fn kind(&self) -> ErrorKind;
    fn detailed_status(&self) -> DetailedStatus;
    fn failure_cause(&self) -> FailureCause {
        FailureCause::new(self.to_string())
    }
}
