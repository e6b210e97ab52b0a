//! Shared data model, error taxonomy, clock, retry policy, and
//! configuration snapshot used by every edge-agent crate.
//!
//! Nothing in this crate talks to the network or the filesystem; it exists
//! so the satellite crates (`edge-mqtt`, `edge-downloader`, `edge-resolver`,
//! `edge-supervisor`, `edge-deployment`, `edge-status`) share one vocabulary
//! for identifiers, errors, and time instead of redefining it per crate.

pub mod artifact;
pub mod clock;
pub mod component;
pub mod config;
pub mod credentials;
pub mod deployment;
pub mod error;
pub mod identifier;
pub mod observability;
pub mod recipe;
pub mod retry;

pub use artifact::{ArtifactRef, DigestAlgorithm};
pub use clock::{Clock, MockClock, Sleep, SystemClock};
pub use component::{ComponentRecord, ComponentState};
pub use config::{AgentConfig, ConfigSnapshot};
pub use credentials::{CredentialFetchError, CredentialGate, CredentialRotationRequested, RegistryCredentials};
pub use deployment::{ConfigurationArn, Deployment, DeploymentId, DeploymentSource, FailurePolicy, GroupId, RootComponentRequest};
pub use error::{Classify, DetailedStatus, ErrorKind, FailureCause};
pub use identifier::ComponentIdentifier;
pub use recipe::{DependencyKind, DependencySpec, LifecycleHooks, PlatformSelector, Recipe};
pub use retry::{BackoffSchedule, RetryAdvice, RetryClass, RetryState};
