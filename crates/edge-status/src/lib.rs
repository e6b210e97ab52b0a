//! Fleet status reporter (spec §4.6): aggregates component-state triggers
//! into compact, chunked status payloads.

pub mod chunking;
pub mod error;
pub mod payload;
pub mod reporter;
pub mod trigger;

pub use chunking::chunk;
pub use error::StatusError;
pub use payload::{ChunkInfo, ComponentDetail, DeploymentInformation, MessageType, OverallStatus, StatusPayload};
pub use reporter::{StatusPublisher, StatusReporter};
pub use trigger::Trigger;
