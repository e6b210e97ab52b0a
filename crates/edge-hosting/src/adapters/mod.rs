//! Collaborator adapters binding the subsystem crates to the interfaces
//! `edge-deployment` and `edge-status` expect a host to supply.

mod converger;
mod staging;
mod status_publisher;
mod status_sink;

pub use converger::SupervisorConverger;
pub use staging::StagingAdapter;
pub use status_publisher::MqttStatusPublisher;
pub use status_sink::SupervisorBackedStatusSink;
