//! Agent wiring (SPEC_FULL §1): binds `edge-mqtt`, `edge-downloader`,
//! `edge-resolver`, `edge-supervisor`, `edge-deployment`, and `edge-status`
//! into one process, plus the graceful shutdown and tracing bootstrap
//! everything else sits inside.

pub mod adapters;
pub mod agent;
pub mod recipe_store;
pub mod shutdown;
pub mod telemetry;

pub use agent::{Agent, AgentBuildError, AgentBuilder};
pub use recipe_store::InMemoryRecipeStore;
pub use shutdown::ShutdownCoordinator;
