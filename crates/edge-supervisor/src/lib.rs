//! Component lifecycle supervisor (spec §4.4): per-component control tasks
//! driven by an `ExternalExecutor`, sequenced through dependency-ordered
//! start/stop, with a rolling restart budget and dependent demotion.

pub mod actor;
pub mod error;
pub mod executor;
pub mod restart_budget;
pub mod supervisor;
pub mod topology;

pub use actor::{ActorCommand, ActorEvent, ActorTimeouts, ComponentHandle};
pub use error::SupervisorError;
pub use executor::{ExecutionHandle, ExecutorEvent, ExternalExecutor, HookKind, InProcessExecutor};
pub use restart_budget::RestartBudget;
pub use supervisor::Supervisor;
pub use topology::{start_layers, stop_layers};
