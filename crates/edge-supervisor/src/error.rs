use edge_core::{Classify, ComponentState, DetailedStatus, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("{hook} hook for {component} exited non-zero: {code}")]
    HookFailed { component: String, hook: &'static str, code: i32 },
    #[error("{component} did not report RUNNING before its startup timeout")]
    StartupTimeout { component: String },
    #[error("{component} did not terminate within its shutdown grace period")]
    ShutdownTimeout { component: String },
    #[error("{component} exhausted its restart budget and is quarantined")]
    RestartBudgetExhausted { component: String },
    #[error("executor failed to launch {component}'s {hook} hook: {reason}")]
    ExecutorLaunchFailed { component: String, hook: &'static str, reason: String },
    #[error("dependency graph has a hard-dependency cycle among: {0:?}")]
    DependencyCycle(Vec<String>),
    #[error("{component} did not converge to {expected:?}, observed {actual:?}")]
    ConvergenceIncomplete { component: String, expected: ComponentState, actual: ComponentState },
}

impl Classify for SupervisorError {
    fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::DependencyCycle(_) => ErrorKind::UnsatisfiableDependency,
            _ => ErrorKind::HookFailure,
        }
    }

    fn detailed_status(&self) -> DetailedStatus {
        match self {
            SupervisorError::DependencyCycle(_) => DetailedStatus::DependencyCycle,
            _ => DetailedStatus::HookExecutionFailed,
        }
    }
}
