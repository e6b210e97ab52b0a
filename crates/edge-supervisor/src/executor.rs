//! `ExternalExecutor` (spec §4.4 collaborator interface): the supervisor
//! does not care whether a hook runs in-process, as a subprocess, or as a
//! managed service — only that it gets these signals back.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SupervisorError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ExecutionHandle(pub u64);

#[derive(Clone, Debug)]
pub enum ExecutorEvent {
    Started { pid: Option<u32> },
    Stdout(String),
    Stderr(String),
    Exit(i32),
    /// Authoritative BROKEN signal (spec §4.4: "the hosting process was
    /// killed without request") independent of a clean exit code.
    Broken { reason: String },
}

/// Which lifecycle hook a launch corresponds to, purely for error context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookKind {
    Install,
    Run,
    Shutdown,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::Install => "install",
            HookKind::Run => "run",
            HookKind::Shutdown => "shutdown",
        }
    }
}

#[async_trait]
pub trait ExternalExecutor: Send + Sync {
    /// Launches `command` (the recipe's opaque hook string) for `component`,
    /// streaming lifecycle events on `events` until the hook process exits.
    async fn launch(&self, component: &str, kind: HookKind, command: &str, events: mpsc::Sender<ExecutorEvent>) -> Result<ExecutionHandle, SupervisorError>;

    async fn request_stop(&self, handle: ExecutionHandle) -> Result<(), SupervisorError>;

    async fn request_terminate(&self, handle: ExecutionHandle) -> Result<(), SupervisorError>;
}

/// Deterministic test double: runs a registered closure in-process instead
/// of spawning a real process, immediately emitting `Started` then `Exit`.
/// Host-OS process spawning is out of scope (spec §1); production code
/// wires a real executor in its place.
pub struct InProcessExecutor<F> {
    behavior: F,
    next_handle: std::sync::atomic::AtomicU64,
}

impl<F> InProcessExecutor<F>
where
    F: Fn(&str, HookKind, &str) -> i32 + Send + Sync,
{
    pub fn new(behavior: F) -> Self {
        Self { behavior, next_handle: std::sync::atomic::AtomicU64::new(1) }
    }
}

#[async_trait]
impl<F> ExternalExecutor for InProcessExecutor<F>
where
    F: Fn(&str, HookKind, &str) -> i32 + Send + Sync,
{
    async fn launch(&self, component: &str, kind: HookKind, command: &str, events: mpsc::Sender<ExecutorEvent>) -> Result<ExecutionHandle, SupervisorError> {
        let handle = ExecutionHandle(self.next_handle.fetch_add(1, std::sync::atomic::Ordering::SeqCst));
        let exit_code = (self.behavior)(component, kind, command);
        let _ = events.send(ExecutorEvent::Started { pid: None }).await;
        let _ = events.send(ExecutorEvent::Exit(exit_code)).await;
        Ok(handle)
    }

    async fn request_stop(&self, _handle: ExecutionHandle) -> Result<(), SupervisorError> {
        Ok(())
    }

    async fn request_terminate(&self, _handle: ExecutionHandle) -> Result<(), SupervisorError> {
        Ok(())
    }
}
