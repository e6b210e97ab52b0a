//! Graceful shutdown (SPEC_FULL §1.5): a `CancellationToken` every
//! long-running task observes, plus a `JoinSet` the coordinator drains on
//! `shutdown()` so no task is left detached.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Registers a task the coordinator will wait on during `shutdown`.
    /// `task` is expected to observe `token()` and return once cancelled.
    pub fn spawn(&mut self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        self.tasks.spawn(task);
    }

    /// Cancels the token and waits up to `grace_period` for every spawned
    /// task to finish; any stragglers are abandoned and logged, not killed
    /// (process exit reclaims them).
    pub async fn shutdown(mut self, grace_period: Duration) {
        self.token.cancel();
        let drain = async {
            while self.tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(grace_period, drain).await.is_err() {
            warn!("shutdown grace period elapsed with tasks still running");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn spawned_tasks_observe_cancellation_and_are_awaited() {
        let mut coordinator = ShutdownCoordinator::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let token = coordinator.token();
        let ran_clone = Arc::clone(&ran);
        coordinator.spawn(async move {
            token.cancelled().await;
            ran_clone.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.shutdown(Duration::from_secs(1)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
