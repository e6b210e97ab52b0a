//! Per-component control task (spec §4.4): one `tokio::spawn`ed actor per
//! `ComponentRecord`, driven by a command channel, owning that component's
//! exclusive right to mutate its `ComponentState`.

use std::sync::Arc;
use std::time::Duration;

use edge_core::{Clock, ComponentRecord, ComponentState};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::executor::{ExecutorEvent, ExternalExecutor, HookKind};
use crate::restart_budget::RestartBudget;

/// Commands accepted by a running [`ComponentActor`].
#[derive(Clone, Debug)]
pub enum ActorCommand {
    /// All HARD dependencies are `Installed` or better; run the install hook.
    Install,
    /// All HARD dependencies are `Running`; run the run hook.
    Start,
    /// Operator-requested stop, or a dependency demotion cascading down.
    Stop,
    /// The run hook reported liveness (spec §4.4: "first heartbeat before
    /// the startup timeout").
    Heartbeat,
    /// Ends the actor loop. Only accepted once the component has reached a
    /// terminal state.
    Shutdown,
    /// A HARD dependency was quarantined; fall back to `INSTALLED` without
    /// running the shutdown hook (spec §4.4 restart-budget exhaustion).
    Demote,
}

/// Notifications the actor pushes out to the supervisor that owns it.
#[derive(Clone, Debug)]
pub enum ActorEvent {
    StateChanged { name: String, state: ComponentState },
    RestartBudgetExhausted { name: String },
}

#[derive(Clone, Debug)]
pub struct ActorTimeouts {
    pub startup: Duration,
    pub shutdown: Duration,
    pub hook: Duration,
}

pub struct ComponentHandle {
    pub commands: mpsc::Sender<ActorCommand>,
}

impl ComponentHandle {
    pub async fn send(&self, command: ActorCommand) {
        let _ = self.commands.send(command).await;
    }
}

struct ComponentActor {
    record: ComponentRecord,
    executor: Arc<dyn ExternalExecutor>,
    clock: Arc<dyn Clock>,
    timeouts: ActorTimeouts,
    restart_budget: RestartBudget,
    events_out: mpsc::Sender<ActorEvent>,
    current_handle: Option<crate::executor::ExecutionHandle>,
}

/// Spawns the control task for `record` and returns a handle to send it
/// commands. The task runs until `ActorCommand::Shutdown` is received.
pub fn spawn(
    mut record: ComponentRecord,
    executor: Arc<dyn ExternalExecutor>,
    clock: Arc<dyn Clock>,
    timeouts: ActorTimeouts,
    mut restart_budget: RestartBudget,
    events_out: mpsc::Sender<ActorEvent>,
) -> ComponentHandle {
    record.restart_budget_remaining = restart_budget.remaining(clock.now());
    let (tx, rx) = mpsc::channel(16);
    let actor = ComponentActor {
        record,
        executor,
        clock,
        timeouts,
        restart_budget,
        events_out,
        current_handle: None,
    };
    tokio::spawn(actor.run(rx));
    ComponentHandle { commands: tx }
}

impl ComponentActor {
    async fn run(mut self, mut commands: mpsc::Receiver<ActorCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                ActorCommand::Install => self.handle_install().await,
                ActorCommand::Start => self.handle_start(&mut commands).await,
                ActorCommand::Stop => self.handle_stop().await,
                ActorCommand::Heartbeat => self.handle_heartbeat().await,
                ActorCommand::Demote => self.handle_demote(),
                ActorCommand::Shutdown => break,
            }
        }
    }

    fn name(&self) -> String {
        self.record.identifier.to_string()
    }

    fn transition(&mut self, next: ComponentState) {
        let now = self.clock.now();
        self.record.transition(next, now);
        let _ = self.events_out.try_send(ActorEvent::StateChanged { name: self.name(), state: next });
    }

    async fn run_hook(&mut self, kind: HookKind, command: &str) -> Result<i32, ()> {
        let (tx, mut rx) = mpsc::channel(16);
        let launch = self.executor.launch(&self.name(), kind, command, tx).await;
        let handle = match launch {
            Ok(h) => h,
            Err(err) => {
                warn!(component = %self.name(), hook = kind.as_str(), error = %err, "hook launch failed");
                return Err(());
            }
        };
        self.current_handle = Some(handle);

        let deadline = self.clock.sleep(self.timeouts.hook);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ExecutorEvent::Exit(code)) => return Ok(code),
                    Some(ExecutorEvent::Broken { reason }) => {
                        warn!(component = %self.name(), %reason, "authoritative broken signal during hook");
                        return Err(());
                    }
                    Some(_) => continue,
                    None => return Err(()),
                },
                _ = &mut deadline => {
                    warn!(component = %self.name(), hook = kind.as_str(), "hook exec timeout");
                    return Err(());
                }
            }
        }
    }

    async fn handle_install(&mut self) {
        if !self.record.observed_state.can_transition_to(ComponentState::Installing) {
            return;
        }
        self.transition(ComponentState::Installing);
        let Some(command) = self.record.recipe.hooks.install.clone() else {
            self.transition(ComponentState::Installed);
            return;
        };
        match self.run_hook(HookKind::Install, &command).await {
            Ok(0) => self.transition(ComponentState::Installed),
            _ => self.fail_and_maybe_restart().await,
        }
    }

    /// `STARTING -> RUNNING` happens on the first liveness signal: either the
    /// executor reporting the hook process as `Started`, or an explicit
    /// `Heartbeat` command arriving from outside (e.g. a health-check
    /// channel) while still waiting. Whichever comes first, before the
    /// startup timeout, wins.
    async fn handle_start(&mut self, commands: &mut mpsc::Receiver<ActorCommand>) {
        if !self.record.observed_state.can_transition_to(ComponentState::Starting) {
            return;
        }
        self.transition(ComponentState::Starting);
        let Some(command) = self.record.recipe.hooks.run.clone() else {
            self.transition(ComponentState::Running);
            return;
        };

        let (tx, mut rx) = mpsc::channel(16);
        let launch = self.executor.launch(&self.name(), HookKind::Run, &command, tx).await;
        let handle = match launch {
            Ok(h) => h,
            Err(_) => {
                self.fail_and_maybe_restart().await;
                return;
            }
        };
        self.current_handle = Some(handle);

        let deadline = self.clock.sleep(self.timeouts.startup);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ExecutorEvent::Started { .. }) => {
                        self.transition(ComponentState::Running);
                        info!(component = %self.name(), "run hook started");
                        return;
                    }
                    Some(ExecutorEvent::Broken { .. }) => {
                        self.fail_and_maybe_restart().await;
                        return;
                    }
                    Some(ExecutorEvent::Exit(_)) => {
                        self.fail_and_maybe_restart().await;
                        return;
                    }
                    Some(_) => continue,
                    None => {
                        self.fail_and_maybe_restart().await;
                        return;
                    }
                },
                command = commands.recv() => match command {
                    Some(ActorCommand::Heartbeat) => {
                        self.transition(ComponentState::Running);
                        info!(component = %self.name(), "heartbeat received before startup timeout");
                        return;
                    }
                    Some(ActorCommand::Shutdown) | None => {
                        self.fail_and_maybe_restart().await;
                        return;
                    }
                    Some(_) => continue,
                },
                _ = &mut deadline => {
                    warn!(component = %self.name(), "startup timeout");
                    self.fail_and_maybe_restart().await;
                    return;
                }
            }
        }
    }

    async fn handle_heartbeat(&mut self) {
        debug!(component = %self.name(), "heartbeat");
    }

    fn handle_demote(&mut self) {
        if self.record.observed_state.can_transition_to(ComponentState::Installed) {
            warn!(component = %self.name(), "demoted to installed: a hard dependency was quarantined");
            self.transition(ComponentState::Installed);
        }
    }

    async fn handle_stop(&mut self) {
        if !self.record.observed_state.can_transition_to(ComponentState::Stopping) {
            return;
        }
        self.transition(ComponentState::Stopping);

        if let Some(handle) = self.current_handle {
            let _ = self.executor.request_stop(handle).await;
        }

        let command = self.record.recipe.hooks.shutdown.clone();
        let outcome = if let Some(command) = command {
            self.run_hook(HookKind::Shutdown, &command).await
        } else {
            Ok(0)
        };

        match outcome {
            Ok(_) => self.transition(ComponentState::Finished),
            Err(()) => {
                if let Some(handle) = self.current_handle {
                    let _ = self.executor.request_terminate(handle).await;
                }
                self.transition(ComponentState::Broken);
            }
        }
    }

    async fn fail_and_maybe_restart(&mut self) {
        if !self.record.observed_state.can_transition_to(ComponentState::Errored) {
            self.transition(ComponentState::Broken);
            self.notify_budget_exhausted();
            return;
        }
        self.transition(ComponentState::Errored);

        let now = self.clock.now();
        let allowed = self.restart_budget.record_restart(now);
        self.record.restart_budget_remaining = self.restart_budget.remaining(now);
        if allowed {
            self.transition(ComponentState::Installing);
        } else {
            self.transition(ComponentState::Broken);
            self.notify_budget_exhausted();
        }
    }

    fn notify_budget_exhausted(&self) {
        let _ = self.events_out.try_send(ActorEvent::RestartBudgetExhausted { name: self.name() });
    }
}
