//! The fleet status reporter (spec §4.6): trigger aggregation, cadence
//! suppression during an in-progress deployment, and the single-pending-
//! RECONNECT rule.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use edge_core::Clock;
use tracing::{debug, info, warn};

use crate::chunking;
use crate::error::StatusError;
use crate::payload::{ComponentDetail, DeploymentInformation, MessageType, StatusPayload};
use crate::trigger::Trigger;

/// Delivers one already-chunked, already-serialized payload to the broker.
/// Implemented by `edge-hosting` by adapting the real MQTT multiplexer;
/// kept as a trait so the reporter is testable without one.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), StatusError>;
}

/// A publish attempted while disconnected, held for replay on the next
/// RECONNECT (spec §7: "queued durably and sent at the next RECONNECT";
/// §8 scenario 4). The in-memory queue here stands in for the durable
/// on-disk form named in spec §6; see `edge_deployment::DeploymentJournal`
/// for the equivalent durability trait on the deployment side.
struct QueuedStatus {
    trigger: Trigger,
    deployment_information: Option<DeploymentInformation>,
    component_details: Vec<ComponentDetail>,
}

pub struct StatusReporter {
    thing: String,
    ggc_version: String,
    publisher: Arc<dyn StatusPublisher>,
    chunk_size_bytes: usize,
    clock: Arc<dyn Clock>,
    deployment_in_progress: AtomicBool,
    /// Tracks the aggregate connection state the reporter last observed;
    /// doubles as the single-pending-RECONNECT flag via compare-and-swap on
    /// `on_reconnected` (spec §4.6: "keeps at most one pending RECONNECT").
    connected: AtomicBool,
    queued: StdMutex<VecDeque<QueuedStatus>>,
}

impl StatusReporter {
    pub fn new(thing: impl Into<String>, ggc_version: impl Into<String>, publisher: Arc<dyn StatusPublisher>, chunk_size_bytes: usize, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            thing: thing.into(),
            ggc_version: ggc_version.into(),
            publisher,
            chunk_size_bytes,
            clock,
            deployment_in_progress: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            queued: StdMutex::new(VecDeque::new()),
        })
    }

    pub fn on_deployment_started(&self) {
        self.deployment_in_progress.store(true, Ordering::SeqCst);
    }

    /// Publishes a deployment's terminal status and lifts cadence
    /// suppression (spec §4.6: "rescheduled for the interval after
    /// deployment completion").
    pub async fn on_deployment_completed(&self, trigger: Trigger, deployment_information: DeploymentInformation, component_details: Vec<ComponentDetail>) -> Result<(), StatusError> {
        self.deployment_in_progress.store(false, Ordering::SeqCst);
        self.publish(trigger, Some(deployment_information), component_details).await
    }

    /// Spec §4.6: BROKEN_COMPONENT fires "on any transition into BROKEN
    /// outside of an active deployment"; suppressed while one is in flight,
    /// since that transition is already covered by the deployment's own
    /// terminal report.
    pub async fn on_component_broken(&self, component_details: Vec<ComponentDetail>) -> Result<(), StatusError> {
        if self.deployment_in_progress.load(Ordering::SeqCst) {
            debug!("broken-component trigger suppressed during an in-progress deployment");
            return Ok(());
        }
        self.publish(Trigger::BrokenComponent, None, component_details).await
    }

    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Fires at most one RECONNECT publish per actual down-to-up edge; a
    /// resume signal observed while already marked connected is a no-op.
    /// Anything queued while disconnected is replayed, in arrival order,
    /// before the RECONNECT message itself goes out.
    pub async fn on_reconnected(&self, component_details: Vec<ComponentDetail>) -> Result<(), StatusError> {
        let was_connected = self.connected.swap(true, Ordering::SeqCst);
        if was_connected {
            return Ok(());
        }
        let queued: Vec<QueuedStatus> = self.queued.lock().unwrap().drain(..).collect();
        for item in queued {
            info!(trigger = ?item.trigger, "replaying status queued while disconnected");
            self.send(item.trigger, item.deployment_information, item.component_details).await?;
        }
        info!("publishing reconnect status");
        self.send(Trigger::Reconnect, None, component_details).await
    }

    /// Spec §4.6: cadence publishes are suppressed during an in-progress
    /// deployment rather than skipped outright; the caller's cadence loop
    /// is expected to re-check on its next tick rather than this method
    /// queuing a deferred retry itself.
    pub async fn on_cadence_tick(&self, component_details: Vec<ComponentDetail>) -> Result<(), StatusError> {
        if self.deployment_in_progress.load(Ordering::SeqCst) {
            debug!("cadence publish suppressed during an in-progress deployment");
            return Ok(());
        }
        self.publish(Trigger::Cadence, None, component_details).await
    }

    /// Runs the periodic CADENCE loop until the process exits. Spawn once
    /// per agent; `snapshot` is called fresh on each tick so it always
    /// reports the supervisor's current component set.
    pub fn spawn_cadence_loop(self: Arc<Self>, interval: Duration, snapshot: impl Fn() -> Vec<ComponentDetail> + Send + Sync + 'static) {
        tokio::spawn(async move {
            loop {
                self.clock.sleep(interval).await;
                if let Err(err) = self.on_cadence_tick(snapshot()).await {
                    warn!(error = %err, "cadence status publish failed");
                }
            }
        });
    }

    async fn publish(&self, trigger: Trigger, deployment_information: Option<DeploymentInformation>, component_details: Vec<ComponentDetail>) -> Result<(), StatusError> {
        if !self.connected.load(Ordering::SeqCst) {
            debug!(?trigger, "no publish attempted while disconnected, queuing for replay");
            self.queued.lock().unwrap().push_back(QueuedStatus { trigger, deployment_information, component_details });
            return Ok(());
        }
        self.send(trigger, deployment_information, component_details).await
    }

    async fn send(&self, trigger: Trigger, deployment_information: Option<DeploymentInformation>, component_details: Vec<ComponentDetail>) -> Result<(), StatusError> {
        let overall_status = StatusPayload::overall_status_for(&component_details);
        let template = StatusPayload {
            ggc_version: self.ggc_version.clone(),
            thing: self.thing.clone(),
            overall_status,
            message_type: MessageType::Complete,
            trigger,
            chunk_info: None,
            deployment_information,
            component_details,
        };

        for chunk in chunking::chunk(&template, self.chunk_size_bytes) {
            let bytes = serde_json::to_vec(&chunk).map_err(|source| StatusError::PublishFailed { reason: source.to_string() })?;
            self.publisher.publish(bytes).await?;
        }
        Ok(())
    }
}
