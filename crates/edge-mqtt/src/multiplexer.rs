//! The `Multiplexer` (spec §4.1): single subscribe/unsubscribe/publish/
//! connection-listener surface over a pool of [`Session`]s.
//!
//! Sessions live in a `DashMap` keyed by [`SessionId`]: lookups, inserts,
//! and the per-session state mutation placement needs all go through that
//! map's own sharded, per-entry guards, so working on one session never
//! blocks another.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use rumqttc::{ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use edge_core::retry::{BackoffSchedule, RetryState};
use edge_core::{Clock, SystemClock};

use crate::error::MqttError;
use crate::filter::{covers, matches};
use crate::session::{Session, SessionId, SessionState};

pub type Callback = Arc<dyn Fn(IncomingMessage) + Send + Sync>;
pub type ConnectionCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub topic: String,
    pub payload: Bytes,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SubscriptionToken(u64);

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct LocalSubscription {
    filter: String,
    callback: Callback,
    session: SessionId,
    broker_filter: String,
}

struct BrokerSubscription {
    session: SessionId,
    refcount: u32,
}

struct ConnectionListener {
    on_interrupt: ConnectionCallback,
    on_resume: ConnectionCallback,
}

/// How long an idle, non-last session is kept around before closure
/// (spec §4.1 step 4: "schedule it for closure after an idle grace period").
const IDLE_GRACE_PERIOD: Duration = Duration::from_secs(60);

/// Builds `MqttOptions` for a fresh session. The broker address, credentials,
/// and keepalive are host-provided (spec §1: connection provisioning is an
/// external collaborator); the multiplexer only owns pool topology.
pub trait SessionOptionsFactory: Send + Sync {
    fn build(&self, session_id: SessionId) -> MqttOptions;
}

pub struct Multiplexer {
    sessions: DashMap<SessionId, Session>,
    next_session_id: AtomicU64,
    broker_subscriptions: DashMap<String, BrokerSubscription>,
    local_subscriptions: DashMap<SubscriptionToken, LocalSubscription>,
    next_token: AtomicU64,
    connection_listeners: AsyncMutex<Vec<ConnectionListener>>,
    aggregate_online: AtomicBool,
    options_factory: Arc<dyn SessionOptionsFactory>,
    max_subscriptions_per_session: u32,
    clock: Arc<dyn Clock>,
}

impl Multiplexer {
    pub fn new(options_factory: Arc<dyn SessionOptionsFactory>, max_subscriptions_per_session: u32) -> Arc<Self> {
        Self::with_clock(options_factory, max_subscriptions_per_session, Arc::new(SystemClock))
    }

    pub fn with_clock(
        options_factory: Arc<dyn SessionOptionsFactory>,
        max_subscriptions_per_session: u32,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            next_session_id: AtomicU64::new(1),
            broker_subscriptions: DashMap::new(),
            local_subscriptions: DashMap::new(),
            next_token: AtomicU64::new(1),
            connection_listeners: AsyncMutex::new(Vec::new()),
            aggregate_online: AtomicBool::new(false),
            options_factory,
            max_subscriptions_per_session,
            clock,
        })
    }

    pub async fn add_connection_listener(self: &Arc<Self>, on_interrupt: ConnectionCallback, on_resume: ConnectionCallback) {
        self.connection_listeners.lock().await.push(ConnectionListener { on_interrupt, on_resume });
    }

    fn is_online(&self) -> bool {
        self.sessions.iter().any(|entry| entry.value().state.is_up())
    }

    /// Spawns a new session and its driving task. Not `pub`: reached only
    /// through `subscribe`'s placement algorithm or eager warm-up at startup.
    fn spawn_session(self: &Arc<Self>) -> SessionId {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::SeqCst));
        let options = self.options_factory.build(id);
        let (client, event_loop) = rumqttc::AsyncClient::new(options, 256);
        self.sessions.insert(id, Session::new(id, client, Instant::now()));
        let this = Arc::clone(self);
        tokio::spawn(async move { this.drive_session(id, event_loop).await });
        id
    }

    fn pick_session_with_capacity(&self) -> Option<SessionId> {
        self.sessions
            .iter()
            .find(|entry| entry.value().has_capacity(self.max_subscriptions_per_session))
            .map(|entry| *entry.key())
    }

    /// Step 1 of the placement algorithm: a filter already subsumed by an
    /// active broker subscription needs no broker round-trip.
    fn find_covering_broker_filter(&self, filter: &str) -> Option<String> {
        self.broker_subscriptions
            .iter()
            .find(|entry| covers(entry.key(), filter))
            .map(|entry| entry.key().clone())
    }

    /// Subscribes `filter`, invoking `callback` at most once per matching
    /// message (spec §4.1 public contract / §8 invariant 1).
    pub async fn subscribe(self: &Arc<Self>, filter: impl Into<String>, qos: QoS, callback: Callback) -> Result<SubscriptionToken, MqttError> {
        let filter = filter.into();
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::SeqCst));

        if let Some(broker_filter) = self.find_covering_broker_filter(&filter) {
            let session = self
                .broker_subscriptions
                .get(&broker_filter)
                .map(|entry| entry.session)
                .expect("just located this broker filter");
            self.broker_subscriptions.get_mut(&broker_filter).unwrap().refcount += 1;
            self.local_subscriptions.insert(
                token,
                LocalSubscription { filter, callback, session, broker_filter },
            );
            return Ok(token);
        }

        let session_id = self.pick_session_with_capacity().unwrap_or_else(|| self.spawn_session());
        let client = self.sessions.get(&session_id).expect("session just created/found").client.clone();

        client.subscribe(&filter, qos).await.map_err(MqttError::Transient)?;

        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.record_subscribed(Instant::now());
        }
        self.broker_subscriptions.insert(filter.clone(), BrokerSubscription { session: session_id, refcount: 1 });
        self.local_subscriptions.insert(
            token,
            LocalSubscription { filter: filter.clone(), callback, session: session_id, broker_filter: filter },
        );
        Ok(token)
    }

    /// Removes the local callback; releases the broker-side subscription
    /// only once no remaining local filter is subsumed by it (spec §4.1
    /// step 4).
    pub async fn unsubscribe(self: &Arc<Self>, token: SubscriptionToken) -> Result<(), MqttError> {
        let Some((_, removed)) = self.local_subscriptions.remove(&token) else {
            return Ok(());
        };

        let should_release = {
            let mut entry = match self.broker_subscriptions.get_mut(&removed.broker_filter) {
                Some(entry) => entry,
                None => return Ok(()),
            };
            entry.refcount = entry.refcount.saturating_sub(1);
            entry.refcount == 0
        };

        if !should_release {
            return Ok(());
        }

        self.broker_subscriptions.remove(&removed.broker_filter);
        let client = self.sessions.get(&removed.session).map(|entry| entry.client.clone());
        if let Some(client) = client {
            client.unsubscribe(&removed.broker_filter).await.map_err(MqttError::Transient)?;
        }

        let now = Instant::now();
        let became_idle = if let Some(mut entry) = self.sessions.get_mut(&removed.session) {
            entry.record_unsubscribed(now);
            entry.is_idle()
        } else {
            false
        };

        if became_idle && self.sessions.len() > 1 {
            let this = Arc::clone(self);
            let session_id = removed.session;
            tokio::spawn(async move {
                tokio::time::sleep(IDLE_GRACE_PERIOD).await;
                this.close_if_still_idle(session_id).await;
            });
        }

        Ok(())
    }

    async fn close_if_still_idle(&self, session_id: SessionId) {
        if self.sessions.len() <= 1 {
            return;
        }
        let Some(mut entry) = self.sessions.get_mut(&session_id) else {
            return;
        };
        if entry.is_idle() {
            let client = entry.client.clone();
            entry.transition(SessionState::Closed, Instant::now());
            drop(entry);
            let _ = client.disconnect().await;
            self.sessions.remove(&session_id);
        }
    }

    /// Publishes with at-least-once semantics; fails only once every session
    /// stays offline past `deadline` (spec §4.1).
    pub async fn publish(self: &Arc<Self>, topic: impl Into<String>, payload: impl Into<Bytes>, qos: QoS, deadline: Instant) -> Result<(), MqttError> {
        let topic = topic.into();
        let payload = payload.into();
        let mut retry = RetryState::new(BackoffSchedule::unbounded(Duration::from_millis(200), Duration::from_secs(10)));

        loop {
            let candidate = self
                .sessions
                .iter()
                .find(|entry| entry.value().state.is_up())
                .map(|entry| entry.value().client.clone());

            if let Some(client) = candidate {
                match client.publish(&topic, qos, false, payload.clone()).await {
                    Ok(()) => return Ok(()),
                    Err(err) => {
                        warn!(%topic, error = %err, "publish attempt failed, retrying on same session");
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(MqttError::NoConnection);
            }

            let wait = retry
                .record_failure()
                .map(|advice| advice.wait)
                .unwrap_or(Duration::from_secs(1));
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.clock.sleep(wait.min(remaining)).await;
            if Instant::now() >= deadline {
                return Err(MqttError::NoConnection);
            }
        }
    }

    fn dispatch(&self, session_id: SessionId, message: IncomingMessage) {
        for entry in self.local_subscriptions.iter() {
            let sub = entry.value();
            if sub.session == session_id && matches(&sub.filter, &message.topic) {
                let callback = Arc::clone(&sub.callback);
                let message = message.clone();
                // A callback raising must not prevent other callbacks from
                // running (spec §4.1 dispatch rule); isolate each invocation.
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(message)));
                if result.is_err() {
                    warn!(topic = %entry.value().filter, "subscriber callback panicked, continuing dispatch");
                }
            }
        }
    }

    async fn on_connected(self: &Arc<Self>, session_id: SessionId) {
        let was_online = self.aggregate_online.swap(true, Ordering::SeqCst);
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            if entry.state != SessionState::Connected {
                entry.transition(SessionState::Connected, Instant::now());
            }
        }
        self.reissue_placed_subscriptions(session_id).await;
        if !was_online {
            info!("mqtt aggregate connection state: up");
            let listeners = self.connection_listeners.lock().await;
            for listener in listeners.iter() {
                (listener.on_resume)();
            }
        }
    }

    async fn on_interrupted(self: &Arc<Self>, session_id: SessionId) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.transition(SessionState::Interrupted, Instant::now());
        }
        if !self.is_online() {
            let was_online = self.aggregate_online.swap(false, Ordering::SeqCst);
            if was_online {
                warn!("mqtt aggregate connection state: down");
                let listeners = self.connection_listeners.lock().await;
                for listener in listeners.iter() {
                    (listener.on_interrupt)();
                }
            }
        }
    }

    /// On resume, previously-placed broker subscriptions are reissued before
    /// any publish attempts complete (spec §4.1 reconnect policy).
    async fn reissue_placed_subscriptions(&self, session_id: SessionId) {
        let filters: Vec<String> = self
            .broker_subscriptions
            .iter()
            .filter(|entry| entry.value().session == session_id)
            .map(|entry| entry.key().clone())
            .collect();
        if filters.is_empty() {
            return;
        }
        let Some(client) = self.sessions.get(&session_id).map(|entry| entry.client.clone()) else {
            return;
        };
        for filter in filters {
            if let Err(err) = client.subscribe(&filter, QoS::AtLeastOnce).await {
                warn!(%filter, error = %err, "failed to reissue subscription on reconnect");
            }
        }
    }

    async fn drive_session(self: Arc<Self>, session_id: SessionId, mut event_loop: EventLoop) {
        let mut retry = RetryState::new(BackoffSchedule::unbounded(Duration::from_millis(500), Duration::from_secs(30)));
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    retry.reset();
                    self.on_connected(session_id).await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(topic = %publish.topic, "incoming publish");
                    self.dispatch(
                        session_id,
                        IncomingMessage {
                            topic: publish.topic,
                            payload: publish.payload,
                        },
                    );
                }
                Ok(_) => {}
                Err(ConnectionError::RequestsDone) => {
                    break;
                }
                Err(err) => {
                    warn!(session = %session_id, error = %err, "session connection error");
                    self.on_interrupted(session_id).await;
                    let wait = retry.record_failure().map(|advice| advice.wait).unwrap_or(Duration::from_secs(30));
                    self.clock.sleep(wait).await;
                }
            }
        }
    }
}

#[derive(Default)]
pub struct StaticSessionOptionsFactory {
    pub host: String,
    pub port: u16,
    pub client_id_prefix: String,
    pub keep_alive: Duration,
}

impl SessionOptionsFactory for StaticSessionOptionsFactory {
    fn build(&self, session_id: SessionId) -> MqttOptions {
        let mut options = MqttOptions::new(format!("{}-{}", self.client_id_prefix, session_id), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covering_filter_lookup_prefers_broader_active_filter() {
        let factory = Arc::new(StaticSessionOptionsFactory {
            host: "localhost".into(),
            port: 1883,
            client_id_prefix: "test".into(),
            keep_alive: Duration::from_secs(30),
        });
        let mux = Multiplexer::new(factory, 50);
        mux.broker_subscriptions.insert(
            "spark/+/status".to_string(),
            BrokerSubscription { session: SessionId(1), refcount: 1 },
        );
        assert_eq!(
            mux.find_covering_broker_filter("spark/dev1/status"),
            Some("spark/+/status".to_string())
        );
        assert_eq!(mux.find_covering_broker_filter("other/topic"), None);
    }

    #[test]
    fn dispatch_invokes_each_distinct_callback_once() {
        let factory = Arc::new(StaticSessionOptionsFactory {
            host: "localhost".into(),
            port: 1883,
            client_id_prefix: "test".into(),
            keep_alive: Duration::from_secs(30),
        });
        let mux = Multiplexer::new(factory, 50);
        let calls = Arc::new(AtomicU64::new(0));
        let calls_clone = Arc::clone(&calls);
        mux.local_subscriptions.insert(
            SubscriptionToken(1),
            LocalSubscription {
                filter: "spark/+/status".into(),
                callback: Arc::new(move |_msg| {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                }),
                session: SessionId(7),
                broker_filter: "spark/+/status".into(),
            },
        );
        mux.dispatch(
            SessionId(7),
            IncomingMessage { topic: "spark/dev1/status".into(), payload: Bytes::new() },
        );
        mux.dispatch(
            SessionId(9),
            IncomingMessage { topic: "spark/dev1/status".into(), payload: Bytes::new() },
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
