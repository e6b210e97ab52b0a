//! `Session` (spec §3): one underlying MQTT connection the multiplexer owns.
//! Mutated only by the multiplexer's control task (spec §5 concurrency rule).

use std::fmt;
use std::time::Instant;

use rumqttc::AsyncClient;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Connecting,
    Connected,
    Interrupted,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Connected)
                | (Connecting, Interrupted)
                | (Connecting, Closed)
                | (Connected, Interrupted)
                | (Connected, Closed)
                | (Interrupted, Connected)
                | (Interrupted, Closed)
        )
    }

    pub fn is_up(self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

/// One pooled session: a live `rumqttc` client plus the bookkeeping the
/// placement algorithm needs (spec §3's `Session` record).
pub struct Session {
    pub id: SessionId,
    pub client: AsyncClient,
    pub state: SessionState,
    pub subscription_count: u32,
    pub last_subscription_change_at: Instant,
}

impl Session {
    pub fn new(id: SessionId, client: AsyncClient, now: Instant) -> Self {
        Self {
            id,
            client,
            state: SessionState::Connecting,
            subscription_count: 0,
            last_subscription_change_at: now,
        }
    }

    /// Invariant from spec §3: `subscriptionCount <= MAX_SUBS_PER_SESSION`.
    pub fn has_capacity(&self, max_subscriptions_per_session: u32) -> bool {
        self.subscription_count < max_subscriptions_per_session
    }

    pub fn transition(&mut self, next: SessionState, now: Instant) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        self.last_subscription_change_at = now;
    }

    pub fn record_subscribed(&mut self, now: Instant) {
        self.subscription_count += 1;
        self.last_subscription_change_at = now;
    }

    pub fn record_unsubscribed(&mut self, now: Instant) {
        self.subscription_count = self.subscription_count.saturating_sub(1);
        self.last_subscription_change_at = now;
    }

    /// Idle-closure eligibility (spec §4.1 step 4): zero subscriptions and
    /// not the session keeping the pool alive.
    pub fn is_idle(&self) -> bool {
        self.subscription_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_respects_configured_ceiling() {
        let (client, _loop) = AsyncClient::new(rumqttc::MqttOptions::new("t", "localhost", 1883), 10);
        let mut session = Session::new(SessionId(1), client, Instant::now());
        session.subscription_count = 49;
        assert!(session.has_capacity(50));
        session.subscription_count = 50;
        assert!(!session.has_capacity(50));
    }
}
