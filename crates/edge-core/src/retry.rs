//! Shared retry/backoff policy (spec §4.1 reconnect policy, §4.2 download
//! retry policy). Both the MQTT multiplexer's per-session reconnect and the
//! downloader's connection-class retries are "exponential backoff with
//! jitter, capped interval", so this lives once in `edge-core` instead of
//! being reimplemented per crate.

use std::time::Duration;

use rand::Rng;

/// A recommendation of how long to wait before retrying, with an optional
/// human-readable reason for logging.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryAdvice {
    pub wait: Duration,
    pub reason: Option<String>,
}

impl RetryAdvice {
    pub const fn after(wait: Duration) -> Self {
        Self { wait, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Which retry regime an error belongs to (spec §4.2):
///
/// - `Connection`: transport error, DNS failure, 5xx. Infinite attempts with
///   a capped interval, but only while the aggregate network layer is
///   online; while offline, retries pause and do not count against any
///   budget.
/// - `Bounded`: authentication-class and service-unavailable failures.
///   Finite attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    Connection,
    Bounded,
}

/// Exponential backoff with full jitter, capped at `max_interval`. Stateless
/// other than the attempt counter the caller threads through; safe to share
/// behind an `Arc` since it does not mutate.
#[derive(Clone, Debug)]
pub struct BackoffSchedule {
    pub base: Duration,
    pub max_interval: Duration,
    pub max_attempts: Option<u32>,
}

impl BackoffSchedule {
    pub fn unbounded(base: Duration, max_interval: Duration) -> Self {
        Self {
            base,
            max_interval,
            max_attempts: None,
        }
    }

    pub fn bounded(base: Duration, max_interval: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_interval,
            max_attempts: Some(max_attempts),
        }
    }

    /// Returns `None` once `attempt` exceeds `max_attempts` (1-indexed),
    /// signalling the caller should give up and surface the failure.
    pub fn advice_for_attempt(&self, attempt: u32) -> Option<RetryAdvice> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        let exponent = attempt.min(16);
        let unjittered = self.base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
        let capped = unjittered.min(self.max_interval);
        let jittered = jitter(capped);
        Some(RetryAdvice::after(jittered))
    }
}

fn jitter(duration: Duration) -> Duration {
    if duration.is_zero() {
        return duration;
    }
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.5..=1.0);
    Duration::from_secs_f64(duration.as_secs_f64() * factor)
}

/// Tracks retry attempts for one operation (one artifact download, one MQTT
/// session) against a [`BackoffSchedule`], understanding the "pause while
/// offline, resume without counting offline time" rule from spec §4.2.
#[derive(Clone, Debug)]
pub struct RetryState {
    schedule: BackoffSchedule,
    attempt: u32,
}

impl RetryState {
    pub fn new(schedule: BackoffSchedule) -> Self {
        Self { schedule, attempt: 0 }
    }

    /// Call after a failed attempt. Returns the advice for the *next*
    /// attempt, or `None` if the budget (for `Bounded` schedules) is
    /// exhausted.
    pub fn record_failure(&mut self) -> Option<RetryAdvice> {
        self.attempt += 1;
        self.schedule.advice_for_attempt(self.attempt)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_schedule_exhausts_after_max_attempts() {
        let schedule = BackoffSchedule::bounded(Duration::from_millis(10), Duration::from_secs(1), 3);
        let mut state = RetryState::new(schedule);
        assert!(state.record_failure().is_some());
        assert!(state.record_failure().is_some());
        assert!(state.record_failure().is_some());
        assert!(state.record_failure().is_none());
    }

    #[test]
    fn unbounded_schedule_never_exhausts() {
        let schedule = BackoffSchedule::unbounded(Duration::from_millis(10), Duration::from_secs(1));
        let mut state = RetryState::new(schedule);
        for _ in 0..1000 {
            assert!(state.record_failure().is_some());
        }
    }

    #[test]
    fn backoff_is_capped_at_max_interval() {
        let schedule = BackoffSchedule::unbounded(Duration::from_secs(1), Duration::from_secs(5));
        let advice = schedule.advice_for_attempt(20).unwrap();
        assert!(advice.wait <= Duration::from_secs(5));
    }

    #[test]
    fn reset_restarts_the_attempt_counter() {
        let schedule = BackoffSchedule::bounded(Duration::from_millis(10), Duration::from_secs(1), 1);
        let mut state = RetryState::new(schedule);
        assert!(state.record_failure().is_some());
        assert!(state.record_failure().is_none());
        state.reset();
        assert!(state.record_failure().is_some());
    }
}
