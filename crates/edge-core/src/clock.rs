//! Injectable time source.
//!
//! Every subsystem that waits on a timeout, backoff, or cadence takes a
//! `Arc<dyn Clock>` instead of calling `tokio::time` directly, so tests can
//! swap in [`MockClock`] and advance time deterministically instead of
//! sleeping in wall-clock time.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// A boxed future that completes once a [`Clock`]'s requested duration has
/// elapsed.
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstracts "what time is it" / "wait until later" so retry backoff,
/// restart-budget windows, and status cadence can be driven by a virtual
/// clock in tests.
///
/// Implementations must guarantee `now()` is monotonic and that the future
/// returned by `sleep` does not complete before the requested duration has
/// elapsed.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// Production clock backed by Tokio's timer wheel.
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Virtual clock for deterministic tests: time only moves when [`MockClock::advance`]
/// is called, which wakes every sleeper whose deadline has passed.
#[derive(Clone, Debug)]
pub struct MockClock {
    inner: Arc<MockClockInner>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    pub fn with_start(origin: Instant) -> Self {
        Self {
            inner: Arc::new(MockClockInner {
                state: Mutex::new(ClockState {
                    origin,
                    elapsed: Duration::ZERO,
                    sleepers: Vec::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Advances virtual time by `delta` and wakes every sleeper whose
    /// deadline is now in the past, in registration order.
    pub fn advance(&self, delta: Duration) {
        if delta.is_zero() {
            return;
        }
        let mut to_wake = Vec::new();
        let mut guard = self.inner.state.lock().expect("mock clock poisoned");
        guard.elapsed = guard.elapsed.saturating_add(delta);
        let elapsed = guard.elapsed;
        guard.sleepers.retain(|entry| {
            if entry.cancelled.load(Ordering::SeqCst) {
                return false;
            }
            if elapsed >= entry.deadline {
                entry.completed.store(true, Ordering::SeqCst);
                if let Some(waker) = entry.take_waker() {
                    to_wake.push(waker);
                }
                false
            } else {
                true
            }
        });
        drop(guard);
        for waker in to_wake {
            waker.wake();
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.state.lock().expect("mock clock poisoned").elapsed
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let guard = self.inner.state.lock().expect("mock clock poisoned");
        guard.origin + guard.elapsed
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        let state = {
            let mut guard = self.inner.state.lock().expect("mock clock poisoned");
            let deadline = guard.elapsed.saturating_add(duration);
            let id = guard.next_id;
            guard.next_id += 1;
            let state = Arc::new(SleepState::new(id, deadline));
            guard.sleepers.push(Arc::clone(&state));
            state
        };
        Box::pin(MockSleep {
            inner: Arc::clone(&self.inner),
            state,
        })
    }
}

#[derive(Debug)]
struct MockClockInner {
    state: Mutex<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    origin: Instant,
    elapsed: Duration,
    sleepers: Vec<Arc<SleepState>>,
    next_id: usize,
}

#[derive(Debug)]
struct SleepState {
    id: usize,
    deadline: Duration,
    waker: Mutex<Option<Waker>>,
    completed: AtomicBool,
    cancelled: AtomicBool,
}

impl SleepState {
    fn new(id: usize, deadline: Duration) -> Self {
        Self {
            id,
            deadline,
            waker: Mutex::new(None),
            completed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    fn take_waker(&self) -> Option<Waker> {
        self.waker.lock().expect("sleep state waker lock").take()
    }

    fn store_waker(&self, waker: &Waker) {
        let mut guard = self.waker.lock().expect("sleep state waker lock");
        if guard.as_ref().is_some_and(|existing| existing.will_wake(waker)) {
            return;
        }
        *guard = Some(waker.clone());
    }
}

struct MockSleep {
    inner: Arc<MockClockInner>,
    state: Arc<SleepState>,
}

impl Future for MockSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.state.cancelled.load(Ordering::SeqCst) || self.state.completed.load(Ordering::SeqCst) {
            return Poll::Ready(());
        }
        let elapsed = self.inner.state.lock().expect("mock clock poisoned").elapsed;
        if elapsed >= self.state.deadline {
            self.state.completed.store(true, Ordering::SeqCst);
            return Poll::Ready(());
        }
        self.state.store_waker(cx.waker());
        Poll::Pending
    }
}

impl Drop for MockSleep {
    fn drop(&mut self) {
        if !self.state.completed.load(Ordering::SeqCst) {
            self.state.cancelled.store(true, Ordering::SeqCst);
            self.state.take_waker();
            if let Ok(mut guard) = self.inner.state.lock() {
                guard.sleepers.retain(|entry| entry.id != self.state.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_clock_wakes_sleepers_in_registration_order() {
        let clock = MockClock::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = clock.sleep(Duration::from_secs(1));
        let second = clock.sleep(Duration::from_secs(1));

        let o1 = Arc::clone(&order);
        let o2 = Arc::clone(&order);
        let h1 = tokio::spawn(async move {
            first.await;
            o1.lock().unwrap().push(1);
        });
        let h2 = tokio::spawn(async move {
            second.await;
            o2.lock().unwrap().push(2);
        });

        tokio::task::yield_now().await;
        clock.advance(Duration::from_secs(1));
        h1.await.unwrap();
        h2.await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn sleep_not_ready_before_deadline() {
        let clock = MockClock::new();
        let mut sleep = clock.sleep(Duration::from_millis(500));
        clock.advance(Duration::from_millis(400));
        assert!(futures_poll_once(&mut sleep).is_pending());
        clock.advance(Duration::from_millis(100));
        sleep.await;
    }

    fn futures_poll_once<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
        use std::task::{RawWaker, RawWakerVTable};
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        let raw = RawWaker::new(std::ptr::null(), &VTABLE);
        let waker = unsafe { Waker::from_raw(raw) };
        let mut cx = Context::from_waker(&waker);
        Pin::new(fut).poll(&mut cx)
    }
}
