//! Wait policies applied when a bucket is exhausted.
//!
//! The default policy blocks the calling thread until the server's reset
//! window has passed plus a safety margin. An async scheduler could swap in
//! a policy that yields instead of blocking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

/// Strategy invoked when a route has no local budget left.
pub trait WaitPolicy: Send + Sync {
    /// `route` is the route name, `reset_secs` the seconds until the
    /// server refills the bucket.
    fn perform(&self, route: &str, reset_secs: u64);
}

impl<F> WaitPolicy for F
where
    F: Fn(&str, u64) + Send + Sync,
{
    fn perform(&self, route: &str, reset_secs: u64) {
        self(route, reset_secs)
    }
}

/// How a blocking wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Interrupted,
}

#[derive(Default)]
struct InterruptState {
    generation: Mutex<u64>,
    wake: Condvar,
}

/// Wakes every thread currently blocked in [`Interrupter::sleep`].
///
/// Cloning is cheap; clones share the same wake-up channel.
#[derive(Clone, Default)]
pub struct Interrupter {
    state: Arc<InterruptState>,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block for `duration` unless interrupted first.
    pub fn sleep(&self, duration: Duration) -> WaitOutcome {
        let deadline = Instant::now() + duration;
        let mut generation = self.state.generation.lock();
        let started_at = *generation;

        loop {
            if *generation != started_at {
                return WaitOutcome::Interrupted;
            }
            if self
                .state
                .wake
                .wait_until(&mut generation, deadline)
                .timed_out()
            {
                return if *generation != started_at {
                    WaitOutcome::Interrupted
                } else {
                    WaitOutcome::Elapsed
                };
            }
        }
    }

    /// Abandon all in-progress waits.
    pub fn interrupt(&self) {
        let mut generation = self.state.generation.lock();
        *generation = generation.wrapping_add(1);
        self.state.wake.notify_all();
    }
}

/// Blocks until the reset window has passed, plus a margin.
#[derive(Clone)]
pub struct SleepUntilReset {
    margin: Duration,
    interrupter: Interrupter,
}

impl SleepUntilReset {
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            interrupter: Interrupter::new(),
        }
    }

    /// Handle that cuts short any wait performed by this policy.
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Total time a call waits for the given reset window.
    pub fn wait_time(&self, reset_secs: u64) -> Duration {
        Duration::from_secs(reset_secs.max(1)) + self.margin
    }
}

impl Default for SleepUntilReset {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl WaitPolicy for SleepUntilReset {
    fn perform(&self, route: &str, reset_secs: u64) {
        let wait = self.wait_time(reset_secs);
        warn!("Rate limit reached on {}, waiting {:?}", route, wait);

        // An interrupted wait proceeds with the call anyway.
        if self.interrupter.sleep(wait) == WaitOutcome::Interrupted {
            debug!("Wait on {} interrupted, proceeding", route);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_time_adds_margin() {
        let policy = SleepUntilReset::default();
        assert_eq!(policy.wait_time(2), Duration::from_secs(5));
        // A zero window still waits at least a second before the margin.
        assert_eq!(policy.wait_time(0), Duration::from_secs(4));
    }

    #[test]
    fn test_short_sleep_elapses() {
        let interrupter = Interrupter::new();
        let start = Instant::now();
        assert_eq!(interrupter.sleep(Duration::from_millis(20)), WaitOutcome::Elapsed);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_interrupt_ends_wait() {
        let policy = SleepUntilReset::new(Duration::from_secs(60));
        let interrupter = policy.interrupter();
        let start = Instant::now();

        let sleeper = thread::spawn(move || policy.perform("channel-message-send", 60));
        while !sleeper.is_finished() {
            interrupter.interrupt();
            thread::sleep(Duration::from_millis(10));
        }
        sleeper.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_closure_policy() {
        let seen = Mutex::new(Vec::new());
        let policy = |route: &str, secs: u64| seen.lock().push((route.to_string(), secs));
        policy.perform("user-who", 7);
        assert_eq!(seen.lock().as_slice(), &[("user-who".to_string(), 7)]);
    }
}
