//! FILENAME: core/engine/src/backoff.rs
//! PURPOSE: Adaptive polling policy and the cancellable timer that applies it.
//! CONTEXT: Consumers discover new rows only by polling a pipe. `PollTimer` sleeps
//! an increasing interval while the pipe stays empty, resets as soon as rows
//! arrive, and reports a stall when nothing has arrived for too long.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

/// Backoff settings. Intervals are in milliseconds so the struct reads naturally from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_interval_ms: u64,
    pub multiplier: u32,
    pub max_interval_ms: u64,
    /// Longest time without progress before the wait is declared stalled.
    pub stall_threshold_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            initial_interval_ms: 10,
            multiplier: 2,
            max_interval_ms: 1_000,
            stall_threshold_ms: 10 * 60 * 1_000,
        }
    }
}

impl BackoffPolicy {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.initial_interval_ms))
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    /// The interval that follows `current`, capped at the ceiling.
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.multiplier.max(1))
            .min(self.max_interval())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimerError {
    #[error("No progress for {idle:?} (stall threshold {threshold:?})")]
    Stalled { idle: Duration, threshold: Duration },

    #[error("Wait cancelled")]
    Cancelled,
}

/// Shared flag used to cancel a `PollTimer` from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        CancelHandle::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

pub struct PollTimer {
    policy: BackoffPolicy,
    clock: Arc<dyn Clock>,
    current: Duration,
    last_progress: Instant,
    cancel: CancelHandle,
}

impl PollTimer {
    pub fn new(policy: BackoffPolicy, clock: Arc<dyn Clock>) -> Self {
        let current = policy.initial_interval();
        let last_progress = clock.now();
        PollTimer {
            policy,
            clock,
            current,
            last_progress,
            cancel: CancelHandle::new(),
        }
    }

    /// Uses a handle created by the caller, so a wait can be cancelled before
    /// the timer exists.
    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels the next (or current) `idle` call.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Interval the next `idle` call will sleep.
    pub fn current_interval(&self) -> Duration {
        self.current
    }

    /// Time since the last call to `progress` (or construction).
    pub fn idle_for(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_progress)
    }

    /// Called when the poll found nothing: checks the stall threshold, sleeps the
    /// current interval and grows it for next time.
    pub fn idle(&mut self) -> Result<(), TimerError> {
        if self.cancel.is_cancelled() {
            return Err(TimerError::Cancelled);
        }

        let idle = self.idle_for();
        let threshold = self.policy.stall_threshold();
        if idle > threshold {
            return Err(TimerError::Stalled { idle, threshold });
        }

        self.clock.sleep(self.current);
        self.current = self.policy.next_interval(self.current);

        if self.cancel.is_cancelled() {
            return Err(TimerError::Cancelled);
        }
        Ok(())
    }

    /// Called when the poll found work: resets the interval and the stall clock.
    pub fn progress(&mut self) {
        self.current = self.policy.initial_interval();
        self.last_progress = self.clock.now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_interval_doubles_up_to_ceiling() {
        let clock = Arc::new(ManualClock::new());
        let mut timer = PollTimer::new(BackoffPolicy::default(), clock.clone());

        let mut seen = Vec::new();
        for _ in 0..9 {
            seen.push(timer.current_interval().as_millis() as u64);
            timer.idle().unwrap();
        }
        assert_eq!(seen, vec![10, 20, 40, 80, 160, 320, 640, 1000, 1000]);
        assert_eq!(clock.elapsed(), Duration::from_millis(10 + 20 + 40 + 80 + 160 + 320 + 640 + 1000 + 1000));
    }

    #[test]
    fn test_progress_resets_interval() {
        let clock = Arc::new(ManualClock::new());
        let mut timer = PollTimer::new(BackoffPolicy::default(), clock);
        timer.idle().unwrap();
        timer.idle().unwrap();
        assert_eq!(timer.current_interval(), Duration::from_millis(40));

        timer.progress();
        assert_eq!(timer.current_interval(), Duration::from_millis(10));
        assert_eq!(timer.idle_for(), Duration::ZERO);
    }

    #[test]
    fn test_stall_reported_after_threshold() {
        let clock = Arc::new(ManualClock::new());
        let policy = BackoffPolicy {
            stall_threshold_ms: 50,
            ..BackoffPolicy::default()
        };
        let mut timer = PollTimer::new(policy, clock);

        let err = loop {
            if let Err(e) = timer.idle() {
                break e;
            }
        };
        match err {
            TimerError::Stalled { idle, threshold } => {
                assert!(idle > threshold);
                assert_eq!(threshold, Duration::from_millis(50));
            }
            other => panic!("expected stall, got {:?}", other),
        }
    }

    #[test]
    fn test_cancel_stops_waiting() {
        let clock = Arc::new(ManualClock::new());
        let mut timer = PollTimer::new(BackoffPolicy::default(), clock);
        let handle = timer.cancel_handle();
        handle.cancel();
        assert_eq!(timer.idle(), Err(TimerError::Cancelled));
    }

    #[test]
    fn test_policy_reads_partial_json() {
        let policy: BackoffPolicy = serde_json::from_str(r#"{"stall_threshold_ms": 250}"#).unwrap();
        assert_eq!(policy.stall_threshold(), Duration::from_millis(250));
        assert_eq!(policy.initial_interval(), Duration::from_millis(10));
    }
}
