//! Scheduling policy: when a pending change is stable enough to execute.

use std::time::Duration;

/// Default stability window.
pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_millis(2000);

/// Default minimum delay before a re-queued entry is looked at again.
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_millis(500);

/// Default number of concurrently executing actions.
pub const DEFAULT_SLOT_BOUND: usize = 10;

/// Default number of retries after the first failed execution.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Timing and concurrency limits for the executor. Read once, never reloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// How long a path must be quiet before its change is executed.
    pub stability_window: Duration,
    /// Lower bound for re-queue delays.
    pub min_wait: Duration,
    /// Maximum number of actions in flight.
    pub slot_bound: usize,
    /// Retries allowed per dispatch.
    pub max_attempts: u32,
    /// Hold a slot until the transfer layer reports completion.
    ///
    /// When off, dispatch is fire-and-forget and only the in-flight check
    /// keeps a path from executing twice.
    pub wait_for_completion: bool,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            stability_window: DEFAULT_STABILITY_WINDOW,
            min_wait: DEFAULT_MIN_WAIT,
            slot_bound: DEFAULT_SLOT_BOUND,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_for_completion: true,
        }
    }
}

impl SchedulePolicy {
    /// Whether a change whose last event is `age` old may execute.
    pub fn is_ready(&self, age: Duration) -> bool {
        age >= self.stability_window
    }

    /// Delay before looking at a not-yet-dispatchable entry again.
    pub fn wait_for(&self, age: Duration) -> Duration {
        let remaining = self
            .stability_window
            .saturating_sub(age)
            .saturating_add(Duration::from_millis(1));
        remaining.max(self.min_wait)
    }

    /// Whether a dispatch that has run `dispatch_attempts` times may run again.
    pub fn may_retry(&self, dispatch_attempts: u32) -> bool {
        dispatch_attempts <= self.max_attempts
    }
}
