//! Countdown clock.
//!
//! The clock only does arithmetic. Deciding what happens at zero is the
//! state machine's job.

use std::time::Duration;

/// Span used when no explicit timeout was supplied.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Remaining time and run status of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    /// Time left on the clock
    pub remaining: Duration,
    /// Span restored on reset
    pub total_timeout: Duration,
    /// Whether ticks advance the clock
    pub running: bool,
    /// Set once `remaining` hits zero, cleared by reset
    pub expired: bool,
}

impl TimerState {
    /// Create a running clock. `None` or a zero span falls back to
    /// [`DEFAULT_TIMEOUT`].
    pub fn new(timeout: Option<Duration>) -> Self {
        let total_timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT);

        Self {
            remaining: total_timeout,
            total_timeout,
            running: true,
            expired: false,
        }
    }

    /// Advance the clock by `elapsed`, clamping at zero.
    pub fn tick(&mut self, elapsed: Duration) -> Duration {
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.remaining
    }

    /// Whether the remaining time has run out.
    pub fn timed_out(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn start(&mut self) -> bool {
        self.running = true;
        self.running
    }

    pub fn stop(&mut self) -> bool {
        self.running = false;
        self.running
    }

    pub fn toggle(&mut self) -> bool {
        self.running = !self.running;
        self.running
    }

    /// Restore the full timeout and start running again.
    pub fn reset(&mut self) {
        self.remaining = self.total_timeout;
        self.expired = false;
        self.start();
    }

    /// Fraction of the timeout already elapsed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total_timeout.is_zero() {
            return 1.0;
        }
        let elapsed = self.total_timeout.saturating_sub(self.remaining);
        (elapsed.as_secs_f64() / self.total_timeout.as_secs_f64()).clamp(0.0, 1.0)
    }
}
