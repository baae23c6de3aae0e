use std::time::Duration;

/// How often and for how long a report job is polled.
///
/// Polling stops at whichever limit is hit first: the attempt budget or the
/// wall-clock ceiling. The delay starts at `interval` and grows by
/// `backoff_factor` after each poll, never exceeding `max_interval`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: f64,
    pub max_attempts: u32,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
            backoff_factor: 1.0,
            max_attempts: 60,
            max_wait: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    /// Delay to wait after the given (1-based) poll attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        let cap = self.max_interval.as_secs_f64();

        if secs.is_finite() && secs < cap {
            Duration::from_secs_f64(secs.max(0.0))
        } else {
            self.max_interval
        }
    }
}
