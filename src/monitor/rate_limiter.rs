use std::time::{Duration, Instant};

/// Rate limiter for writes to the monthly log
///
/// The sensor is sampled far more often than readings need to be kept, so
/// only one write attempt is allowed per log interval. The window restarts
/// on every attempt, whether or not the write itself succeeded; a failing
/// disk therefore costs one attempt per interval instead of one per sample.
#[derive(Debug)]
pub struct LogRateLimiter {
    /// Minimum spacing between write attempts
    interval: Duration,
    /// When the last write was attempted
    last_attempt: Option<Instant>,
}

impl LogRateLimiter {
    /// Create a new rate limiter allowing one write per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    /// Check if a write may be attempted at `now`
    ///
    /// The first write is always allowed.
    pub fn can_write_at(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Record that a write was attempted at `now`
    pub fn record_attempt_at(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}
