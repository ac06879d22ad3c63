//! # Exponential Backoff
//!
//! Provides an exponential backoff policy for retrying the apply step.
//!
//! Each wait is the previous one multiplied by a fixed factor, capped at a
//! maximum. The policy also carries the retry budget: once `max_retries`
//! waits have been handed out, `next_backoff` returns `None`.
//!
//! ## Usage
//!
//! ```rust
//! use sealed_secret_reconciler::reconciler::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(3), Duration::from_secs(30), 2.0)
//!     .with_max_retries(3);
//! assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(3)));
//! assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(6)));
//! assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(12)));
//! assert_eq!(backoff.next_backoff(), None);
//! ```

use std::time::Duration;

/// Exponential backoff calculator
///
/// Generates non-decreasing wait durations bounded by `max_interval`.
/// Retries are unlimited until `with_max_retries` is applied.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// First wait handed out (for reset)
    initial_interval: Duration,
    /// Wait handed out by the next call
    current_interval: Duration,
    /// Upper bound on any single wait
    max_interval: Duration,
    /// Growth factor between consecutive waits
    multiplier: f64,
    /// Number of waits allowed before giving up
    max_retries: Option<u32>,
    /// Waits handed out so far
    retries: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff
    ///
    /// A multiplier below 1.0 is treated as 1.0 so waits never shrink.
    #[must_use]
    pub fn new(initial_interval: Duration, max_interval: Duration, multiplier: f64) -> Self {
        let initial_interval = initial_interval.min(max_interval);
        Self {
            initial_interval,
            current_interval: initial_interval,
            max_interval,
            multiplier: multiplier.max(1.0),
            max_retries: None,
            retries: 0,
        }
    }

    /// Limit how many waits are handed out
    ///
    /// Zero disables retrying entirely: the operation runs exactly once.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Get the next wait and advance the sequence
    ///
    /// Returns `None` once the retry budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.max_retries.is_some_and(|max| self.retries >= max) {
            return None;
        }
        self.retries += 1;

        let result = self.current_interval;
        self.current_interval = self
            .current_interval
            .mul_f64(self.multiplier)
            .min(self.max_interval);

        Some(result)
    }

    /// Waits handed out since creation or the last reset
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
        self.retries = 0;
    }
}
