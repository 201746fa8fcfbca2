//! Reconnect backoff policy

use std::time::Duration;

/// Escalating delay table with an attempt cap
///
/// Attempt `n` (1-based) waits `delays[n - 1]`; attempts past the end of the
/// table reuse the last entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
    max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            delays: [1, 2, 3, 5, 8].map(Duration::from_secs).to_vec(),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy; an empty table falls back to the default delays
    pub fn new(delays: Vec<Duration>, max_attempts: u32) -> Self {
        if delays.is_empty() {
            return Self {
                max_attempts,
                ..Self::default()
            };
        }
        Self {
            delays,
            max_attempts,
        }
    }

    pub fn from_millis(delays_ms: &[u64], max_attempts: u32) -> Self {
        Self::new(
            delays_ms.iter().copied().map(Duration::from_millis).collect(),
            max_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) as usize - 1).min(self.delays.len() - 1);
        self.delays[index]
    }

    /// Check if another attempt is allowed after `attempts` already made
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
