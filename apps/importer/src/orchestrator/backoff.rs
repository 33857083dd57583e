use std::time::Duration;

/// Retry policy for transient provider failures on a single credential.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Total calls per credential, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(8),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (0-based): `base * multiplier^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            Duration::ZERO
        }
    }

    pub fn can_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}
