//! Retry policy — pure exponential backoff with deterministic jitter.
//!
//! Jitter is computed from `attempt`, not a PRNG, so test suites can assert
//! exact durations.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// `backoff(attempt) = min(max, initial * multiplier^attempt)` with
    /// additive jitter `±(backoff * jitter / 2)`, deterministic in `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let raw = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        let capped = raw.min(self.max_backoff.as_secs_f64());
        let jitter_fraction = ((attempt as f64 * 37.0) % 100.0) / 100.0;
        let jitter_amount = capped * self.jitter * (jitter_fraction - 0.5);
        Duration::from_secs_f64((capped + jitter_amount).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroth_attempt_has_no_backoff() {
        assert_eq!(RetryConfig::default().backoff(0), Duration::ZERO);
    }

    #[test]
    fn backoff_grows_then_caps() {
        let cfg = RetryConfig::default();
        let b1 = cfg.backoff(1).as_secs_f64();
        let b2 = cfg.backoff(2).as_secs_f64();
        assert!(b1 < b2);
        let cfg2 = RetryConfig {
            max_retries: 10,
            ..cfg
        };
        let b_big = cfg2.backoff(10).as_secs_f64();
        assert!(b_big <= cfg2.max_backoff.as_secs_f64() * 1.05);
    }

    #[test]
    fn jitter_is_deterministic_across_calls() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.backoff(2), cfg.backoff(2));
    }
}
