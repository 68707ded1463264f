//! Three-state circuit breaker (Closed / Open / HalfOpen).

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use super::error::SyncError;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub half_open_max_retries: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    half_open_probes: u32,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                half_open_probes: 0,
            }),
        }
    }

    /// Admits immediately (Closed), fails fast (Open/exhausted HalfOpen), or
    /// admits a probe (HalfOpen with budget remaining), flipping Open →
    /// HalfOpen once `timeout` has elapsed.
    pub fn allow(&self) -> Result<(), SyncError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => Ok(()),
            State::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or_default();
                if elapsed >= self.config.timeout {
                    inner.state = State::HalfOpen;
                    inner.half_open_probes = 1;
                    Ok(())
                } else {
                    Err(SyncError::CircuitOpen)
                }
            }
            State::HalfOpen => {
                if inner.half_open_probes < self.config.half_open_max_retries {
                    inner.half_open_probes += 1;
                    Ok(())
                } else {
                    Err(SyncError::CircuitOpen)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_failures = 0;
            }
            State::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = State::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.half_open_probes = 0;
                }
            }
            State::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
                inner.half_open_probes = 0;
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 5,
            ..CircuitBreakerConfig::default()
        });
        for _ in 0..4 {
            cb.allow().unwrap();
            cb.record_failure();
        }
        cb.allow().unwrap();
        cb.record_failure();
        assert!(cb.allow().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_after_timeout_then_closes_on_successes() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_retries: 3,
        });
        for _ in 0..5 {
            let _ = cb.allow();
            cb.record_failure();
        }
        assert!(cb.allow().is_err());
        tokio::time::advance(Duration::from_secs(31)).await;
        cb.allow().unwrap(); // HalfOpen probe admitted
        cb.record_success();
        cb.allow().unwrap();
        cb.record_success();
        // Closed now: failures no longer trip it open after just one.
        cb.allow().unwrap();
        cb.record_failure();
        assert!(cb.allow().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 2,
            timeout: Duration::from_secs(1),
            half_open_max_retries: 3,
        });
        cb.allow().unwrap();
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(2)).await;
        cb.allow().unwrap();
        cb.record_failure();
        assert!(cb.allow().is_err());
    }

    #[test]
    fn half_open_admits_at_most_max_retries_probes() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 5,
            timeout: Duration::from_millis(0),
            half_open_max_retries: 3,
        });
        cb.allow().unwrap();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        let mut admitted = 0;
        for _ in 0..10 {
            if cb.allow().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
    }
}
