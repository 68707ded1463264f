//! Token-bucket rate limiter with adaptive slowdown on 429s.
//!
//! State lives behind a single mutex; critical sections are short token
//! arithmetic and never held across the sleep in [`RateLimiter::allow`].

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use super::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub refill_rate_per_second: f64,
    pub burst_size: f64,
    pub min_interval: Duration,
    pub wait_timeout: Duration,
    pub default_retry_after: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            refill_rate_per_second: 2.0,
            burst_size: 5.0,
            min_interval: Duration::from_millis(200),
            wait_timeout: Duration::from_secs(30),
            default_retry_after: Duration::from_secs(60),
        }
    }
}

struct State {
    tokens: f64,
    last_refill: Instant,
    last_request: Option<Instant>,
    consecutive_waits: u32,
    blocked_until: Option<Instant>,
}

pub struct RateLimiter {
    config: Mutex<RateLimiterConfig>,
    state: Mutex<State>,
}

/// Outcome of a single non-blocking acquire attempt.
enum Attempt {
    Acquired,
    Wait(Duration),
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(State {
                tokens: config.burst_size,
                last_refill: now,
                last_request: None,
                consecutive_waits: 0,
                blocked_until: None,
            }),
            config: Mutex::new(config),
        }
    }

    fn refill(state: &mut State, rate: f64, burst: f64, now: Instant) {
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * rate).min(burst);
        state.last_refill = now;
    }

    fn try_acquire(&self, now: Instant) -> Attempt {
        let config = *self.config.lock().unwrap();
        let mut state = self.state.lock().unwrap();

        if let Some(blocked_until) = state.blocked_until {
            if now < blocked_until {
                return Attempt::Wait(blocked_until - now);
            }
            state.blocked_until = None;
        }

        Self::refill(&mut state, config.refill_rate_per_second, config.burst_size, now);

        if let Some(last) = state.last_request {
            let since = now.duration_since(last);
            if since < config.min_interval {
                return Attempt::Wait(config.min_interval - since);
            }
        }

        if state.tokens < 1.0 {
            let base = (1.0 - state.tokens) / config.refill_rate_per_second;
            let factor = 2f64.powi(state.consecutive_waits.min(5) as i32);
            state.consecutive_waits += 1;
            return Attempt::Wait(Duration::from_secs_f64(base * factor));
        }

        state.tokens -= 1.0;
        state.last_request = Some(now);
        state.consecutive_waits = 0;
        Attempt::Acquired
    }

    /// Retries [`Self::try_acquire`] until it succeeds or `wait_timeout` is
    /// exceeded. Sleeps honor cancellation via `tokio::select!` against the
    /// caller's future, so no lock is ever held across a sleep.
    pub async fn allow(&self) -> SyncResult<()> {
        let wait_timeout = self.config.lock().unwrap().wait_timeout;
        let deadline = Instant::now() + wait_timeout;
        loop {
            let now = Instant::now();
            match self.try_acquire(now) {
                Attempt::Acquired => return Ok(()),
                Attempt::Wait(wait) => {
                    if now + wait > deadline {
                        return Err(SyncError::RateLimitExceeded(wait));
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Called on an observed HTTP 429: drains tokens, halves refill rate
    /// (never restored automatically), starts the backoff escalation, and
    /// blocks further acquires until `retry_after` elapses (or
    /// `default_retry_after` if the upstream didn't send one).
    pub fn record_rate_limit_hit(&self, retry_after: Option<Duration>) {
        let mut config = self.config.lock().unwrap();
        config.refill_rate_per_second *= 0.8;
        let wait = retry_after.unwrap_or(config.default_retry_after);
        let mut state = self.state.lock().unwrap();
        state.tokens = 0.0;
        state.last_request = Some(Instant::now());
        state.consecutive_waits += 1;
        state.blocked_until = Some(Instant::now() + wait);
    }
}
