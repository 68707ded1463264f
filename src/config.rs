//! Top-level configuration: one `Default` impl per subsystem, overridable
//! by environment variables at process start.

use std::time::Duration;

use crate::scheduler::SchedulerConfig;
use crate::sync::{CircuitBreakerConfig, HttpClientBuilderConfig, HttpClientConfig, RateLimiterConfig, RetryConfig};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub sync: HttpClientBuilderConfig,
    pub scheduler: SchedulerConfig,
    pub stale_after: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            sync: HttpClientBuilderConfig {
                http: HttpClientConfig::default(),
                limiter: RateLimiterConfig::default(),
                breaker: CircuitBreakerConfig::default(),
                retry: RetryConfig::default(),
            },
            scheduler: SchedulerConfig {
                history_capacity: env_or("SCHEDULER_HISTORY_CAPACITY", 1000),
            },
            stale_after: Duration::from_secs(env_or("STUDENT_STALE_AFTER_SECS", 7 * 24 * 3600)),
        }
    }
}

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
