//! The upstream sync client: rate limiter, circuit breaker, retry
//! policy, HTTP client core and DTO mapper.

pub mod circuit_breaker;
pub mod client;
pub mod dto;
pub mod error;
pub mod mapper;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use client::{Auth, BearerToken, HttpClient, HttpClientBuilderConfig, HttpClientConfig, TokenRefresher};
pub use error::{SyncError, SyncResult};
pub use mapper::{map_student, map_sync_delta, map_task_completion, flatten_bootcamp_tree, FlattenedCompletion, MappingError};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::RetryConfig;
