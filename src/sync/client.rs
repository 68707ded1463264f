//! HTTP client core — composes the rate limiter, circuit breaker and
//! retry policy around the upstream student-platform API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::dto::{ApiResponse, LeaderboardEntryDto, StudentDto, SyncDeltaDto, TaskCompletionDto};
use super::error::{SyncError, SyncResult};
use super::rate_limiter::{RateLimiter, RateLimiterConfig};
use super::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| "https://api.platform.example/v1".to_string()),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BearerToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - chrono::Duration::seconds(60)
    }
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> SyncResult<BearerToken>;
}

pub enum Auth {
    ApiKey(String),
    Refreshable {
        refresher: Arc<dyn TokenRefresher>,
        cached: AsyncMutex<Option<BearerToken>>,
    },
}

impl Auth {
    pub fn api_key(key: impl Into<String>) -> Self {
        Auth::ApiKey(key.into())
    }

    pub fn refreshable(refresher: Arc<dyn TokenRefresher>) -> Self {
        Auth::Refreshable {
            refresher,
            cached: AsyncMutex::new(None),
        }
    }

    async fn header_value(&self) -> SyncResult<String> {
        match self {
            Auth::ApiKey(key) => Ok(format!("Bearer {key}")),
            Auth::Refreshable { refresher, cached } => {
                let mut guard = cached.lock().await;
                let now = Utc::now();
                let needs_refresh = match guard.as_ref() {
                    Some(token) => token.is_expired(now),
                    None => true,
                };
                if needs_refresh {
                    *guard = Some(refresher.refresh().await?);
                }
                let token = guard.as_ref().expect("just populated");
                Ok(format!("{} {}", token.token_type, token.access_token))
            }
        }
    }
}

pub struct HttpClient {
    config: HttpClientConfig,
    http: reqwest::Client,
    auth: Option<Auth>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryConfig,
}

#[derive(Debug, Default, Clone)]
pub struct HttpClientBuilderConfig {
    pub http: HttpClientConfig,
    pub limiter: RateLimiterConfig,
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
}

impl HttpClient {
    pub fn new(cfg: HttpClientBuilderConfig, auth: Option<Auth>) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http.request_timeout)
            .build()?;
        Ok(Self {
            config: cfg.http,
            http,
            auth,
            limiter: RateLimiter::new(cfg.limiter),
            breaker: CircuitBreaker::new(cfg.breaker),
            retry: cfg.retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn auth_header(&self) -> SyncResult<Option<String>> {
        match &self.auth {
            Some(auth) => Ok(Some(auth.header_value().await?)),
            None => Ok(None),
        }
    }

    /// Runs the rate-limiter/breaker/retry dance around a single typed GET.
    async fn execute<T: DeserializeOwned>(&self, method: Method, path: &str, query: &[(&str, String)]) -> SyncResult<T> {
        self.breaker.allow()?;

        let mut last_err = None;
        for attempt in 0..=self.retry.max_retries {
            let backoff = self.retry.backoff(attempt);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            self.limiter.allow().await?;

            match self.send_once::<T>(method.clone(), path, query).await {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(e) => {
                    if let SyncError::RequestFailed { status, retry_after, .. } = &e {
                        if *status == 429 {
                            self.limiter.record_rate_limit_hit(*retry_after);
                        }
                    }
                    let retryable = e.is_retryable();
                    last_err = Some(e);
                    if !retryable {
                        break;
                    }
                    debug!(attempt, "retrying upstream request");
                }
            }
        }

        self.breaker.record_failure();
        Err(last_err.unwrap_or(SyncError::Decode("no attempts made".into())))
    }

    async fn send_once<T: DeserializeOwned>(&self, method: Method, path: &str, query: &[(&str, String)]) -> SyncResult<T> {
        let mut request = self.http.request(method, self.url(path)).query(query);
        request = request
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");
        if let Some(header) = self.auth_header().await? {
            request = request.header("Authorization", header);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(60));
            let body = response.text().await.unwrap_or_default();
            warn!(?retry_after, "upstream rate-limited us");
            return Err(SyncError::RequestFailed {
                status: status.as_u16(),
                body,
                retry_after: Some(retry_after),
            });
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::RequestFailed {
                status: status.as_u16(),
                body,
                retry_after: None,
            });
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))?;

        if !envelope.success {
            let message = envelope
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "upstream reported failure without detail".to_string());
            return Err(SyncError::Decode(message));
        }

        envelope
            .data
            .ok_or_else(|| SyncError::Decode("response marked success but carried no data".into()))
    }

    pub async fn get_student(&self, id: &str) -> SyncResult<StudentDto> {
        self.execute(Method::GET, &format!("/students/{id}"), &[]).await
    }

    pub async fn get_student_by_login(&self, login: &str) -> SyncResult<StudentDto> {
        self.execute(Method::GET, &format!("/students/by-login/{login}"), &[])
            .await
    }

    pub async fn list_students(&self, page: u32, per_page: u32) -> SyncResult<Vec<StudentDto>> {
        self.execute(
            Method::GET,
            "/students",
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )
        .await
    }

    pub async fn get_online_students(&self) -> SyncResult<Vec<StudentDto>> {
        self.execute(Method::GET, "/students/online", &[]).await
    }

    pub async fn get_leaderboard(&self, cohort: Option<&str>, limit: u32, offset: u32) -> SyncResult<Vec<LeaderboardEntryDto>> {
        let mut query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
        if let Some(cohort) = cohort {
            query.push(("cohort", cohort.to_string()));
        }
        self.execute(Method::GET, "/leaderboard", &query).await
    }

    pub async fn get_student_rank(&self, id: &str, cohort: Option<&str>) -> SyncResult<LeaderboardEntryDto> {
        let query: Vec<(&str, String)> = cohort
            .map(|c| vec![("cohort", c.to_string())])
            .unwrap_or_default();
        self.execute(Method::GET, &format!("/leaderboard/rank/{id}"), &query)
            .await
    }

    pub async fn get_task_completions(&self, student_id: Option<&str>, since: Option<DateTime<Utc>>) -> SyncResult<Vec<TaskCompletionDto>> {
        let mut query = Vec::new();
        if let Some(id) = student_id {
            query.push(("student_id", id.to_string()));
        }
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339()));
        }
        self.execute(Method::GET, "/task-completions", &query).await
    }

    pub async fn get_student_activities(&self, id: &str, since: Option<DateTime<Utc>>) -> SyncResult<serde_json::Value> {
        let query: Vec<(&str, String)> = since
            .map(|s| vec![("since", s.to_rfc3339())])
            .unwrap_or_default();
        self.execute(Method::GET, &format!("/students/{id}/activities"), &query)
            .await
    }

    pub async fn get_sync_delta(&self, sync_token: Option<&str>) -> SyncResult<SyncDeltaDto> {
        let query: Vec<(&str, String)> = sync_token
            .map(|t| vec![("sync_token", t.to_string())])
            .unwrap_or_default();
        self.execute(Method::GET, "/sync/delta", &query).await
    }

    /// A full sync is a delta request with no token — the upstream API
    /// returns everything and `full_sync_required` is ignored by the caller.
    pub async fn full_sync(&self) -> SyncResult<SyncDeltaDto> {
        self.get_sync_delta(None).await
    }

    /// Bypasses retry/breaker/limiter entirely; a liveness probe must not be
    /// gated by the very mechanisms it exists to detect trouble in.
    pub async fn is_healthy(&self) -> bool {
        self.http
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
