//! Blocking HTTP transport for the Limitless lifelogs API.
//!
//! `GET {base_url}/{api_version}/lifelogs` with an `X-API-Key` header. Handles
//! retries with exponential backoff (honouring `Retry-After` on 429), the
//! circuit breaker, and response parsing.

use super::circuit_breaker::CircuitBreaker;
use super::{LifelogQuery, Page, RemoteError, RemoteSource};
use crate::domain::Lifelog;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on a single computed retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// First backoff delay; doubles on each further attempt.
    pub retry_base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.limitless.ai".into(),
            api_version: "v1".into(),
            timeout_secs: 300,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: 3,
        }
    }
}

impl HttpConfig {
    /// Full lifelogs endpoint URL.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/lifelogs",
            self.base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

/// Lifelogs API response envelope.
#[derive(Debug, Deserialize)]
struct LifelogsResponse {
    data: Option<LifelogsData>,
    #[serde(default)]
    meta: Option<LifelogsMeta>,
}

#[derive(Debug, Deserialize)]
struct LifelogsData {
    lifelogs: Option<Vec<Lifelog>>,
}

#[derive(Debug, Deserialize)]
struct LifelogsMeta {
    lifelogs: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
    count: Option<usize>,
}

pub struct HttpSource {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpSource {
    pub fn new(config: &HttpConfig, api_key: impl Into<String>) -> Result<Self, RemoteError> {
        let breaker = CircuitBreaker::new(
            Duration::from_secs(config.breaker_cooldown_secs),
            config.breaker_failure_threshold,
        );
        Self::with_breaker(config, api_key, Arc::new(breaker))
    }

    /// Share one breaker across several sources.
    pub fn with_breaker(
        config: &HttpConfig,
        api_key: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, RemoteError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RemoteError::AuthenticationRequired("API key is empty".into()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("lifelog-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            endpoint: config.endpoint(),
            api_key,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    /// Parse a lifelogs response body into a page.
    fn parse_page(body: &str) -> Result<Page, RemoteError> {
        let resp: LifelogsResponse = serde_json::from_str(body)
            .map_err(|e| RemoteError::ResponseFormatChanged(format!("invalid JSON: {e}")))?;

        let records = resp
            .data
            .ok_or_else(|| RemoteError::ResponseFormatChanged("missing 'data' object".into()))?
            .lifelogs
            .unwrap_or_default();
        let meta = resp.meta.and_then(|m| m.lifelogs);

        Ok(Page {
            next_cursor: meta
                .as_ref()
                .and_then(|m| m.next_cursor.clone())
                .filter(|c| !c.is_empty()),
            count: meta.and_then(|m| m.count),
            records,
        })
    }

    fn backoff(&self, attempt: u32, last_error: Option<&RemoteError>) -> Duration {
        match last_error {
            Some(RemoteError::RateLimited { retry_after_secs }) if *retry_after_secs > 0 => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => self
                .base_delay
                .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
                .unwrap_or(MAX_BACKOFF)
                .min(MAX_BACKOFF),
        }
    }

    fn fetch_with_retry(&self, query: &LifelogQuery) -> Result<Page, RemoteError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(RemoteError::CircuitBreakerTripped);
        }

        let params = query.query_pairs();
        let mut last_error: Option<RemoteError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt, last_error.as_ref());
                if let Some(err) = &last_error {
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying lifelogs request");
                }
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(RemoteError::CircuitBreakerTripped);
            }

            debug!(url = %self.endpoint, ?params, "GET lifelogs");
            let resp = match self
                .client
                .get(&self.endpoint)
                .header("X-API-Key", &self.api_key)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&params)
                .send()
            {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(RemoteError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(RemoteError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(RemoteError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(RemoteError::AuthenticationRequired(
                    "API key rejected (HTTP 401)".into(),
                ));
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(0);
                last_error = Some(RemoteError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status.is_server_error() {
                self.circuit_breaker.record_failure();
                last_error = Some(RemoteError::Http {
                    status: status.as_u16(),
                    message: resp.text().unwrap_or_default(),
                });
                continue;
            }

            if !status.is_success() {
                return Err(RemoteError::Http {
                    status: status.as_u16(),
                    message: resp.text().unwrap_or_default(),
                });
            }

            let body = resp
                .text()
                .map_err(|e| RemoteError::ResponseFormatChanged(format!("unreadable body: {e}")))?;
            let page = Self::parse_page(&body)?;
            self.circuit_breaker.record_success();
            info!(
                records = page.records.len(),
                count = ?page.count,
                more = page.next_cursor.is_some(),
                "lifelogs page received"
            );
            return Ok(page);
        }

        Err(last_error.unwrap_or_else(|| RemoteError::NetworkUnreachable("max retries exceeded".into())))
    }
}

impl RemoteSource for HttpSource {
    fn name(&self) -> &str {
        "limitless_http"
    }

    fn fetch_page(&self, query: &LifelogQuery) -> Result<Page, RemoteError> {
        self.fetch_with_retry(query)
    }
}
