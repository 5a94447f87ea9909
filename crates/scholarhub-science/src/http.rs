use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, ScienceError};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// HTTP client enforcing a minimum interval between requests to one service.
///
/// Transport errors and 5xx responses are retried with exponential backoff,
/// 429 responses wait for `Retry-After`. Once `max_retries` is spent the
/// last error is returned to the caller.
pub struct RateLimitedClient {
    client: reqwest::Client,
    service: String,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
    backoff_base: Duration,
}

impl RateLimitedClient {
    pub fn new(
        service: impl Into<String>,
        min_interval: Duration,
        max_retries: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            service: service.into(),
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Overrides the first backoff step; later steps double it.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// GET returning the body, or `None` on 404.
    pub async fn get_optional(&self, url: &str, headers: HeaderMap) -> Result<Option<String>> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            let resp = self.client.get(url).headers(headers.clone()).send().await;
            match resp {
                Ok(r) if r.status() == StatusCode::NOT_FOUND => return Ok(None),
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    if attempt >= self.max_retries {
                        return Err(ScienceError::RateLimit(self.service.clone(), wait));
                    }
                    warn!(service = %self.service, wait, "rate limited, backing off");
                    sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                Ok(r) if r.status().is_server_error() && attempt < self.max_retries => {
                    debug!(service = %self.service, status = %r.status(), attempt, "server error, retrying");
                    sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    let snippet: String = body.chars().take(200).collect();
                    return Err(ScienceError::ApiError(
                        self.service.clone(),
                        format!("HTTP {status}: {snippet}"),
                    ));
                }
                Ok(r) => return r.text().await.map(Some).map_err(ScienceError::Http),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::Http(e));
                    }
                    debug!(service = %self.service, error = %e, attempt, "transport error, retrying");
                    sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// GET parsed as JSON, or `None` on 404.
    pub async fn get_json_optional(&self, url: &str, headers: HeaderMap) -> Result<Option<Value>> {
        match self.get_optional(url, headers).await? {
            Some(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|e| ScienceError::Parse(format!("{}: {e}", self.service))),
            None => Ok(None),
        }
    }

    /// GET parsed as JSON where a 404 is itself an error.
    pub async fn get_json(&self, url: &str, headers: HeaderMap) -> Result<Value> {
        self.get_json_optional(url, headers)
            .await?
            .ok_or_else(|| ScienceError::NotFound(url.to_string()))
    }
}

/// `User-Agent` sent to every source; carries the polite-pool contact when known.
pub(crate) fn user_agent(contact_email: Option<&str>) -> String {
    let version = env!("CARGO_PKG_VERSION");
    match contact_email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => format!("scholarhub/{version} (mailto:{email})"),
        None => format!("scholarhub/{version}"),
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(base_url)
        .map_err(|e| ScienceError::Parse(format!("invalid URL {base_url}: {e}")))
}

/// Appends path segments to `base`, splitting each on `/` so DOIs keep their slash.
pub(crate) fn build_url(base: &str, segments: &[&str]) -> Result<reqwest::Url> {
    let mut url = parse_base_url(base)?;
    {
        let mut segs = url
            .path_segments_mut()
            .map_err(|_| ScienceError::Parse(format!("URL cannot be a base: {base}")))?;
        segs.pop_if_empty();
        for segment in segments {
            segs.extend(segment.split('/'));
        }
    }
    Ok(url)
}
