use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::xml::{self, XmlElement};

pub mod endpoints;
pub mod http;

pub use endpoints::Endpoints;
pub use http::{classify_status, HttpFetcher, StatusClass};

/// Spacing for the public HuggingFace and arXiv APIs.
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// Enforces a minimum interval between outbound requests.
///
/// The check-and-set of the last call instant happens under one lock, and
/// callers sleep the remaining delta while holding it, so instances shared
/// through an `Arc` serialize correctly.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until it is safe to make another request.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let remaining = self.interval - elapsed;
                debug!("Rate limiter: waiting {:.2}s", remaining.as_secs_f64());
                tokio::time::sleep(remaining).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_INTERVAL)
    }
}

/// Retry knobs for transient failures (429, 5xx, timeouts, transport errors).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    /// Upper bound of the uniform random delay added to each backoff.
    pub jitter: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(3),
            backoff_factor: 2.0,
            jitter: Duration::ZERO,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`:
    /// `base_delay * backoff_factor^attempt`, plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let backoff = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let mut delay = Duration::from_secs_f64(backoff.clamp(0.0, 3600.0));
        if !self.jitter.is_zero() {
            let extra = rand::thread_rng().gen_range(0.0..=self.jitter.as_secs_f64());
            delay += Duration::from_secs_f64(extra);
        }
        delay
    }
}

/// One outbound API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Full URL including the query string, for logs.
    pub fn display_url(&self) -> String {
        match url::Url::parse_with_params(&self.url, &self.query) {
            Ok(url) => url.to_string(),
            Err(_) => self.url.clone(),
        }
    }
}

/// Performs one logical request (including any retries) and returns the
/// response body, or `None` when nothing usable came back. Implementations
/// never surface errors: callers treat `None` as an empty page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, request: &ApiRequest) -> Option<String>;
}

/// Fetch and parse a JSON body.
pub async fn fetch_json(fetcher: &dyn Fetcher, request: &ApiRequest) -> Option<Value> {
    let body = fetcher.fetch_text(request).await?;
    match serde_json::from_str(&body) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("JSON parse error on {}: {}", request.display_url(), e);
            None
        }
    }
}

/// Fetch and parse an XML body.
pub async fn fetch_xml(fetcher: &dyn Fetcher, request: &ApiRequest) -> Option<XmlElement> {
    let body = fetcher.fetch_text(request).await?;
    match xml::parse(&body) {
        Ok(root) => Some(root),
        Err(e) => {
            error!("XML parse error on {}: {}", request.display_url(), e);
            None
        }
    }
}
