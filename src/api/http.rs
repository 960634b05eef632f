use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use tracing::{debug, error, warn};

use super::{ApiRequest, Fetcher, RateLimiter, RetryPolicy};
use crate::utils::truncate_chars;

/// Default user agent for the public HuggingFace and arXiv APIs.
pub const DEFAULT_USER_AGENT: &str = "data-actors/0.1 (research data collection)";

const BAD_REQUEST_BODY_CHARS: usize = 500;
const UNEXPECTED_BODY_CHARS: usize = 300;

/// How a response status is handled by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 429 and 5xx: back off and retry.
    Transient,
    Forbidden,
    NotFound,
    BadRequest,
    Unexpected,
}

pub fn classify_status(status: StatusCode) -> StatusClass {
    match status {
        s if s.is_success() => StatusClass::Success,
        StatusCode::TOO_MANY_REQUESTS => StatusClass::Transient,
        s if s.is_server_error() => StatusClass::Transient,
        StatusCode::FORBIDDEN => StatusClass::Forbidden,
        StatusCode::NOT_FOUND => StatusClass::NotFound,
        StatusCode::BAD_REQUEST => StatusClass::BadRequest,
        _ => StatusClass::Unexpected,
    }
}

/// Outcome of a single attempt.
enum Attempt {
    Done(Option<String>),
    Retry(String),
}

/// Rate-limited HTTP fetcher with exponential backoff on transient failures.
pub struct HttpFetcher {
    client: Client,
    rate_limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, rate_limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(policy.timeout)
            .redirect(redirect::Policy::limited(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            rate_limiter,
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(&self, request: &ApiRequest) -> Attempt {
        self.rate_limiter.wait().await;

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Attempt::Retry(format!("timeout: {}", e)),
            Err(e) if e.is_connect() => return Attempt::Retry(format!("connection failed: {}", e)),
            Err(e) => return Attempt::Retry(format!("request error: {}", e)),
        };

        let status = response.status();
        let url = request.display_url();
        match classify_status(status) {
            StatusClass::Success => match response.text().await {
                Ok(body) => Attempt::Done(Some(body)),
                Err(e) => Attempt::Retry(format!("failed to read body: {}", e)),
            },
            StatusClass::Transient => Attempt::Retry(format!("HTTP {}", status.as_u16())),
            StatusClass::Forbidden => {
                warn!("🚫 Access denied (403): {}", url);
                Attempt::Done(None)
            }
            StatusClass::NotFound => {
                warn!("🔍 Not found (404): {}", url);
                Attempt::Done(None)
            }
            StatusClass::BadRequest => {
                let body = response.text().await.unwrap_or_default();
                error!(
                    "❌ Bad request (400): {} body={}",
                    url,
                    truncate_chars(&body, BAD_REQUEST_BODY_CHARS)
                );
                Attempt::Done(None)
            }
            StatusClass::Unexpected => {
                let body = response.text().await.unwrap_or_default();
                error!(
                    "❌ Unexpected HTTP {}: {} body={}",
                    status.as_u16(),
                    url,
                    truncate_chars(&body, UNEXPECTED_BODY_CHARS)
                );
                Attempt::Done(None)
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, request: &ApiRequest) -> Option<String> {
        let total_attempts = self.policy.max_retries + 1;
        for attempt in 0..total_attempts {
            debug!(url = %request.display_url(), attempt = attempt + 1, "Fetching");
            match self.attempt(request).await {
                Attempt::Done(body) => return body,
                Attempt::Retry(reason) => {
                    if attempt + 1 < total_attempts {
                        let delay: Duration = self.policy.delay_for(attempt);
                        warn!(
                            "⚠️ {} on {}, retrying in {:.1}s ({}/{})",
                            reason,
                            request.display_url(),
                            delay.as_secs_f64(),
                            attempt + 1,
                            self.policy.max_retries
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        error!(
                            "❌ Giving up on {} after {} attempts: {}",
                            request.display_url(),
                            total_attempts,
                            reason
                        );
                    }
                }
            }
        }
        None
    }
}
