//! Run lifecycle shared by both actors: input, free-tier gate, resumable
//! state, batched pushes, and status messages.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::api::http::DEFAULT_USER_AGENT;
use crate::api::{Endpoints, Fetcher, HttpFetcher, RateLimiter, RetryPolicy};
use crate::models::{AiMlConfig, EdgarConfig, Record};
use crate::pagination::RecordStream;
use crate::scrapers::{AiMlScraper, EdgarScraper};
use crate::storage::{Dataset, KeyValueStore};

/// Result cap for non-paying platform users.
pub const FREE_TIER_LIMIT: usize = 25;
pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const STATE_KEY: &str = "STATE";
pub const INPUT_KEY: &str = "INPUT";
pub const EDGAR_USER_AGENT_ENV: &str = "EDGAR_USER_AGENT";
/// SEC rejects requests without a contact in the user agent.
pub const DEFAULT_EDGAR_USER_AGENT: &str = "data-actors/0.1 (contact@example.com)";

/// Progress persisted under [`STATE_KEY`] so a migrated run can resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunState {
    pub scraped: usize,
    pub failed: usize,
}

/// Platform flags read from the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformEnv {
    pub is_at_home: bool,
    pub is_paying: bool,
}

impl PlatformEnv {
    pub fn from_env() -> Self {
        let flag = |name: &str| std::env::var(name).map(|v| v == "1").unwrap_or(false);
        Self {
            is_at_home: flag("APIFY_IS_AT_HOME"),
            is_paying: flag("APIFY_USER_IS_PAYING"),
        }
    }

    pub fn free_tier_applies(&self) -> bool {
        self.is_at_home && !self.is_paying
    }

    pub fn effective_max_results(&self, requested: usize) -> usize {
        if self.free_tier_applies() {
            requested.min(FREE_TIER_LIMIT)
        } else {
            requested
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Items pushed over the life of the run, including resumed ones.
    pub scraped: usize,
    pub failed: usize,
    /// Items pushed by this invocation.
    pub pushed: usize,
    pub max_results: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Rejected before any network activity.
    Failed(String),
}

pub struct ActorRun {
    dataset: Arc<dyn Dataset>,
    store: Arc<dyn KeyValueStore>,
    env: PlatformEnv,
    batch_size: usize,
    status_message: String,
    status_history: Vec<String>,
}

impl ActorRun {
    pub fn new(dataset: Arc<dyn Dataset>, store: Arc<dyn KeyValueStore>, env: PlatformEnv) -> Self {
        Self {
            dataset,
            store,
            env,
            batch_size: DEFAULT_BATCH_SIZE,
            status_message: String::new(),
            status_history: Vec::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn env(&self) -> PlatformEnv {
        self.env
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Every status set during the run, oldest first.
    pub fn status_history(&self) -> &[String] {
        &self.status_history
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        info!("📣 {}", self.status_message);
        self.status_history.push(self.status_message.clone());
    }

    /// Run input stored under `INPUT`, if any.
    pub async fn load_input(&self) -> Result<Option<Value>> {
        self.store
            .get_value(INPUT_KEY)
            .await
            .context("Failed to read INPUT from key-value store")
    }

    /// Record a validation failure and end the run.
    pub fn fail(&mut self, message: &str) -> RunOutcome {
        error!("❌ Invalid input: {}", message);
        self.set_status_message(message);
        RunOutcome::Failed(message.to_string())
    }

    async fn load_state(&self) -> RunState {
        match self.store.get_value(STATE_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("⚠️ Ignoring unreadable run state: {}", e);
                RunState::default()
            }),
            Ok(None) => RunState::default(),
            Err(e) => {
                warn!("⚠️ Could not read run state: {}", e);
                RunState::default()
            }
        }
    }

    async fn save_state(&self, state: &RunState) {
        let saved = match serde_json::to_value(state) {
            Ok(value) => self.store.set_value(STATE_KEY, &value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = saved {
            warn!("⚠️ Could not persist run state: {}", e);
        }
    }

    /// Push `batch` and persist the new count. The batch is drained either way.
    async fn flush(&self, batch: &mut Vec<Record>, state: &mut RunState) -> crate::error::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let pushed = self.dataset.push_data(batch).await;
        let size = batch.len();
        batch.clear();
        pushed?;
        state.scraped += size;
        self.save_state(state).await;
        Ok(())
    }

    /// Pull records until the stream ends, `max_results` is reached, or an
    /// error surfaces. Items already pushed by an earlier attempt of the
    /// same run are skipped.
    pub async fn drive(&mut self, mut stream: RecordStream<'_>, max_results: usize) -> RunSummary {
        let mut state = self.load_state().await;
        let resumed_from = state.scraped;
        let mut skip = resumed_from;
        if resumed_from > 0 {
            info!("♻️ Resuming run: {} items already pushed", resumed_from);
        }

        let mut batch: Vec<Record> = Vec::with_capacity(self.batch_size);
        while state.scraped + batch.len() < max_results {
            let Some(item) = stream.next().await else {
                break;
            };
            match item {
                Ok(_) if skip > 0 => skip -= 1,
                Ok(record) => {
                    batch.push(record);
                    if batch.len() >= self.batch_size {
                        if let Err(e) = self.flush(&mut batch, &mut state).await {
                            state.failed += 1;
                            error!("❌ Failed to push batch: {}", e);
                            break;
                        }
                        let progress = format!("Scraped {}/{} items", state.scraped, max_results);
                        self.set_status_message(progress);
                    }
                }
                Err(e) => {
                    state.failed += 1;
                    error!("❌ Scraping error: {}", e);
                    break;
                }
            }
        }

        // Whatever was collected before a stop or an error still goes out
        if let Err(e) = self.flush(&mut batch, &mut state).await {
            state.failed += 1;
            error!("❌ Failed to push final batch: {}", e);
        }
        self.save_state(&state).await;

        let mut message = format!("Done. Scraped {} items.", state.scraped);
        if state.failed > 0 {
            message.push_str(&format!(" {} errors encountered.", state.failed));
        }
        if self.env.free_tier_applies() && state.scraped >= FREE_TIER_LIMIT {
            message.push_str(&format!(
                " Free tier limit ({}) reached. Subscribe for unlimited results.",
                FREE_TIER_LIMIT
            ));
        }
        self.set_status_message(message.clone());

        RunSummary {
            scraped: state.scraped,
            failed: state.failed,
            pushed: state.scraped - resumed_from,
            max_results,
            message,
        }
    }

    fn apply_free_tier(&mut self, requested: usize) -> usize {
        let max_results = self.env.effective_max_results(requested);
        if self.env.free_tier_applies() {
            self.set_status_message(free_tier_notice());
        }
        max_results
    }

    /// The connect status carries the free-tier notice so it stays visible.
    fn set_connecting(&mut self, target: &str) {
        let mut message = format!("Connecting to {}...", target);
        if self.env.free_tier_applies() {
            message.push(' ');
            message.push_str(&free_tier_notice());
        }
        self.set_status_message(message);
    }
}

fn free_tier_notice() -> String {
    format!(
        "Free tier: limited to {} results. Subscribe to the actor for unlimited results.",
        FREE_TIER_LIMIT
    )
}

/// AI/ML actor against the production APIs.
pub async fn run_aiml(run: &mut ActorRun, input: &Value, endpoints: Endpoints) -> Result<RunOutcome> {
    let config = match AiMlConfig::from_input(input) {
        Ok(config) => config,
        Err(e) => return Ok(run.fail(&e.to_string())),
    };
    let fetcher = HttpFetcher::new(
        DEFAULT_USER_AGENT,
        Arc::new(RateLimiter::default()),
        RetryPolicy::default(),
    )?;
    Ok(run_aiml_with(run, config, endpoints, Arc::new(fetcher)).await)
}

pub async fn run_aiml_with(
    run: &mut ActorRun,
    config: AiMlConfig,
    endpoints: Endpoints,
    fetcher: Arc<dyn Fetcher>,
) -> RunOutcome {
    let max_results = run.apply_free_tier(config.max_results);
    let config = config.with_max_results(max_results);
    info!(
        "🚀 Starting AI/ML scraper | mode={} | max_results={}",
        config.mode.as_str(),
        max_results
    );
    run.set_connecting("data sources");

    let scraper = AiMlScraper::new(fetcher, endpoints, config);
    RunOutcome::Completed(run.drive(scraper.scrape(), max_results).await)
}

/// User agent for SEC requests: input, then `EDGAR_USER_AGENT`, then default.
pub fn edgar_user_agent(config: &EdgarConfig) -> String {
    config
        .user_agent
        .clone()
        .or_else(|| {
            std::env::var(EDGAR_USER_AGENT_ENV)
                .ok()
                .filter(|ua| !ua.trim().is_empty())
        })
        .unwrap_or_else(|| DEFAULT_EDGAR_USER_AGENT.to_string())
}

/// EDGAR actor against the production APIs.
pub async fn run_edgar(run: &mut ActorRun, input: &Value, endpoints: Endpoints) -> Result<RunOutcome> {
    let config = match EdgarConfig::from_input(input) {
        Ok(config) => config,
        Err(e) => return Ok(run.fail(&e.to_string())),
    };
    let policy = RetryPolicy {
        max_retries: config.max_retries,
        timeout: config.timeout,
        ..RetryPolicy::default()
    };
    let limiter = Arc::new(RateLimiter::new(config.request_interval));
    let fetcher = HttpFetcher::new(&edgar_user_agent(&config), limiter, policy)?;
    Ok(run_edgar_with(run, config, endpoints, Arc::new(fetcher)).await)
}

pub async fn run_edgar_with(
    run: &mut ActorRun,
    config: EdgarConfig,
    endpoints: Endpoints,
    fetcher: Arc<dyn Fetcher>,
) -> RunOutcome {
    let max_results = run.apply_free_tier(config.max_results);
    let config = config.with_max_results(max_results);
    info!(
        "🚀 Starting EDGAR scraper | mode={} | max_results={}",
        config.mode.as_str(),
        max_results
    );
    run.set_connecting("SEC EDGAR");

    let scraper = EdgarScraper::new(fetcher, endpoints, config);
    RunOutcome::Completed(run.drive(scraper.scrape(), max_results).await)
}
