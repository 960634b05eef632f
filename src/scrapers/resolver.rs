//! Turning a CIK, ticker, or free-text name into one SEC registrant.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::api::{fetch_json, ApiRequest, Fetcher};
use crate::error::{Result, ScraperError};
use crate::format::{parse_display_name, scalar_text};
use crate::models::input::{normalize_symbol, pad_cik};
use crate::models::EdgarConfig;

#[derive(Debug, Deserialize)]
struct RawTickerEntry {
    cik_str: Value,
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerEntry {
    pub cik: String,
    pub ticker: String,
    pub title: String,
}

/// The SEC ticker table, `{"0": {"cik_str": 320193, "ticker": "AAPL",
/// "title": "Apple Inc."}, ...}`, kept in the order SEC serves it.
#[derive(Debug, Default)]
pub struct TickerTable {
    entries: Vec<TickerEntry>,
    by_ticker: HashMap<String, usize>,
    by_cik: HashMap<String, Vec<String>>,
}

impl TickerTable {
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        // Keys are row numbers; sort numerically so "10" follows "9".
        let mut rows: Vec<(&String, &Value)> = object.iter().collect();
        rows.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));

        let entries: Vec<TickerEntry> = rows
            .into_iter()
            .filter_map(|(_, row)| serde_json::from_value::<RawTickerEntry>(row.clone()).ok())
            .filter_map(|raw| {
                Some(TickerEntry {
                    cik: pad_cik(&scalar_text(&raw.cik_str))?,
                    ticker: normalize_symbol(&raw.ticker)?,
                    title: raw.title.trim().to_string(),
                })
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<TickerEntry>) -> Self {
        let mut by_ticker = HashMap::new();
        let mut by_cik: HashMap<String, Vec<String>> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            by_ticker.entry(entry.ticker.clone()).or_insert(index);
            let tickers = by_cik.entry(entry.cik.clone()).or_default();
            if !tickers.contains(&entry.ticker) {
                tickers.push(entry.ticker.clone());
            }
        }
        Self {
            entries,
            by_ticker,
            by_cik,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TickerEntry] {
        &self.entries
    }

    /// Exact, case-insensitive ticker lookup.
    pub fn by_ticker(&self, ticker: &str) -> Option<&TickerEntry> {
        let key = normalize_symbol(ticker)?;
        self.by_ticker.get(&key).map(|&index| &self.entries[index])
    }

    /// First entry whose title contains `needle`, ignoring case.
    pub fn find_by_name(&self, needle: &str) -> Option<&TickerEntry> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.title.to_lowercase().contains(&needle))
    }

    /// Every ticker listed under `cik`, in table order.
    pub fn tickers_for_cik(&self, cik: &str) -> Vec<String> {
        self.by_cik.get(cik).cloned().unwrap_or_default()
    }
}

/// Ticker table fetched at most once per run, and only on first use.
pub struct TickerCache {
    fetcher: Arc<dyn Fetcher>,
    url: String,
    table: OnceCell<TickerTable>,
}

impl TickerCache {
    pub fn new(fetcher: Arc<dyn Fetcher>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
            table: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.table.initialized()
    }

    /// A failed download leaves an empty table; it is not retried.
    pub async fn table(&self) -> &TickerTable {
        self.table
            .get_or_init(|| async {
                let request = ApiRequest::get(&self.url);
                match fetch_json(self.fetcher.as_ref(), &request).await {
                    Some(value) => {
                        let table = TickerTable::from_json(&value);
                        info!("📇 Loaded {} SEC tickers", table.len());
                        table
                    }
                    None => {
                        warn!("⚠️ Could not load SEC ticker table, continuing without it");
                        TickerTable::default()
                    }
                }
            })
            .await
    }
}

/// Which fallback produced the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    ExplicitCik,
    Ticker,
    QueryAsTicker,
    NameMatch,
    FullTextSearch,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::ExplicitCik => "explicit_cik",
            ResolutionStrategy::Ticker => "ticker",
            ResolutionStrategy::QueryAsTicker => "query_as_ticker",
            ResolutionStrategy::NameMatch => "name_match",
            ResolutionStrategy::FullTextSearch => "full_text_search",
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Always 10 digits.
    pub cik: String,
    /// Unknown for an explicit CIK.
    pub name: Option<String>,
    pub tickers: Vec<String>,
    pub strategy: ResolutionStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityQuery {
    pub cik: Option<String>,
    pub ticker: Option<String>,
    pub query: Option<String>,
}

impl From<&EdgarConfig> for EntityQuery {
    fn from(config: &EdgarConfig) -> Self {
        Self {
            cik: config.cik.clone(),
            ticker: config.ticker.clone(),
            query: config.query.clone(),
        }
    }
}

pub struct EntityResolver {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<TickerCache>,
    search_url: String,
}

impl EntityResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<TickerCache>, search_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            cache,
            search_url: search_url.into(),
        }
    }

    /// Walk the fallback chain; the first strategy that hits wins.
    pub async fn resolve(&self, query: &EntityQuery) -> Result<ResolvedEntity> {
        if let Some(cik) = query.cik.as_deref().and_then(pad_cik) {
            debug!("Using explicit CIK {}", cik);
            return Ok(ResolvedEntity {
                cik,
                name: None,
                tickers: Vec::new(),
                strategy: ResolutionStrategy::ExplicitCik,
            });
        }

        let ticker = query.ticker.as_deref().and_then(normalize_symbol);
        let text = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        if ticker.is_some() || text.is_some() {
            let table = self.cache.table().await;
            let from_table = |entry: &TickerEntry, strategy| ResolvedEntity {
                cik: entry.cik.clone(),
                name: Some(entry.title.clone()),
                tickers: table.tickers_for_cik(&entry.cik),
                strategy,
            };

            if let Some(entry) = ticker.as_deref().and_then(|t| table.by_ticker(t)) {
                return Ok(from_table(entry, ResolutionStrategy::Ticker));
            }
            if let Some(text) = text {
                if let Some(entry) = table.by_ticker(text) {
                    return Ok(from_table(entry, ResolutionStrategy::QueryAsTicker));
                }
                if let Some(entry) = table.find_by_name(text) {
                    return Ok(from_table(entry, ResolutionStrategy::NameMatch));
                }
                if let Some(entity) = self.full_text_lookup(text).await {
                    return Ok(entity);
                }
            }
        }

        Err(ScraperError::EntityNotFound {
            cik: query.cik.clone(),
            ticker: query.ticker.clone(),
            query: query.query.clone(),
        })
    }

    async fn full_text_lookup(&self, text: &str) -> Option<ResolvedEntity> {
        let q = if text.contains(char::is_whitespace) {
            format!("\"{}\"", text)
        } else {
            text.to_string()
        };
        let request = ApiRequest::get(&self.search_url)
            .query("q", q)
            .query("from", 0)
            .query("size", 1);
        let body = fetch_json(self.fetcher.as_ref(), &request).await?;

        let total = body["hits"]["total"]["value"].as_u64().unwrap_or(0);
        if total == 0 {
            debug!("Full-text search found nothing for '{}'", text);
            return None;
        }
        let source = &body["hits"]["hits"][0]["_source"];
        let cik = pad_cik(&scalar_text(&source["ciks"][0]))?;
        let (name, tickers) = parse_display_name(source["display_names"][0].as_str().unwrap_or(""));

        Some(ResolvedEntity {
            cik,
            name: Some(name).filter(|n| !n.is_empty()),
            tickers,
            strategy: ResolutionStrategy::FullTextSearch,
        })
    }
}
