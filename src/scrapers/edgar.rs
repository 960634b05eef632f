//! SEC EDGAR modes: entity profiles, full-text filing search, a company's
//! own filings, and XBRL company facts.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, warn};

use super::resolver::{EntityQuery, EntityResolver, ResolvedEntity, TickerCache};
use crate::api::{fetch_json, ApiRequest, Endpoints, Fetcher};
use crate::error::{Result, ScraperError};
use crate::format::{
    format_entity, format_fact, format_filing_hit, format_submission_filing, minimal_entity,
    recent_filing_rows, ticker_list, FactContext,
};
use crate::models::{EdgarConfig, EdgarMode, Record};
use crate::pagination::{paginate, PageRequest, PageSource, Pager, RecordStream};

/// Full-text search page cap.
pub const EFTS_PAGE_SIZE: usize = 100;
/// Lower bound used when only `dateTo` is given; full-text search starts in 2001.
const EFTS_EARLIEST_DATE: &str = "2001-01-01";

#[derive(Clone)]
pub struct EdgarScraper {
    fetcher: Arc<dyn Fetcher>,
    endpoints: Arc<Endpoints>,
    config: Arc<EdgarConfig>,
    resolver: Arc<EntityResolver>,
}

impl EdgarScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, endpoints: Endpoints, config: EdgarConfig) -> Self {
        let cache = Arc::new(TickerCache::new(
            Arc::clone(&fetcher),
            endpoints.sec_tickers.clone(),
        ));
        let resolver = Arc::new(EntityResolver::new(
            Arc::clone(&fetcher),
            cache,
            endpoints.sec_full_text_search.clone(),
        ));
        Self {
            fetcher,
            endpoints: Arc::new(endpoints),
            config: Arc::new(config),
            resolver,
        }
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn scrape(&self) -> RecordStream<'static> {
        let scraper = self.clone();
        match self.config.mode {
            EdgarMode::SearchFilings => {
                info!(
                    "🔎 Full-text filing search: '{}'",
                    self.config.query.as_deref().unwrap_or("")
                );
                let pager = Pager::new(EFTS_PAGE_SIZE, self.config.max_results)
                    .starting_at(self.config.start);
                paginate(FilingSearch { scraper }, pager)
            }
            EdgarMode::ResolveEntity => one_shot(async move { scraper.resolve_entity().await }),
            EdgarMode::CompanyFilings => one_shot(async move { scraper.company_filings().await }),
            EdgarMode::CompanyFacts => one_shot(async move { scraper.company_facts().await }),
        }
    }

    async fn resolve(&self) -> Result<ResolvedEntity> {
        let entity = self.resolver.resolve(&EntityQuery::from(self.config.as_ref())).await?;
        info!(
            "🏢 Resolved CIK {} via {} ({})",
            entity.cik,
            entity.strategy,
            entity.name.as_deref().unwrap_or("name unknown")
        );
        Ok(entity)
    }

    async fn fetch_submissions(&self, cik: &str) -> Option<Value> {
        let request = ApiRequest::get(self.endpoints.submissions_url(cik));
        fetch_json(self.fetcher.as_ref(), &request).await
    }

    async fn resolve_entity(&self) -> Result<Vec<Record>> {
        let entity = self.resolve().await?;
        let submissions_url = self.endpoints.submissions_url(&entity.cik);
        let record = match self.fetch_submissions(&entity.cik).await {
            Some(submissions) => format_entity(
                &submissions,
                &entity.cik,
                entity.strategy.as_str(),
                self.config.recent_filings,
                &submissions_url,
            ),
            None => {
                warn!("⚠️ No submissions feed for CIK {}, emitting minimal profile", entity.cik);
                minimal_entity(
                    &entity.cik,
                    entity.name.as_deref().unwrap_or(""),
                    &entity.tickers,
                    entity.strategy.as_str(),
                    &submissions_url,
                )
            }
        };
        Ok(vec![Record::Entity(record)])
    }

    async fn company_filings(&self) -> Result<Vec<Record>> {
        let entity = self.resolve().await?;
        let Some(submissions) = self.fetch_submissions(&entity.cik).await else {
            warn!("⚠️ No submissions feed for CIK {}", entity.cik);
            return Ok(Vec::new());
        };

        let name = match submissions.get("name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => entity.name.clone().unwrap_or_default(),
        };
        let mut tickers = ticker_list(&submissions, "tickers");
        if tickers.is_empty() {
            tickers = entity.tickers.clone();
        }

        let records: Vec<Record> = recent_filing_rows(&submissions)
            .iter()
            .filter(|row| self.config.accepts_form(&row.form))
            .filter(|row| self.config.dates.contains(&row.filing_date))
            .take(self.config.max_results)
            .map(|row| Record::Filing(format_submission_filing(row, &entity.cik, &name, &tickers)))
            .collect();
        info!("📑 {} filings matched for CIK {}", records.len(), entity.cik);
        Ok(records)
    }

    async fn company_facts(&self) -> Result<Vec<Record>> {
        let entity = self.resolve().await?;
        let url = self.endpoints.company_facts_url(&entity.cik);
        let Some(body) = fetch_json(self.fetcher.as_ref(), &ApiRequest::get(&url)).await else {
            warn!("⚠️ No company facts for CIK {}", entity.cik);
            return Ok(Vec::new());
        };

        let entity_name = match body.get("entityName").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => entity.name.clone().unwrap_or_default(),
        };
        let config = self.config.as_ref();
        let mut records = Vec::new();

        let Some(namespaces) = body.get("facts").and_then(Value::as_object) else {
            return Ok(records);
        };
        'collect: for (namespace, concepts) in namespaces {
            if let Some(wanted) = &config.namespace {
                if !namespace.eq_ignore_ascii_case(wanted) {
                    continue;
                }
            }
            let Some(concepts) = concepts.as_object() else {
                continue;
            };
            for (concept, detail) in concepts {
                if let Some(wanted) = &config.concept {
                    if !concept.eq_ignore_ascii_case(wanted) {
                        continue;
                    }
                }
                let label = detail.get("label").and_then(Value::as_str).unwrap_or("");
                let Some(units) = detail.get("units").and_then(Value::as_object) else {
                    continue;
                };
                for (unit, observations) in units {
                    let ctx = FactContext {
                        cik: &entity.cik,
                        entity_name: &entity_name,
                        namespace,
                        concept,
                        label,
                        unit,
                        url: &url,
                    };
                    for observation in observations.as_array().into_iter().flatten() {
                        let fact = format_fact(ctx, observation);
                        if !config.period_type.matches(&fact.fiscal_period)
                            || !config.accepts_form(&fact.form)
                            || !config.dates.contains(&fact.end)
                        {
                            continue;
                        }
                        records.push(Record::Fact(fact));
                        if records.len() >= config.max_results {
                            break 'collect;
                        }
                    }
                }
            }
        }
        info!("📊 {} facts matched for CIK {}", records.len(), entity.cik);
        Ok(records)
    }
}

/// Stream for a mode that produces all of its records in one step.
fn one_shot<F>(work: F) -> RecordStream<'static>
where
    F: Future<Output = Result<Vec<Record>>> + Send + 'static,
{
    stream::once(work)
        .flat_map(|outcome| {
            let items: Vec<std::result::Result<Record, ScraperError>> = match outcome {
                Ok(records) => records.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
        .boxed()
}

struct FilingSearch {
    scraper: EdgarScraper,
}

#[async_trait]
impl PageSource for FilingSearch {
    type Item = Value;

    async fn fetch_page(&self, page: PageRequest) -> Option<Vec<Value>> {
        let config = self.scraper.config.as_ref();
        let mut request = ApiRequest::get(&self.scraper.endpoints.sec_full_text_search)
            .query("q", config.query.as_deref().unwrap_or(""))
            .query("from", page.offset)
            .query("size", page.limit);
        if !config.forms.is_empty() {
            request = request.query("forms", config.forms.join(","));
        }
        if !config.dates.is_unbounded() {
            let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
            request = request
                .query("dateRange", "custom")
                .query("startdt", config.dates.from.as_deref().unwrap_or(EFTS_EARLIEST_DATE))
                .query("enddt", config.dates.to.clone().unwrap_or(today));
        }

        let body = fetch_json(self.scraper.fetcher.as_ref(), &request).await?;
        body["hits"]["hits"].as_array().cloned()
    }

    fn to_record(&self, hit: Value) -> Option<Record> {
        let filing = format_filing_hit(&hit)?;
        if !self.scraper.config.accepts_form(&filing.form) {
            return None;
        }
        Some(Record::Filing(filing))
    }

    fn label(&self) -> &'static str {
        "search_filings"
    }
}
