//! HuggingFace Hub and arXiv modes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{fetch_json, fetch_xml, ApiRequest, Endpoints, Fetcher};
use crate::format::{format_arxiv_paper, format_daily_paper, format_model};
use crate::models::{AiMlConfig, AiMlMode, DateWindow, Record};
use crate::pagination::{paginate, PageRequest, PageSource, Pager, RecordStream};
use crate::xml::{XmlElement, ATOM_NS};

/// HuggingFace has no documented maximum; 100 per page is safe.
pub const HF_PAGE_SIZE: usize = 100;
pub const ARXIV_PAGE_SIZE: usize = 200;
/// arXiv stops serving results past this offset.
pub const ARXIV_MAX_DEPTH: usize = 10_000;
/// Query used when no keyword, category or author is given.
pub const DEFAULT_ARXIV_QUERY: &str = "cat:cs.AI OR cat:cs.LG OR cat:cs.CL OR cat:cs.CV";

pub struct AiMlScraper {
    fetcher: Arc<dyn Fetcher>,
    endpoints: Endpoints,
    config: AiMlConfig,
}

impl AiMlScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, endpoints: Endpoints, config: AiMlConfig) -> Self {
        Self {
            fetcher,
            endpoints,
            config,
        }
    }

    /// Stream of records for the configured mode.
    pub fn scrape(&self) -> RecordStream<'static> {
        let target = self.config.max_results;
        match self.config.mode {
            AiMlMode::SearchModels => {
                info!("🤗 Searching HuggingFace models: '{}'", self.config.query);
                let source = ModelSearch {
                    fetcher: Arc::clone(&self.fetcher),
                    url: self.endpoints.hf_models.clone(),
                    config: self.config.clone(),
                };
                paginate(source, Pager::new(HF_PAGE_SIZE, target))
            }
            AiMlMode::SearchPapers => {
                info!(
                    "📚 Searching arXiv papers: query='{}' category='{}'",
                    self.config.query, self.config.arxiv_category
                );
                let source = PaperSearch {
                    fetcher: Arc::clone(&self.fetcher),
                    url: self.endpoints.arxiv_query.clone(),
                    search_query: build_arxiv_query(&self.config),
                    sort_by: self.config.paper_sort.as_str(),
                    dates: self.config.dates.clone(),
                };
                let pager = Pager::new(ARXIV_PAGE_SIZE, target).with_max_offset(ARXIV_MAX_DEPTH);
                paginate(source, pager)
            }
            AiMlMode::TrendingPapers => {
                info!("🔥 Fetching trending papers from HuggingFace Daily Papers");
                let source = TrendingPapers {
                    fetcher: Arc::clone(&self.fetcher),
                    url: self.endpoints.hf_daily_papers.clone(),
                    keyword: self.config.query.to_lowercase(),
                };
                paginate(source, Pager::new(HF_PAGE_SIZE, target))
            }
        }
    }
}

/// Query parameters for one `/api/models` page.
pub fn build_model_params(config: &AiMlConfig, page: PageRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("limit".to_string(), page.limit.to_string()),
        ("offset".to_string(), page.offset.to_string()),
    ];
    if !config.query.is_empty() {
        params.push(("search".to_string(), config.query.clone()));
    }
    params.push(("sort".to_string(), config.model_sort.api_key().to_string()));
    params.push(("direction".to_string(), "-1".to_string()));
    if !config.pipeline_tag.is_empty() {
        params.push(("pipeline_tag".to_string(), config.pipeline_tag.clone()));
    }
    if !config.library_filter.is_empty() {
        params.push(("library".to_string(), config.library_filter.clone()));
    }
    params
}

fn field_term(field: &str, value: &str) -> String {
    if value.contains(char::is_whitespace) {
        format!("{}:\"{}\"", field, value)
    } else {
        format!("{}:{}", field, value)
    }
}

/// arXiv `search_query` built from keyword, category and author.
pub fn build_arxiv_query(config: &AiMlConfig) -> String {
    let mut parts = Vec::new();
    if !config.query.is_empty() {
        parts.push(field_term("all", &config.query));
    }
    if !config.arxiv_category.is_empty() {
        parts.push(format!("cat:{}", config.arxiv_category));
    }
    if !config.author.is_empty() {
        parts.push(field_term("au", &config.author));
    }
    if parts.is_empty() {
        return DEFAULT_ARXIV_QUERY.to_string();
    }
    parts.join(" AND ")
}

fn json_items(value: Option<Value>) -> Option<Vec<Value>> {
    match value? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

struct ModelSearch {
    fetcher: Arc<dyn Fetcher>,
    url: String,
    config: AiMlConfig,
}

#[async_trait]
impl PageSource for ModelSearch {
    type Item = Value;

    async fn fetch_page(&self, page: PageRequest) -> Option<Vec<Value>> {
        let mut request = ApiRequest::get(&self.url);
        request.query = build_model_params(&self.config, page);
        json_items(fetch_json(self.fetcher.as_ref(), &request).await)
    }

    fn to_record(&self, item: Value) -> Option<Record> {
        Some(Record::Model(format_model(&item)))
    }

    fn label(&self) -> &'static str {
        "search_models"
    }
}

struct PaperSearch {
    fetcher: Arc<dyn Fetcher>,
    url: String,
    search_query: String,
    sort_by: &'static str,
    dates: DateWindow,
}

#[async_trait]
impl PageSource for PaperSearch {
    type Item = XmlElement;

    async fn fetch_page(&self, page: PageRequest) -> Option<Vec<XmlElement>> {
        debug!(
            "arXiv query: search_query='{}' start={} max_results={}",
            self.search_query, page.offset, page.limit
        );
        let request = ApiRequest::get(&self.url)
            .query("search_query", &self.search_query)
            .query("start", page.offset)
            .query("max_results", page.limit)
            .query("sortBy", self.sort_by)
            .query("sortOrder", "descending");
        let feed = fetch_xml(self.fetcher.as_ref(), &request).await?;
        Some(
            feed.children
                .into_iter()
                .filter(|child| child.is(ATOM_NS, "entry"))
                .collect(),
        )
    }

    fn to_record(&self, entry: XmlElement) -> Option<Record> {
        let paper = format_arxiv_paper(&entry);
        if !self.dates.contains(&paper.published_date) {
            return None;
        }
        Some(Record::ArxivPaper(paper))
    }

    fn label(&self) -> &'static str {
        "search_papers"
    }
}

struct TrendingPapers {
    fetcher: Arc<dyn Fetcher>,
    url: String,
    /// Lower-cased keyword; empty keeps everything.
    keyword: String,
}

#[async_trait]
impl PageSource for TrendingPapers {
    type Item = Value;

    async fn fetch_page(&self, page: PageRequest) -> Option<Vec<Value>> {
        let request = ApiRequest::get(&self.url)
            .query("limit", page.limit)
            .query("offset", page.offset);
        json_items(fetch_json(self.fetcher.as_ref(), &request).await)
    }

    fn to_record(&self, item: Value) -> Option<Record> {
        let paper = format_daily_paper(&item);
        if !self.keyword.is_empty()
            && !paper.title.to_lowercase().contains(&self.keyword)
            && !paper.summary.to_lowercase().contains(&self.keyword)
        {
            return None;
        }
        Some(Record::DailyPaper(paper))
    }

    fn label(&self) -> &'static str {
        "trending_papers"
    }
}
