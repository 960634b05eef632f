//! Run input parsing and validation.
//!
//! Raw actor input arrives as loosely typed JSON (camelCase keys, every key
//! optional). It is parsed once into an immutable config; nothing downstream
//! ever sees the raw mapping.

use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::InputError;

/// Upper bound for `maxResults`.
pub const MAX_RESULTS_CEILING: usize = 10_000;

/// Default `maxResults` when the input omits it.
pub const DEFAULT_MAX_RESULTS: i64 = 100;

/// Width of a canonical SEC Central Index Key.
pub const CIK_WIDTH: usize = 10;

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

/// Clamp a requested result count into `[1, MAX_RESULTS_CEILING]`.
pub fn clamp_max_results(requested: i64) -> usize {
    requested.clamp(1, MAX_RESULTS_CEILING as i64) as usize
}

/// Normalize a CIK to its 10-digit zero-padded form.
///
/// Non-digit characters are dropped, so `"CIK0000320193"`, `"320193"` and
/// `"0000320193"` all map to `"0000320193"`. Blank input yields `None`.
pub fn normalize_cik(raw: &str) -> Result<Option<String>, InputError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Ok(None);
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.len() > CIK_WIDTH {
        return Err(InputError::InvalidCik(raw.to_string()));
    }
    Ok(Some(format!("{:0>width$}", trimmed, width = CIK_WIDTH)))
}

/// Pad a CIK coming back from an upstream API. Values that cannot be a CIK
/// yield `None`.
pub fn pad_cik(raw: &str) -> Option<String> {
    normalize_cik(raw).ok().flatten()
}

/// Upper-case and trim a ticker or form-type style symbol.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol)
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn validate_date(field: &'static str, raw: &str) -> Result<Option<String>, InputError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if !DATE_PATTERN.is_match(value) {
        return Err(InputError::InvalidDate {
            field,
            value: value.to_string(),
        });
    }
    Ok(Some(value.to_string()))
}

/// Inclusive `YYYY-MM-DD` window applied to upstream timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateWindow {
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Compare the first ten characters of an ISO timestamp against the
    /// window. Blank timestamps are never filtered out.
    pub fn contains(&self, timestamp: &str) -> bool {
        if timestamp.is_empty() {
            return true;
        }
        let day = timestamp.get(..10).unwrap_or(timestamp);
        if let Some(from) = &self.from {
            if day < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if day > to.as_str() {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// AI/ML actor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMlMode {
    SearchModels,
    SearchPapers,
    TrendingPapers,
}

impl AiMlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiMlMode::SearchModels => "search_models",
            AiMlMode::SearchPapers => "search_papers",
            AiMlMode::TrendingPapers => "trending_papers",
        }
    }
}

impl FromStr for AiMlMode {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "search_models" => Ok(AiMlMode::SearchModels),
            "search_papers" => Ok(AiMlMode::SearchPapers),
            "trending_papers" => Ok(AiMlMode::TrendingPapers),
            other => Err(InputError::UnknownMode(other.to_string())),
        }
    }
}

/// HuggingFace model sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSort {
    Downloads,
    Likes,
    Trending,
}

impl ModelSort {
    /// Unknown keys fall back to downloads.
    pub fn from_input(raw: &str) -> Self {
        match raw.trim() {
            "likes" => ModelSort::Likes,
            "trending" => ModelSort::Trending,
            _ => ModelSort::Downloads,
        }
    }

    /// Value of the `sort` query parameter.
    pub fn api_key(&self) -> &'static str {
        match self {
            ModelSort::Downloads => "downloads",
            ModelSort::Likes => "likes",
            ModelSort::Trending => "trendingScore",
        }
    }
}

/// arXiv `sortBy` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperSort {
    Relevance,
    SubmittedDate,
    LastUpdatedDate,
}

impl PaperSort {
    /// Unknown keys (including the model default `downloads`) fall back to
    /// relevance.
    pub fn from_input(raw: &str) -> Self {
        match raw.trim() {
            "submittedDate" => PaperSort::SubmittedDate,
            "lastUpdatedDate" => PaperSort::LastUpdatedDate,
            _ => PaperSort::Relevance,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaperSort::Relevance => "relevance",
            PaperSort::SubmittedDate => "submittedDate",
            PaperSort::LastUpdatedDate => "lastUpdatedDate",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAiMlInput {
    pub mode: String,
    pub query: String,
    pub sort: Option<String>,
    pub pipeline_tag: String,
    pub library_filter: String,
    pub arxiv_category: String,
    pub author: String,
    pub date_from: String,
    pub date_to: String,
    pub max_results: Option<i64>,
}

/// Validated AI/ML actor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AiMlConfig {
    pub mode: AiMlMode,
    pub query: String,
    pub model_sort: ModelSort,
    pub paper_sort: PaperSort,
    pub pipeline_tag: String,
    pub library_filter: String,
    pub arxiv_category: String,
    pub author: String,
    pub dates: DateWindow,
    pub max_results: usize,
}

impl AiMlConfig {
    /// Parse and validate raw actor input.
    pub fn from_input(raw: &Value) -> Result<Self, InputError> {
        let raw: RawAiMlInput = serde_json::from_value(raw.clone())
            .map_err(|e| InputError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawAiMlInput) -> Result<Self, InputError> {
        let sort = raw.sort.unwrap_or_else(|| "downloads".to_string());
        let config = AiMlConfig {
            mode: raw.mode.parse()?,
            query: raw.query.trim().to_string(),
            model_sort: ModelSort::from_input(&sort),
            paper_sort: PaperSort::from_input(&sort),
            pipeline_tag: raw.pipeline_tag.trim().to_string(),
            library_filter: raw.library_filter.trim().to_string(),
            arxiv_category: raw.arxiv_category.trim().to_string(),
            author: raw.author.trim().to_string(),
            dates: DateWindow {
                from: validate_date("dateFrom", &raw.date_from)?,
                to: validate_date("dateTo", &raw.date_to)?,
            },
            max_results: clamp_max_results(raw.max_results.unwrap_or(DEFAULT_MAX_RESULTS)),
        };
        config.validate_for_mode()?;
        Ok(config)
    }

    fn validate_for_mode(&self) -> Result<(), InputError> {
        match self.mode {
            AiMlMode::SearchModels if self.query.is_empty() => Err(InputError::MissingForMode(
                "A search query is required for 'Search Models' mode.".to_string(),
            )),
            AiMlMode::SearchPapers
                if self.query.is_empty() && self.arxiv_category.is_empty() && self.author.is_empty() =>
            {
                Err(InputError::MissingForMode(
                    "At least one filter is required for 'Search Papers' mode: \
                     query, arXiv category, or author."
                        .to_string(),
                ))
            }
            // trending_papers reads the daily feed and needs nothing
            _ => Ok(()),
        }
    }

    /// Copy of this config with a lower result cap (free-tier gate).
    pub fn with_max_results(&self, max_results: usize) -> Self {
        Self {
            max_results: max_results.min(self.max_results).max(1),
            ..self.clone()
        }
    }
}

// ============================================================================
// EDGAR actor
// ============================================================================

/// Default minimum spacing between SEC requests (SEC asks for <= 10 req/s).
pub const DEFAULT_EDGAR_INTERVAL_SECS: f64 = 0.15;
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RECENT_FILINGS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgarMode {
    ResolveEntity,
    SearchFilings,
    CompanyFilings,
    CompanyFacts,
}

impl EdgarMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgarMode::ResolveEntity => "resolve_entity",
            EdgarMode::SearchFilings => "search_filings",
            EdgarMode::CompanyFilings => "company_filings",
            EdgarMode::CompanyFacts => "company_facts",
        }
    }

    fn needs_entity(&self) -> bool {
        !matches!(self, EdgarMode::SearchFilings)
    }
}

impl FromStr for EdgarMode {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "resolve_entity" => Ok(EdgarMode::ResolveEntity),
            "search_filings" => Ok(EdgarMode::SearchFilings),
            "company_filings" => Ok(EdgarMode::CompanyFilings),
            "company_facts" => Ok(EdgarMode::CompanyFacts),
            other => Err(InputError::UnknownMode(other.to_string())),
        }
    }
}

/// Fiscal period filter for XBRL facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    All,
    Annual,
    Quarterly,
}

impl PeriodType {
    /// `fp` is the XBRL fiscal period code (`FY`, `Q1`..`Q4`).
    pub fn matches(&self, fiscal_period: &str) -> bool {
        match self {
            PeriodType::All => true,
            PeriodType::Annual => fiscal_period.eq_ignore_ascii_case("FY"),
            PeriodType::Quarterly => fiscal_period.to_ascii_uppercase().starts_with('Q'),
        }
    }
}

impl FromStr for PeriodType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(PeriodType::All),
            "annual" | "fy" => Ok(PeriodType::Annual),
            "quarterly" | "q" => Ok(PeriodType::Quarterly),
            _ => Err(InputError::InvalidPeriodType(s.to_string())),
        }
    }
}

/// CIKs show up both as JSON numbers and as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CikInput {
    Number(u64),
    Text(String),
}

impl CikInput {
    fn as_text(&self) -> String {
        match self {
            CikInput::Number(n) => n.to_string(),
            CikInput::Text(s) => s.clone(),
        }
    }
}

/// Form types as a JSON list or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FormsInput {
    List(Vec<String>),
    Text(String),
}

impl FormsInput {
    fn normalized(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            FormsInput::List(items) => items.iter().map(String::as_str).collect(),
            FormsInput::Text(text) => text.split(',').collect(),
        };
        raw.into_iter().filter_map(normalize_symbol).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEdgarInput {
    pub mode: String,
    pub query: String,
    pub cik: Option<CikInput>,
    pub ticker: String,
    pub forms: Option<FormsInput>,
    pub date_from: String,
    pub date_to: String,
    pub start: Option<u64>,
    pub max_results: Option<i64>,
    pub recent_filings: Option<u64>,
    pub namespace: String,
    pub concept: String,
    pub period_type: String,
    pub include_amendments: bool,
    pub form_prefix: String,
    pub request_interval: Option<f64>,
    pub timeout_secs: Option<f64>,
    pub max_retries: Option<u32>,
    pub user_agent: String,
}

/// Validated EDGAR actor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgarConfig {
    pub mode: EdgarMode,
    pub query: Option<String>,
    pub cik: Option<String>,
    pub ticker: Option<String>,
    pub forms: Vec<String>,
    pub dates: DateWindow,
    pub start: usize,
    pub max_results: usize,
    pub recent_filings: usize,
    pub namespace: Option<String>,
    pub concept: Option<String>,
    pub period_type: PeriodType,
    pub include_amendments: bool,
    pub form_prefix: Option<String>,
    pub request_interval: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: Option<String>,
}

fn seconds(raw: Option<f64>, default: f64) -> Duration {
    let secs = raw.filter(|s| s.is_finite() && *s >= 0.0).unwrap_or(default);
    Duration::from_secs_f64(secs)
}

impl EdgarConfig {
    pub fn from_input(raw: &Value) -> Result<Self, InputError> {
        let raw: RawEdgarInput = serde_json::from_value(raw.clone())
            .map_err(|e| InputError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawEdgarInput) -> Result<Self, InputError> {
        let cik = match &raw.cik {
            Some(cik) => normalize_cik(&cik.as_text())?,
            None => None,
        };
        let config = EdgarConfig {
            mode: raw.mode.parse()?,
            query: non_empty(&raw.query),
            cik,
            ticker: normalize_symbol(&raw.ticker),
            forms: raw.forms.as_ref().map(FormsInput::normalized).unwrap_or_default(),
            dates: DateWindow {
                from: validate_date("dateFrom", &raw.date_from)?,
                to: validate_date("dateTo", &raw.date_to)?,
            },
            start: raw.start.unwrap_or(0) as usize,
            max_results: clamp_max_results(raw.max_results.unwrap_or(DEFAULT_MAX_RESULTS)),
            recent_filings: raw
                .recent_filings
                .map(|n| (n as usize).min(MAX_RESULTS_CEILING))
                .unwrap_or(DEFAULT_RECENT_FILINGS),
            namespace: non_empty(&raw.namespace),
            concept: non_empty(&raw.concept),
            period_type: raw.period_type.parse()?,
            include_amendments: raw.include_amendments,
            form_prefix: normalize_symbol(&raw.form_prefix),
            request_interval: seconds(raw.request_interval, DEFAULT_EDGAR_INTERVAL_SECS),
            timeout: seconds(raw.timeout_secs, DEFAULT_TIMEOUT_SECS),
            max_retries: raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES).min(10),
            user_agent: non_empty(&raw.user_agent),
        };
        config.validate_for_mode()?;
        Ok(config)
    }

    fn validate_for_mode(&self) -> Result<(), InputError> {
        if self.mode.needs_entity()
            && self.cik.is_none()
            && self.ticker.is_none()
            && self.query.is_none()
        {
            return Err(InputError::MissingForMode(format!(
                "'{}' mode needs a CIK, a ticker, or a company name query.",
                self.mode.as_str()
            )));
        }
        if self.mode == EdgarMode::SearchFilings && self.query.is_none() {
            return Err(InputError::MissingForMode(
                "A search query is required for 'Search Filings' mode.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_results(&self, max_results: usize) -> Self {
        Self {
            max_results: max_results.min(self.max_results).max(1),
            ..self.clone()
        }
    }

    /// Form-type filters shared by every filing and fact mode: amendments
    /// (`/A`) are dropped unless requested, `formPrefix` must match, and an
    /// explicit form list must contain the base form.
    pub fn accepts_form(&self, form: &str) -> bool {
        let form = form.trim().to_uppercase();
        let is_amendment = form.ends_with("/A");
        if is_amendment && !self.include_amendments {
            return false;
        }
        if let Some(prefix) = &self.form_prefix {
            if !form.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if !self.forms.is_empty() {
            let base = form.trim_end_matches("/A");
            return self.forms.iter().any(|f| f == &form || f == base);
        }
        true
    }
}
