use serde::Serialize;
use serde_json::Value;

pub mod input;

pub use input::{
    AiMlConfig, AiMlMode, DateWindow, EdgarConfig, EdgarMode, ModelSort, PaperSort, PeriodType,
};

/// Version stamped on every EDGAR record.
pub const EDGAR_SCHEMA_VERSION: &str = "1.0";

/// Value of the `type` discriminator carried by every output record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Model,
    Paper,
    Entity,
    Filing,
    Fact,
}

/// One flat output record pushed to the dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Model(ModelRecord),
    ArxivPaper(ArxivPaperRecord),
    DailyPaper(DailyPaperRecord),
    Entity(EntityRecord),
    Filing(FilingRecord),
    Fact(FactRecord),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Model(_) => RecordKind::Model,
            Record::ArxivPaper(_) | Record::DailyPaper(_) => RecordKind::Paper,
            Record::Entity(_) => RecordKind::Entity,
            Record::Filing(_) => RecordKind::Filing,
            Record::Fact(_) => RecordKind::Fact,
        }
    }
}

/// HuggingFace Hub model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub model_id: String,
    pub author: String,
    pub model_name: String,
    pub pipeline_tag: String,
    pub library: String,
    pub downloads: i64,
    pub downloads_all_time: i64,
    pub likes: i64,
    pub trending: f64,
    pub tags: Vec<String>,
    pub last_modified: String,
    pub created_at: String,
    pub private: bool,
    /// `false`, `"auto"` or `"manual"` upstream.
    pub gated: Value,
    pub url: String,
}

/// arXiv Atom entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArxivPaperRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub source: String,
    pub arxiv_id: String,
    pub title: String,
    pub summary: String,
    pub authors: String,
    pub author_list: Vec<String>,
    pub published_date: String,
    pub updated_date: String,
    pub primary_category: String,
    pub categories: String,
    pub category_list: Vec<String>,
    pub comment: String,
    pub pdf_url: String,
    pub url: String,
}

/// HuggingFace Daily Papers item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPaperRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub source: String,
    pub arxiv_id: String,
    pub title: String,
    pub summary: String,
    pub authors: String,
    pub author_list: Vec<String>,
    pub published_date: String,
    pub upvotes: i64,
    pub num_comments: i64,
    pub ai_summary: String,
    pub ai_keywords: Vec<String>,
    pub submitted_by: String,
    pub media_url: String,
    pub pdf_url: String,
    pub url: String,
}

/// Compact filing row embedded in an entity profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFiling {
    pub form: String,
    pub filing_date: String,
    pub accession_number: String,
    pub url: String,
}

/// SEC registrant profile
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(rename = "schema_version")]
    pub schema_version: String,
    pub cik: String,
    pub name: String,
    pub tickers: Vec<String>,
    pub exchanges: Vec<String>,
    pub sic: String,
    pub sic_description: String,
    pub entity_type: String,
    pub category: String,
    pub state_of_incorporation: String,
    pub fiscal_year_end: String,
    pub ein: String,
    pub website: String,
    pub phone: String,
    pub business_address: String,
    pub former_names: Vec<String>,
    pub resolved_by: String,
    pub recent_filings: Vec<RecentFiling>,
    pub submissions_url: String,
    pub url: String,
}

/// SEC filing, from the full-text search index or a submissions feed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(rename = "schema_version")]
    pub schema_version: String,
    pub source: String,
    pub cik: String,
    pub entity_name: String,
    pub tickers: Vec<String>,
    pub form: String,
    pub filing_date: String,
    pub period_ending: String,
    pub accession_number: String,
    pub primary_document: String,
    pub description: String,
    pub filing_url: String,
    pub index_url: String,
}

/// One XBRL fact observation from the company-facts feed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactRecord {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(rename = "schema_version")]
    pub schema_version: String,
    pub cik: String,
    pub entity_name: String,
    pub namespace: String,
    pub concept: String,
    pub label: String,
    pub unit: String,
    pub value: Value,
    pub start: Option<String>,
    pub end: String,
    pub fiscal_year: Option<i64>,
    pub fiscal_period: String,
    pub form: String,
    pub filed: String,
    pub accession_number: String,
    pub frame: Option<String>,
    pub url: String,
}
