use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{scalar_text, str_field, string_list};
use crate::models::input::{normalize_symbol, pad_cik};
use crate::models::{
    EntityRecord, FactRecord, FilingRecord, RecentFiling, RecordKind, EDGAR_SCHEMA_VERSION,
};

const ARCHIVES_BASE: &str = "https://www.sec.gov/Archives/edgar/data";

/// Trailing `(...)` group at the end of a display name.
static TRAILING_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(([^()]*)\)\s*$").expect("valid display name regex"));

/// Symbol as it appears inside a display-name parenthetical.
static DISPLAY_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9.\-]{1,10}$").expect("valid symbol regex"));

/// Upper-cased tickers from a JSON string array; blanks are dropped.
pub fn ticker_list(value: &Value, key: &str) -> Vec<String> {
    string_list(value, key)
        .iter()
        .filter_map(|ticker| normalize_symbol(ticker))
        .collect()
}

/// Split an EDGAR display name such as `"Apple Inc.  (AAPL)  (CIK 0000320193)"`
/// into the bare name and its ticker list.
pub fn parse_display_name(display: &str) -> (String, Vec<String>) {
    let mut name = display.trim().to_string();
    let mut tickers = Vec::new();

    loop {
        let Some((cut, inner)) = TRAILING_PAREN.captures(&name).and_then(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?;
            Some((whole.start(), inner.as_str().trim().to_string()))
        }) else {
            break;
        };
        if inner.to_uppercase().starts_with("CIK") {
            name.truncate(cut);
            continue;
        }
        let looks_like_tickers = inner
            .split(',')
            .all(|part| DISPLAY_SYMBOL.is_match(part.trim()));
        if !tickers.is_empty() || !looks_like_tickers {
            // Part of the name, e.g. "(Delaware)"
            break;
        }
        tickers = inner.split(',').filter_map(normalize_symbol).collect();
        name.truncate(cut);
    }
    (name.trim().to_string(), tickers)
}

/// CIK without zero padding, as used in archive paths.
fn archive_cik(cik: &str) -> &str {
    match cik.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    }
}

fn archive_folder(cik: &str, accession: &str) -> String {
    format!("{}/{}/{}", ARCHIVES_BASE, archive_cik(cik), accession.replace('-', ""))
}

fn filing_urls(cik: &str, accession: &str, document: &str) -> (String, String) {
    if accession.is_empty() {
        return (String::new(), String::new());
    }
    let folder = archive_folder(cik, accession);
    let index_url = format!("{}/{}-index.htm", folder, accession);
    let filing_url = if document.is_empty() {
        index_url.clone()
    } else {
        format!("{}/{}", folder, document)
    };
    (filing_url, index_url)
}

pub fn company_page_url(cik: &str) -> String {
    format!(
        "https://www.sec.gov/cgi-bin/browse-edgar?action=getcompany&CIK={}",
        cik
    )
}

/// One row of the column-oriented `filings.recent` block in a submissions feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingRow {
    pub accession_number: String,
    pub filing_date: String,
    pub report_date: String,
    pub form: String,
    pub primary_document: String,
    pub description: String,
}

/// Rows of `filings.recent`, newest first as served.
pub fn recent_filing_rows(submissions: &Value) -> Vec<FilingRow> {
    let recent = &submissions["filings"]["recent"];
    let column = |key: &str| -> Vec<String> {
        recent
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(scalar_text).collect())
            .unwrap_or_default()
    };

    let accessions = column("accessionNumber");
    let filing_dates = column("filingDate");
    let report_dates = column("reportDate");
    let forms = column("form");
    let documents = column("primaryDocument");
    let descriptions = column("primaryDocDescription");
    fn cell(col: &[String], i: usize) -> String {
        col.get(i).cloned().unwrap_or_default()
    }

    (0..accessions.len())
        .map(|i| FilingRow {
            accession_number: cell(&accessions, i),
            filing_date: cell(&filing_dates, i),
            report_date: cell(&report_dates, i),
            form: cell(&forms, i),
            primary_document: cell(&documents, i),
            description: cell(&descriptions, i),
        })
        .collect()
}

pub fn format_recent_filing(row: &FilingRow, cik: &str) -> RecentFiling {
    let (url, _) = filing_urls(cik, &row.accession_number, &row.primary_document);
    RecentFiling {
        form: row.form.clone(),
        filing_date: row.filing_date.clone(),
        accession_number: row.accession_number.clone(),
        url,
    }
}

/// Filing record for a row of a company's own submissions feed.
pub fn format_submission_filing(
    row: &FilingRow,
    cik: &str,
    entity_name: &str,
    tickers: &[String],
) -> FilingRecord {
    let (filing_url, index_url) =
        filing_urls(cik, &row.accession_number, &row.primary_document);
    FilingRecord {
        kind: RecordKind::Filing,
        schema_version: EDGAR_SCHEMA_VERSION.to_string(),
        source: "submissions".to_string(),
        cik: cik.to_string(),
        entity_name: entity_name.to_string(),
        tickers: tickers.to_vec(),
        form: row.form.clone(),
        filing_date: row.filing_date.clone(),
        period_ending: row.report_date.clone(),
        accession_number: row.accession_number.clone(),
        primary_document: row.primary_document.clone(),
        description: row.description.clone(),
        filing_url,
        index_url,
    }
}

fn format_address(address: &Value) -> String {
    let parts: Vec<&str> = ["street1", "street2", "city", "stateOrCountry", "zipCode"]
        .iter()
        .map(|key| str_field(address, key).trim())
        .filter(|part| !part.is_empty())
        .collect();
    parts.join(", ")
}

/// Entity profile from a submissions feed, with up to `recent_cap` recent
/// filings attached.
pub fn format_entity(
    submissions: &Value,
    cik: &str,
    resolved_by: &str,
    recent_cap: usize,
    submissions_url: &str,
) -> EntityRecord {
    let recent_filings = recent_filing_rows(submissions)
        .iter()
        .take(recent_cap)
        .map(|row| format_recent_filing(row, cik))
        .collect();

    let former_names = submissions
        .get("formerNames")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .map(|n| str_field(n, "name").to_string())
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();

    EntityRecord {
        kind: RecordKind::Entity,
        schema_version: EDGAR_SCHEMA_VERSION.to_string(),
        cik: cik.to_string(),
        name: str_field(submissions, "name").to_string(),
        tickers: ticker_list(submissions, "tickers"),
        exchanges: string_list(submissions, "exchanges"),
        sic: scalar_text(&submissions["sic"]),
        sic_description: str_field(submissions, "sicDescription").to_string(),
        entity_type: str_field(submissions, "entityType").to_string(),
        category: str_field(submissions, "category").to_string(),
        state_of_incorporation: str_field(submissions, "stateOfIncorporation").to_string(),
        fiscal_year_end: str_field(submissions, "fiscalYearEnd").to_string(),
        ein: scalar_text(&submissions["ein"]),
        website: str_field(submissions, "website").to_string(),
        phone: str_field(submissions, "phone").to_string(),
        business_address: format_address(&submissions["addresses"]["business"]),
        former_names,
        resolved_by: resolved_by.to_string(),
        recent_filings,
        submissions_url: submissions_url.to_string(),
        url: company_page_url(cik),
    }
}

/// Minimal profile used when only the resolution step succeeded.
pub fn minimal_entity(
    cik: &str,
    name: &str,
    tickers: &[String],
    resolved_by: &str,
    submissions_url: &str,
) -> EntityRecord {
    EntityRecord {
        kind: RecordKind::Entity,
        schema_version: EDGAR_SCHEMA_VERSION.to_string(),
        cik: cik.to_string(),
        name: name.to_string(),
        tickers: tickers.to_vec(),
        exchanges: Vec::new(),
        sic: String::new(),
        sic_description: String::new(),
        entity_type: String::new(),
        category: String::new(),
        state_of_incorporation: String::new(),
        fiscal_year_end: String::new(),
        ein: String::new(),
        website: String::new(),
        phone: String::new(),
        business_address: String::new(),
        former_names: Vec::new(),
        resolved_by: resolved_by.to_string(),
        recent_filings: Vec::new(),
        submissions_url: submissions_url.to_string(),
        url: company_page_url(cik),
    }
}

/// Filing record from one full-text search hit. Hits without a CIK are
/// skipped.
pub fn format_filing_hit(hit: &Value) -> Option<FilingRecord> {
    let source = &hit["_source"];
    let cik = source
        .get("ciks")
        .and_then(Value::as_array)
        .and_then(|ciks| ciks.first())
        .map(scalar_text)
        .and_then(|raw| pad_cik(&raw))?;

    let display = source
        .get("display_names")
        .and_then(Value::as_array)
        .and_then(|names| names.first())
        .and_then(Value::as_str)
        .unwrap_or("");
    let (entity_name, tickers) = parse_display_name(display);

    // `_id` is "<accession>:<primary document>"
    let id = str_field(hit, "_id");
    let (id_accession, document) = id.split_once(':').unwrap_or((id, ""));
    let accession = match str_field(source, "adsh") {
        "" => id_accession,
        adsh => adsh,
    };
    let form = match str_field(source, "form") {
        "" => str_field(source, "file_type"),
        form => form,
    };
    let (filing_url, index_url) = filing_urls(&cik, accession, document);

    Some(FilingRecord {
        kind: RecordKind::Filing,
        schema_version: EDGAR_SCHEMA_VERSION.to_string(),
        source: "full_text_search".to_string(),
        entity_name,
        tickers,
        form: form.to_string(),
        filing_date: str_field(source, "file_date").to_string(),
        period_ending: str_field(source, "period_ending").to_string(),
        accession_number: accession.to_string(),
        primary_document: document.to_string(),
        description: str_field(source, "file_description").to_string(),
        filing_url,
        index_url,
        cik,
    })
}

/// Per-series context shared by every observation of one concept/unit.
#[derive(Debug, Clone, Copy)]
pub struct FactContext<'a> {
    pub cik: &'a str,
    pub entity_name: &'a str,
    pub namespace: &'a str,
    pub concept: &'a str,
    pub label: &'a str,
    pub unit: &'a str,
    pub url: &'a str,
}

pub fn format_fact(ctx: FactContext<'_>, observation: &Value) -> FactRecord {
    let optional = |key: &str| {
        observation
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    FactRecord {
        kind: RecordKind::Fact,
        schema_version: EDGAR_SCHEMA_VERSION.to_string(),
        cik: ctx.cik.to_string(),
        entity_name: ctx.entity_name.to_string(),
        namespace: ctx.namespace.to_string(),
        concept: ctx.concept.to_string(),
        label: ctx.label.to_string(),
        unit: ctx.unit.to_string(),
        value: observation.get("val").cloned().unwrap_or(Value::Null),
        start: optional("start"),
        end: str_field(observation, "end").to_string(),
        fiscal_year: observation.get("fy").and_then(Value::as_i64),
        fiscal_period: str_field(observation, "fp").to_string(),
        form: str_field(observation, "form").to_string(),
        filed: str_field(observation, "filed").to_string(),
        accession_number: str_field(observation, "accn").to_string(),
        frame: optional("frame"),
        url: ctx.url.to_string(),
    }
}
