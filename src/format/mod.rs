//! Pure converters from upstream payloads to flat output records.

use serde_json::Value;

pub mod aiml;
pub mod edgar;

pub use aiml::{format_arxiv_paper, format_daily_paper, format_model};
pub use edgar::{
    company_page_url, format_entity, format_fact, format_filing_hit, format_recent_filing,
    format_submission_filing, minimal_entity, parse_display_name, recent_filing_rows,
    ticker_list, FactContext, FilingRow,
};

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// String field, empty when missing or not a string.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Integer field; floats are truncated, anything else is 0.
pub(crate) fn i64_field(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        None => 0,
    }
}

/// Strings of a JSON array, skipping non-string entries.
pub(crate) fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Scalar rendered as text: strings as-is, numbers via `to_string`.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
