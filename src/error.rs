use thiserror::Error;

/// Run input rejected before any network activity.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Input is not valid JSON for this actor: {0}")]
    Malformed(String),

    #[error("Unknown mode '{0}'")]
    UnknownMode(String),

    #[error("{field} must be in YYYY-MM-DD format (got '{value}')")]
    InvalidDate { field: &'static str, value: String },

    #[error("CIK '{0}' has more than 10 digits")]
    InvalidCik(String),

    #[error("Unknown period type '{0}' (expected all, annual or quarterly)")]
    InvalidPeriodType(String),

    #[error("{0}")]
    MissingForMode(String),
}

/// Failures surfaced to the run loop while a mode is producing records.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Could not resolve an SEC entity from cik={cik:?} ticker={ticker:?} query={query:?}")]
    EntityNotFound {
        cik: Option<String>,
        ticker: Option<String>,
        query: Option<String>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
