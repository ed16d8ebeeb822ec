//! Error types for the fetch, storage and pipeline layers

use thiserror::Error;

/// Upstream snapshot source failures.
///
/// Never surfaced past the acquisition layer: a failed fetch is treated the
/// same as an empty one and triggers the fallback-date walk.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream rejected request: {0}")]
    Rejected(String),

    #[error("failed to decode upstream payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("unexpected value in column {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

/// Why a single month could not be processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No data available for {period} (last tried {report_date})")]
    NoDataAvailable { period: String, report_date: String },

    #[error("No matching schemes between current and previous month for {period}")]
    NoMatchedSchemes { period: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
