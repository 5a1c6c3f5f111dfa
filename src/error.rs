use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MinerError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("unreadable payload: {0}")]
    Payload(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid organize-by mode: {0} (expected both, platform, organism or none)")]
    InvalidOrganizeBy(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("curated dataset for {source_label} is unreadable: {message}")]
    Curated {
        source_label: String,
        message: String,
    },

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("no datasets found in any selected source; nothing to export")]
    #[diagnostic(help("check network access or widen the --query term"))]
    NoDatasets,
}
