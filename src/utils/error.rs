use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed JSON on ingestion or on dump load
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Dump file version tag is missing or does not match
    #[error("Dump file format unrecognized (found {found:?}, expected {expected:?})")]
    FormatMismatch {
        found: Option<String>,
        expected: &'static str,
    },

    /// Dump file parsed but its ids and counters disagree
    #[error("Invalid dump file: {0}")]
    InvalidDump(String),

    /// The capture service is no longer accepting commands
    #[error("Capture service is not running")]
    ServiceClosed,
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;
