//! Error types for the clustering engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the clustering engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Table errors
    #[error("Schema violation at row {row}: {reason}")]
    Schema { row: usize, reason: String },

    #[error("CSV error: {0}")]
    Csv(String),

    // Wallet history API errors
    #[error("API error: {0}")]
    Api(String),

    #[error("API timeout after {0}ms")]
    ApiTimeout(u64),

    #[error("API rate limited: {0}")]
    RateLimited(String),

    #[error("API rejected request ({status}): {body}")]
    ApiRejected { status: u16, body: String },

    // Serialization errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Api(_) | Error::ApiTimeout(_) | Error::RateLimited(_)
        )
    }

    /// Build a schema violation for a 0-based table row
    pub fn schema(row: usize, reason: impl Into<String>) -> Self {
        Error::Schema {
            row,
            reason: reason.into(),
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Api(e.to_string())
    }
}

// Conversion from csv errors
impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Deserialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
