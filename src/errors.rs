use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataHubError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Arrow error: {0}")]
    ArrowError(String),

    #[error("Date parsing error: {0}")]
    DateError(#[from] chrono::ParseError),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not resolve instrument list: {0}")]
    NoInstruments(String),

    #[error("Data error: {0}")]
    DataError(String),

}

pub type Result<T> = std::result::Result<T, DataHubError>;

/// Why a single raw token could not become a typed value.
///
/// These never abort an entity: the caller drops the data point and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty token")]
    Empty,

    #[error("malformed number: {0:?}")]
    Malformed(String),

    #[error("unknown date format: {0:?}")]
    UnknownDateFormat(String),

    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}
