//! Error types for the adapter

use thiserror::Error;

/// Main error type for the adapter
#[derive(Error, Debug)]
pub enum Error {
    /// Backend error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised while talking to the volkszaehler middleware
///
/// Every variant is recoverable from the point of view of a query: the
/// engine downgrades them to an empty result for the affected target.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport failure or timeout
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware answered with a non-success status code
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Middleware reported an exception in its response payload
    #[error("API exception: {0}")]
    Api(String),

    /// Base URL or endpoint could not be turned into a request URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// Field name being validated
        field: String,
        /// Description of the format error
        message: String,
    },
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Configuration(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
