//! Application error types for congress-sync
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use std::time::Duration;

use thiserror::Error;

/// Admission controller (token bucket) errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdmissionError {
    /// The wait for the next token is longer than the caller is willing to wait
    #[error("Token wait of {}ms exceeds timeout of {}ms", .required.as_millis(), .timeout.as_millis())]
    WouldExceedTimeout {
        /// Computed wait until a token would be available
        required: Duration,
        /// Caller-supplied timeout
        timeout: Duration,
    },

    /// The caller was queued but no token was granted before the timeout
    #[error("Timed out after {}ms waiting for a request token", .0.as_millis())]
    Timeout(Duration),

    /// The limiter was reset while the caller was queued
    #[error("Rate limiter was reset")]
    Reset,
}

/// Synchronization-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Network timeout
    #[error("Network timeout")]
    NetworkTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Rate limited by upstream
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Non-success HTTP status from upstream
    #[error("Upstream returned HTTP {status} for {endpoint}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Request path (never includes credentials)
        endpoint: String,
        /// Parsed Retry-After header, if any
        retry_after: Option<Duration>,
    },

    /// Resource not found; end-of-data for paginated listings
    #[error("Resource not found: {endpoint}")]
    NotFound {
        /// Request path
        endpoint: String,
    },

    /// Unauthorized (missing or invalid API key)
    #[error("Unauthorized")]
    Unauthorized,

    /// Invalid data received
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Could not obtain a request token
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    /// Retryable failures persisted past the retry budget
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Total attempts made
        attempts: u32,
        /// Error from the final attempt
        last_error: Box<SyncError>,
    },

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),
}

impl SyncError {
    /// Returns true for the end-of-data signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::RateLimited(_) => Some(429),
            SyncError::Upstream { status, .. } => Some(*status),
            SyncError::NotFound { .. } => Some(404),
            SyncError::Unauthorized => Some(401),
            SyncError::RetryExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}

/// Outcome of a retried operation that did not succeed
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The error was classified as non-retryable and returned immediately
    #[error("{0}")]
    NonRetryable(E),

    /// Every attempt failed with a retryable error
    #[error("Retry exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Total attempts made (`max_retries + 1`)
        attempts: u32,
        /// Error from the final attempt
        last_error: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NonRetryable(_) => 1,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The most recent underlying error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::NonRetryable(e) => e,
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }
}

impl From<RetryError<SyncError>> for SyncError {
    fn from(err: RetryError<SyncError>) -> Self {
        match err {
            RetryError::NonRetryable(e) => e,
            RetryError::Exhausted {
                attempts,
                last_error,
            } => SyncError::RetryExhausted {
                attempts,
                last_error: Box::new(last_error),
            },
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection-level error from the async SQLite wrapper
    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Stored value could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while mapping an upstream record into an internal entity
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    /// A field needed to derive the record id is absent or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Bill type is not one of the known congress.gov codes
    #[error("Unknown bill type: {0}")]
    UnknownBillType(String),

    /// Bill number is not a positive integer
    #[error("Invalid bill number: {0}")]
    InvalidBillNumber(String),
}

/// Bill id parsing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Id does not have the `{type}{number}-{congress}` shape
    #[error("Invalid bill id: {0}")]
    InvalidBillId(String),
}

/// Application-level error type
///
/// This is the main error type used throughout the application.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Sync error
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Upstream record could not be normalized
    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;

    /// Server-mandated delay before the next attempt, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// HTTP statuses that indicate a transient upstream condition
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

const TRANSIENT_NETWORK_MARKERS: [&str; 14] = [
    "timeout",
    "timed out",
    "connection reset",
    "econnreset",
    "connection refused",
    "econnrefused",
    "dns",
    "name resolution",
    "enotfound",
    "socket hang up",
    "broken pipe",
    "connection closed",
    "end of file",
    "unexpected eof",
];

/// Returns true if a network error message describes a transient failure
pub fn is_transient_network_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_NETWORK_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            // Retryable errors
            SyncError::NetworkTimeout => true,
            SyncError::ConnectionRefused => true,
            SyncError::RateLimited(_) => true,
            SyncError::Upstream { status, .. } => RETRYABLE_STATUSES.contains(status),
            SyncError::Network(message) => is_transient_network_message(message),

            // Non-retryable errors
            SyncError::NotFound { .. } => false,
            SyncError::Unauthorized => false,
            SyncError::InvalidData(_) => false,
            SyncError::Admission(_) => false,
            SyncError::RetryExhausted { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::RateLimited(secs) => Some(Duration::from_secs(*secs)),
            SyncError::Upstream { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
