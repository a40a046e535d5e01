//! Common error types for hort services

use thiserror::Error;

/// Common result type for hort operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across hort services
///
/// The first four variants are user-visible and map 1:1 to HTTP status
/// codes at the API boundary; the rest are internal and reported as a
/// generic server error.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request input (400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or unknown device credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Requested resource not resolvable (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Room or activity occupancy limit reached (409)
    ///
    /// Carries the current and limit counts for client display.
    #[error("{what} is full ({current}/{limit})")]
    CapacityExceeded {
        what: String,
        current: i64,
        limit: i64,
    },

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
