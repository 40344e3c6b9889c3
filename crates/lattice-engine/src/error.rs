//! Error types for the engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by graph, session and device operations
///
/// Every fallible engine call reports through this type; callers are
/// expected to check it immediately and stop the enclosing operation on
/// failure.
#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("could not parse session configuration: {0}")]
    ConfigParse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("session has been closed")]
    SessionClosed,

    #[error("internal error: {0}")]
    Internal(String),
}
