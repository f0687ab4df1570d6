//! Request Error Types

use derive_more::{Display, Error};

/// A request reconstruction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for request operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An encapsulated request body could not be parsed as an HTTP request.
    /// Retrying with the same body will fail the same way.
    #[display("malformed encapsulated request: {_0}")]
    MalformedRequest(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
