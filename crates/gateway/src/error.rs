//! Gateway Error Types
//!
//! Every kind maps to exactly one HTTP status; [`Gateway::handle`](crate::Gateway::handle)
//! turns whatever escapes dispatch into a response using it.

use derive_more::{Display, Error};
use http::StatusCode;

/// A gateway error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No route, or the collection does not exist.
    #[display("No handler for \"{_0}\"")]
    RouteNotFound(#[error(not(source))] String),
    /// The collection exists but has no capture of the URL.
    #[display("Archived URL not found: {_0}")]
    NotFound(#[error(not(source))] String),
    #[display("Can not record into fixed collection \"{_0}\"")]
    RecordingRefused(#[error(not(source))] String),
    /// A container could not be read or parsed. The archive backend may only
    /// be momentarily unreachable. The location is for logs only.
    #[display("Archive unavailable")]
    ArchiveLoadFailed(#[error(not(source))] String),
    /// An upstream collaborator (index, live web, rewriter) failed.
    #[display("{message}")]
    Upstream { status: u16, message: String },
    /// The gateway could not be assembled from its configuration.
    #[display("Invalid configuration: {_0}")]
    Config(#[error(not(source))] String),
    #[display("Internal Error")]
    Internal,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::ArchiveLoadFailed(_) => true,
            ErrorKind::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::RouteNotFound(_) | ErrorKind::NotFound(_) => StatusCode::NOT_FOUND,
            ErrorKind::RecordingRefused(_) => StatusCode::FORBIDDEN,
            ErrorKind::ArchiveLoadFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Upstream { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            ErrorKind::Config(_) | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the referer redirect heuristic may replace this error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorKind::RouteNotFound(_) | ErrorKind::NotFound(_))
    }
}
