//! Record Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A record loading error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The first line of a header block names a protocol the parser does not
    /// accept. Carries the raw line (terminator included) so another grammar
    /// can be tried on it.
    #[display("unexpected protocol line: {:?}", _0.trim_end())]
    ProtocolMismatch(#[error(not(source))] String),
    /// An ARC header line did not have the expected number of fields.
    #[display("expected 5 ARC header fields, found {_0}")]
    ArcFieldCount(#[error(not(source))] usize),
    /// Neither the WARC nor the ARC grammar matched.
    #[display("unknown archive format, first line: {:?}", _0.trim_end())]
    UnknownFormat(#[error(not(source))] String),
    /// The record length is missing or not a number.
    #[display("invalid record length: {_0:?}")]
    InvalidLength(#[error(not(source))] String),
    /// Reading or writing the record stream failed.
    #[display("I/O error")]
    Io,
    /// A record could not be serialized.
    #[display("failed to encode record")]
    Encode,
    /// Records could not be persisted to this container.
    #[display("failed to write records to {_0}")]
    WriteFailed(#[error(not(source))] String),
    /// The record at this location could not be loaded. Wraps every other
    /// failure raised while loading.
    #[display("failed to load archive record from {_0}")]
    ArchiveLoadFailed(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io | ErrorKind::ArchiveLoadFailed(_) | ErrorKind::WriteFailed(_))
    }
}
