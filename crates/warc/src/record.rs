use crate::error::{ErrorKind, Result};
use crate::headers::StatusAndHeaders;
use derive_more::Display;
use exn::ResultExt;
use std::fmt;
use std::io::{BufRead, Read, Take};

/// Container grammar a record was read with.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    #[display("warc")]
    Warc,
    #[display("arc")]
    Arc,
}

/// What a record holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    Response,
    Request,
    Revisit,
    Metadata,
    Resource,
    Warcinfo,
    /// The `filedesc://` record opening an ARC file.
    ArcHeader,
    /// Any other `WARC-Type` value, kept verbatim.
    Other(String),
}

impl RecordType {
    /// Classify a `WARC-Type` header value (case-insensitive).
    pub fn from_warc_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "response" => Self::Response,
            "request" => Self::Request,
            "revisit" => Self::Revisit,
            "metadata" => Self::Metadata,
            "resource" => Self::Resource,
            "warcinfo" => Self::Warcinfo,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Response => "response",
            Self::Request => "request",
            Self::Revisit => "revisit",
            Self::Metadata => "metadata",
            Self::Resource => "resource",
            Self::Warcinfo => "warcinfo",
            Self::ArcHeader => "arc_header",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boxed buffered reader positioned somewhere inside a record.
pub type RecordReader = Box<dyn BufRead + Send + 'static>;

/// A record materialized from an ARC or WARC container.
///
/// `stream` yields the payload that follows `status_headers` and can never
/// read past the record's declared length. Dropping the record closes the
/// underlying container handle.
pub struct ArchiveRecord {
    pub format: ContainerFormat,
    pub record_type: RecordType,
    /// Container headers: WARC named headers, or the five positional ARC fields.
    pub headers: StatusAndHeaders,
    /// Embedded HTTP status and headers, synthesized for non-HTTP records.
    pub status_headers: StatusAndHeaders,
    pub stream: Take<RecordReader>,
}

impl ArchiveRecord {
    /// Bytes of payload not yet read.
    pub fn remaining(&self) -> u64 {
        self.stream.limit()
    }

    /// Read the rest of the payload into memory.
    ///
    /// Blocking; call it from [`spawn_blocking`](tokio::task::spawn_blocking)
    /// in async contexts.
    pub fn read_payload(&mut self) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(self.remaining().min(1 << 20) as usize);
        self.stream.read_to_end(&mut payload).or_raise(|| ErrorKind::Io)?;
        Ok(payload)
    }
}

impl fmt::Debug for ArchiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveRecord")
            .field("format", &self.format)
            .field("record_type", &self.record_type)
            .field("headers", &self.headers)
            .field("status_headers", &self.status_headers)
            .field("remaining", &self.remaining())
            .finish()
    }
}
