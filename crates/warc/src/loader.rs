//! Record loading.
//!
//! A record is located by `(container, offset, length)`. The range is read,
//! decompressed when it starts with gzip magic, and parsed in two stages:
//! detect the container grammar, then classify the record and synthesize or
//! parse its HTTP status.

use crate::error::{ErrorKind, Result};
use crate::headers::{ArcHeadersParser, HTTP_PROTOCOLS, StatusAndHeaders, StatusAndHeadersParser, WARC_PROTOCOLS};
use crate::record::{ArchiveRecord, ContainerFormat, RecordReader, RecordType};
use exn::ResultExt;
use rewind_compress::Compression;
use rewind_storage::{BackendHandle, BoxSyncRead, RemoteSource};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::instrument;

/// Read buffer size used when none is configured.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

const NO_CONTENT: &str = "204 No Content";
const OK: &str = "200 OK";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Loads records from local containers (through a storage backend) or
/// remote ones (over HTTP).
#[derive(Clone)]
pub struct RecordLoader {
    storage: BackendHandle,
    remote: RemoteSource,
    block_size: usize,
}

impl RecordLoader {
    pub fn new(storage: BackendHandle, remote: RemoteSource) -> Self {
        Self {
            storage,
            remote,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    fn is_remote(location: &str) -> bool {
        location.starts_with("http://") || location.starts_with("https://")
    }

    async fn open_range(
        &self,
        location: &str,
        offset: u64,
        length: Option<u64>,
    ) -> rewind_storage::error::Result<BoxSyncRead> {
        match Self::is_remote(location) {
            true => self.remote.read_range(location, offset, length).await,
            false => self.storage.read_range(Path::new(location), offset, length).await,
        }
    }

    /// Load the record stored at `offset` in `location`.
    ///
    /// `length` bounds the raw (possibly compressed) range; `None` reads to
    /// the end of the container, stopping at the end of the first gzip
    /// member for compressed containers.
    ///
    /// # Errors
    /// Every failure, from opening the range to parsing the embedded HTTP
    /// headers, is reported as [`ArchiveLoadFailed`](ErrorKind::ArchiveLoadFailed)
    /// with the underlying error as its child.
    #[instrument(level = "debug", skip(self), fields(backend = self.storage.name()))]
    pub async fn load(&self, location: &str, offset: u64, length: Option<u64>) -> Result<ArchiveRecord> {
        let failed = || ErrorKind::ArchiveLoadFailed(location.to_string());
        let raw = self.open_range(location, offset, length).await.or_raise(failed)?;
        let block_size = self.block_size;
        let record = tokio::task::spawn_blocking(move || -> Result<ArchiveRecord> {
            let (compression, reader) = Compression::sniff_reader(raw).or_raise(|| ErrorKind::Io)?;
            tracing::trace!(%compression, "opened record range");
            parse_record_stream(Box::new(BufReader::with_capacity(block_size, reader)))
        })
        .await
        .or_raise(failed)?
        .or_raise(failed)?;
        tracing::debug!(
            format = %record.format,
            record_type = %record.record_type,
            remaining = record.remaining(),
            "loaded record"
        );
        Ok(record)
    }
}

/// Parse a record from an already-open, decompressed stream positioned at
/// the start of the record.
pub fn parse_record_stream(mut reader: RecordReader) -> Result<ArchiveRecord> {
    let (format, headers) = detect_format(&mut reader)?;
    let (record_type, length) = classify(format, &headers)?;
    let status_headers = payload_status(&record_type, length, &headers, &mut reader)?;
    let remaining = length.saturating_sub(status_headers.total_len);
    Ok(ArchiveRecord {
        format,
        record_type,
        headers,
        status_headers,
        stream: reader.take(remaining),
    })
}

/// Try the WARC grammar, then ARC on the line WARC rejected.
fn detect_format(reader: &mut RecordReader) -> Result<(ContainerFormat, StatusAndHeaders)> {
    let err = match StatusAndHeadersParser::new(WARC_PROTOCOLS).parse(reader, None) {
        Ok(headers) => return Ok((ContainerFormat::Warc, headers)),
        Err(err) => err,
    };
    let ErrorKind::ProtocolMismatch(first_line) = &*err else {
        return Err(err);
    };
    let first_line = first_line.clone();
    let headers = ArcHeadersParser
        .parse(reader, Some(first_line.clone()))
        .or_raise(|| ErrorKind::UnknownFormat(first_line))?;
    Ok((ContainerFormat::Arc, headers))
}

fn parse_length(value: Option<&str>) -> Result<u64> {
    let value = value.unwrap_or_default().trim();
    value.parse::<u64>().or_raise(|| ErrorKind::InvalidLength(value.to_string()))
}

/// Record type and declared length (bytes following the container headers).
fn classify(format: ContainerFormat, headers: &StatusAndHeaders) -> Result<(RecordType, u64)> {
    match format {
        ContainerFormat::Arc => match headers.get("uri").unwrap_or_default().starts_with("filedesc://") {
            true => Ok((RecordType::ArcHeader, 0)),
            false => Ok((RecordType::Response, parse_length(headers.get("length"))?)),
        },
        ContainerFormat::Warc => {
            let record_type = RecordType::from_warc_type(headers.get("WARC-Type").unwrap_or_default());
            Ok((record_type, parse_length(headers.get("Content-Length"))?))
        },
    }
}

fn no_content() -> StatusAndHeaders {
    StatusAndHeaders::new(HTTP_PROTOCOLS[0], NO_CONTENT, Vec::new())
}

fn payload_status(
    record_type: &RecordType,
    length: u64,
    headers: &StatusAndHeaders,
    reader: &mut RecordReader,
) -> Result<StatusAndHeaders> {
    if length == 0 {
        return Ok(no_content());
    }
    match record_type {
        RecordType::Metadata | RecordType::Resource => {
            let content_type = headers.get("Content-Type").unwrap_or(FALLBACK_CONTENT_TYPE);
            Ok(StatusAndHeaders::new(
                HTTP_PROTOCOLS[0],
                OK,
                vec![("Content-Type".to_string(), content_type.to_string())],
            ))
        },
        RecordType::Warcinfo | RecordType::ArcHeader | RecordType::Request => Ok(no_content()),
        RecordType::Response | RecordType::Revisit | RecordType::Other(_) => {
            StatusAndHeadersParser::new(HTTP_PROTOCOLS).parse(reader, None)
        },
    }
}
