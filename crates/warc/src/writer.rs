//! WARC record writing.
//!
//! Every record is serialized as its own gzip member so it can later be read
//! back by `(container, offset, length)` alone.

use crate::error::{ErrorKind, Result};
use crate::headers::StatusAndHeaders;
use crate::record::RecordType;
use exn::ResultExt;
use parking_lot::Mutex;
use rewind_compress::Compression;
use rewind_storage::BackendHandle;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use time::UtcDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use uuid::Uuid;

/// Version written on the first line of every record.
pub const WARC_VERSION: &str = "WARC/1.0";

const WARC_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
const FILENAME_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// Format a date the way `WARC-Date` expects it (second precision, UTC).
pub fn warc_date(date: UtcDateTime) -> Result<String> {
    date.format(WARC_DATE).or_raise(|| ErrorKind::Encode)
}

/// Builds a single WARC record.
///
/// `WARC-Type`, `WARC-Record-ID`, `WARC-Date` and `Content-Length` are always
/// written; the record id is a fresh `urn:uuid`.
#[derive(Debug, Clone)]
pub struct WarcRecordBuilder {
    record_type: RecordType,
    record_id: String,
    date: UtcDateTime,
    headers: Vec<(String, String)>,
    block: Vec<u8>,
}

impl WarcRecordBuilder {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            record_id: format!("<urn:uuid:{}>", Uuid::new_v4()),
            date: UtcDateTime::now(),
            headers: Vec::new(),
            block: Vec::new(),
        }
    }

    pub fn date(mut self, date: UtcDateTime) -> Self {
        self.date = date;
        self
    }

    pub fn target_uri(self, uri: impl Into<String>) -> Self {
        self.header("WARC-Target-URI", uri)
    }

    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header("Content-Type", content_type)
    }

    /// Link this record to another one written alongside it (the request
    /// that produced a response, for instance).
    pub fn concurrent_to(self, record_id: impl Into<String>) -> Self {
        self.header("WARC-Concurrent-To", record_id)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn block(mut self, block: impl Into<Vec<u8>>) -> Self {
        self.block = block.into();
        self
    }

    /// `WARC-Record-ID` value, angle brackets included.
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// The WARC header block this record will be written with.
    pub fn warc_headers(&self) -> Result<StatusAndHeaders> {
        let mut headers = vec![
            ("WARC-Type".to_string(), self.record_type.to_string()),
            ("WARC-Record-ID".to_string(), self.record_id.clone()),
            ("WARC-Date".to_string(), warc_date(self.date)?),
        ];
        headers.extend(self.headers.iter().cloned());
        headers.push(("Content-Length".to_string(), self.block.len().to_string()));
        Ok(StatusAndHeaders::new(WARC_VERSION, "", headers))
    }

    /// Serialize the record (headers, block, `CRLF CRLF` separator) and
    /// compress it as one member.
    pub fn encode(&self, compression: Compression) -> Result<Vec<u8>> {
        let mut raw = self.warc_headers()?.to_bytes();
        raw.extend_from_slice(&self.block);
        raw.extend_from_slice(b"\r\n\r\n");
        compression.compress(&raw).or_raise(|| ErrorKind::Encode)
    }
}

/// When to start a new container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverSettings {
    /// Start a new container once this many bytes would be exceeded.
    pub max_size: u64,
    /// Start a new container when the current one has not been written to
    /// for this long.
    pub max_idle: Duration,
    pub filename_prefix: String,
}

impl Default for RolloverSettings {
    fn default() -> Self {
        Self {
            max_size: 1_000_000_000,
            max_idle: Duration::from_secs(600),
            filename_prefix: "rec".to_string(),
        }
    }
}

/// Where a record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    /// Container path relative to the collections root.
    pub path: PathBuf,
    pub offset: u64,
    pub length: u64,
}

struct OpenContainer {
    path: PathBuf,
    reserved: u64,
    last_write: Instant,
}

struct Reservation {
    path: PathBuf,
    offset: u64,
    /// Set when the reservation opened a new container.
    warcinfo: Option<Vec<u8>>,
}

/// Appends gzip-member records to per-collection containers under
/// `<coll>/<archive_dir>/`, rolling over to a new container by size or idle
/// time.
///
/// Space is reserved under a short-lived lock; the writes themselves happen
/// outside it at the reserved offsets.
pub struct MultiFileWarcWriter {
    storage: BackendHandle,
    archive_dir: String,
    settings: RolloverSettings,
    open: Mutex<HashMap<String, OpenContainer>>,
}

impl MultiFileWarcWriter {
    pub fn new(storage: BackendHandle, archive_dir: impl Into<String>, settings: RolloverSettings) -> Self {
        Self {
            storage,
            archive_dir: archive_dir.into(),
            settings,
            open: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &RolloverSettings {
        &self.settings
    }

    fn new_container_path(&self, coll: &str) -> Result<PathBuf> {
        let timestamp = UtcDateTime::now().format(FILENAME_TIMESTAMP).or_raise(|| ErrorKind::Encode)?;
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("{}-{timestamp}-{}.warc.gz", self.settings.filename_prefix, &suffix[..8]);
        Ok([coll, self.archive_dir.as_str(), name.as_str()].iter().collect())
    }

    fn warcinfo(path: &Path) -> Result<Vec<u8>> {
        let filename = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        let fields = format!("software: rewind/{}\r\nformat: WARC File Format 1.0\r\n", env!("CARGO_PKG_VERSION"));
        WarcRecordBuilder::new(RecordType::Warcinfo)
            .header("WARC-Filename", filename)
            .content_type("application/warc-fields")
            .block(fields)
            .encode(Compression::Gzip)
    }

    fn needs_rollover(&self, container: &OpenContainer, len: u64) -> bool {
        let too_big = container.reserved > 0 && container.reserved + len > self.settings.max_size;
        too_big || container.last_write.elapsed() >= self.settings.max_idle
    }

    fn reserve(&self, coll: &str, len: u64) -> Result<Reservation> {
        let mut open = self.open.lock();
        let mut warcinfo = None;
        let rollover = open.get(coll).is_none_or(|container| self.needs_rollover(container, len));
        if rollover {
            let path = self.new_container_path(coll)?;
            let info = Self::warcinfo(&path)?;
            tracing::info!(coll, path = %path.display(), "starting new container");
            let reserved = info.len() as u64;
            warcinfo = Some(info);
            open.insert(coll.to_string(), OpenContainer { path, reserved, last_write: Instant::now() });
        }
        let Some(container) = open.get_mut(coll) else {
            exn::bail!(ErrorKind::WriteFailed(coll.to_string()));
        };
        let offset = container.reserved;
        container.reserved += len;
        container.last_write = Instant::now();
        Ok(Reservation {
            path: container.path.clone(),
            offset,
            warcinfo,
        })
    }

    /// Forget the current container of `coll` if it is still `path`. Its
    /// reserved span may now hold a gap, so nothing more is appended to it.
    fn abandon(&self, coll: &str, path: &Path) {
        let mut open = self.open.lock();
        if open.get(coll).is_some_and(|container| container.path == path) {
            tracing::warn!(coll, path = %path.display(), "abandoning container after failed write");
            open.remove(coll);
        }
    }

    async fn write_reserved(&self, reservation: &Reservation, records: &[Vec<u8>]) -> Result<Vec<WrittenRecord>> {
        let failed = || ErrorKind::WriteFailed(reservation.path.display().to_string());
        if let Some(warcinfo) = &reservation.warcinfo {
            self.storage.write_at(&reservation.path, 0, warcinfo).await.or_raise(failed)?;
        }
        let mut offset = reservation.offset;
        let mut written = Vec::with_capacity(records.len());
        for record in records {
            self.storage.write_at(&reservation.path, offset, record).await.or_raise(failed)?;
            written.push(WrittenRecord {
                path: reservation.path.clone(),
                offset,
                length: record.len() as u64,
            });
            offset += record.len() as u64;
        }
        Ok(written)
    }

    /// Write already-encoded records, in order, to the current container of
    /// `coll`.
    ///
    /// A failed write retires the container; the next call starts a new one.
    #[tracing::instrument(level = "debug", skip(self, records), fields(count = records.len()))]
    pub async fn write_records(&self, coll: &str, records: &[Vec<u8>]) -> Result<Vec<WrittenRecord>> {
        let total: u64 = records.iter().map(|record| record.len() as u64).sum();
        let reservation = self.reserve(coll, total)?;
        let result = self.write_reserved(&reservation, records).await;
        if result.is_err() {
            self.abandon(coll, &reservation.path);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::RecordLoader;
    use crate::record::ContainerFormat;
    use async_trait::async_trait;
    use rewind_storage::backend::{MockBackend, StorageBackend};
    use rewind_storage::error::ErrorKind as StorageErrorKind;
    use rewind_storage::{BoxSyncRead, RemoteSource};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use time::macros::datetime;

    fn writer(settings: RolloverSettings) -> (BackendHandle, MultiFileWarcWriter) {
        let storage: BackendHandle = Arc::new(MockBackend::default());
        (storage.clone(), MultiFileWarcWriter::new(storage, "archive", settings))
    }

    #[test]
    fn test_warc_date() {
        let date = datetime!(2014-01-27 17:12:51.123 UTC).to_utc();
        assert_eq!(warc_date(date).unwrap(), "2014-01-27T17:12:51Z");
    }

    #[test]
    fn test_builder_headers() {
        let builder = WarcRecordBuilder::new(RecordType::Response)
            .target_uri("http://example.com/")
            .content_type("application/http; msgtype=response")
            .block(b"HTTP/1.0 200 OK\r\n\r\n".to_vec());
        let headers = builder.warc_headers().unwrap();
        assert_eq!(headers.status_line(), "WARC/1.0");
        assert_eq!(headers.get("WARC-Type"), Some("response"));
        assert_eq!(headers.get("WARC-Record-ID"), Some(builder.record_id()));
        assert!(builder.record_id().starts_with("<urn:uuid:"));
        assert_eq!(headers.get("Content-Length"), Some("19"));
        assert_eq!(headers.headers.last().map(|(name, _)| name.as_str()), Some("Content-Length"));
    }

    #[tokio::test]
    async fn test_written_records_load_back() {
        let (storage, writer) = writer(RolloverSettings::default());
        let request = WarcRecordBuilder::new(RecordType::Request)
            .target_uri("http://example.com/")
            .block(b"GET / HTTP/1.0\r\nHost: example.com\r\n\r\n".to_vec());
        let response = WarcRecordBuilder::new(RecordType::Response)
            .target_uri("http://example.com/")
            .concurrent_to(request.record_id())
            .block(b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\nhi".to_vec());
        let encoded = vec![
            request.encode(Compression::Gzip).unwrap(),
            response.encode(Compression::Gzip).unwrap(),
        ];

        let written = writer.write_records("my-coll", &encoded).await.unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].path.starts_with("my-coll/archive"));
        assert_eq!(written[1].offset, written[0].offset + written[0].length);

        let loader = RecordLoader::new(storage, RemoteSource::new(Duration::from_secs(1)).unwrap());
        let location = written[1].path.to_string_lossy().into_owned();
        let mut record = loader.load(&location, written[1].offset, Some(written[1].length)).await.unwrap();
        assert_eq!(record.format, ContainerFormat::Warc);
        assert_eq!(record.record_type, RecordType::Response);
        assert_eq!(record.headers.get("WARC-Concurrent-To"), Some(request.record_id()));
        assert_eq!(record.read_payload().unwrap(), b"hi");

        // The container opens with a warcinfo record.
        let mut info = loader.load(&location, 0, Some(written[0].offset)).await.unwrap();
        assert_eq!(info.record_type, RecordType::Warcinfo);
        assert_eq!(info.status_headers.status_code(), Some(204));
        assert!(info.read_payload().unwrap().starts_with(b"software: rewind/"));
    }

    #[tokio::test]
    async fn test_rollover_by_size() {
        let (_, writer) = writer(RolloverSettings {
            max_size: 1,
            ..RolloverSettings::default()
        });
        let first = writer.write_records("coll", &[vec![1u8; 10]]).await.unwrap();
        let second = writer.write_records("coll", &[vec![2u8; 10]]).await.unwrap();
        assert_ne!(first[0].path, second[0].path);
    }

    #[tokio::test]
    async fn test_same_container_until_full() {
        let (_, writer) = writer(RolloverSettings::default());
        let first = writer.write_records("coll", &[vec![1u8; 10]]).await.unwrap();
        let second = writer.write_records("coll", &[vec![2u8; 10]]).await.unwrap();
        assert_eq!(first[0].path, second[0].path);
        assert_eq!(second[0].offset, first[0].offset + 10);
        let other = writer.write_records("other", &[vec![3u8; 10]]).await.unwrap();
        assert!(other[0].path.starts_with("other/archive"));
    }

    /// Delegates to [`MockBackend`], failing every `write_at` while `fail`
    /// is set.
    struct FlakyBackend {
        inner: MockBackend,
        fail: AtomicBool,
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn read(&self, path: &Path) -> rewind_storage::error::Result<Vec<u8>> {
            self.inner.read(path).await
        }

        async fn read_range(
            &self,
            path: &Path,
            offset: u64,
            length: Option<u64>,
        ) -> rewind_storage::error::Result<BoxSyncRead> {
            self.inner.read_range(path, offset, length).await
        }

        async fn write(&self, path: &Path, data: &[u8]) -> rewind_storage::error::Result<()> {
            self.inner.write(path, data).await
        }

        async fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> rewind_storage::error::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                exn::bail!(StorageErrorKind::BackendError("disk full".to_string()));
            }
            self.inner.write_at(path, offset, data).await
        }

        async fn list_dirs(&self, prefix: Option<&Path>) -> rewind_storage::error::Result<Vec<PathBuf>> {
            self.inner.list_dirs(prefix).await
        }
    }

    fn flaky_writer(fail: bool) -> (Arc<FlakyBackend>, MultiFileWarcWriter) {
        let storage = Arc::new(FlakyBackend {
            inner: MockBackend::default(),
            fail: AtomicBool::new(fail),
        });
        let writer = MultiFileWarcWriter::new(storage.clone(), "archive", RolloverSettings::default());
        (storage, writer)
    }

    fn response_record(body: &str) -> Vec<u8> {
        WarcRecordBuilder::new(RecordType::Response)
            .target_uri("http://example.com/")
            .block(format!("HTTP/1.0 200 OK\r\n\r\n{body}"))
            .encode(Compression::Gzip)
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_record_write_retires_container() {
        let (storage, writer) = flaky_writer(false);
        let first = writer.write_records("coll", &[response_record("one")]).await.unwrap();

        storage.fail.store(true, Ordering::SeqCst);
        assert!(writer.write_records("coll", &[response_record("lost")]).await.is_err());
        storage.fail.store(false, Ordering::SeqCst);

        let next = writer.write_records("coll", &[response_record("two")]).await.unwrap();
        assert_ne!(next[0].path, first[0].path);
        // Nothing was reserved past the first record of the old container.
        let old = storage.inner.read(&first[0].path).await.unwrap();
        assert_eq!(old.len() as u64, first[0].offset + first[0].length);

        let loader = RecordLoader::new(storage, RemoteSource::new(Duration::from_secs(1)).unwrap());
        let location = next[0].path.to_string_lossy().into_owned();
        let info = loader.load(&location, 0, Some(next[0].offset)).await.unwrap();
        assert_eq!(info.record_type, RecordType::Warcinfo);
        let mut record = loader.load(&location, next[0].offset, Some(next[0].length)).await.unwrap();
        assert_eq!(record.read_payload().unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_failed_warcinfo_write_retires_container() {
        let (storage, writer) = flaky_writer(true);
        assert!(writer.write_records("coll", &[response_record("lost")]).await.is_err());
        storage.fail.store(false, Ordering::SeqCst);

        let written = writer.write_records("coll", &[response_record("kept")]).await.unwrap();
        let loader = RecordLoader::new(storage, RemoteSource::new(Duration::from_secs(1)).unwrap());
        let location = written[0].path.to_string_lossy().into_owned();
        let info = loader.load(&location, 0, Some(written[0].offset)).await.unwrap();
        assert_eq!(info.record_type, RecordType::Warcinfo);
    }
}
