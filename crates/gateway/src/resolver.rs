use crate::cdx::CdxLine;
use crate::error::{ErrorKind, Result};
use crate::upstream::{CdxSource, ResourceResolver};
use async_trait::async_trait;
use exn::ResultExt;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use rewind_request::CanonicalRequest;
use rewind_warc::{ArchiveRecord, RecordLoader};
use std::sync::Arc;

/// Characters escaped in a query parameter value.
pub(crate) const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>');

/// Resolves captures through the CDX index, then loads them from storage.
///
/// Index filenames are relative to `<coll>/<archive_dir>/`, unless they are
/// absolute `http(s)` URLs.
pub struct IndexResolver {
    cdx: Arc<dyn CdxSource>,
    loader: RecordLoader,
    archive_dir: String,
}

impl IndexResolver {
    pub fn new(cdx: Arc<dyn CdxSource>, loader: RecordLoader, archive_dir: impl Into<String>) -> Self {
        Self {
            cdx,
            loader,
            archive_dir: archive_dir.into(),
        }
    }

    fn query(lookup_url: &str, closest: Option<&str>) -> String {
        let mut query = format!("url={}&limit=1", utf8_percent_encode(lookup_url, QUERY_VALUE));
        if let Some(closest) = closest {
            query.push_str("&closest=");
            query.push_str(closest);
        }
        query
    }

    fn location(&self, coll: &str, filename: &str) -> String {
        match filename.starts_with("http://") || filename.starts_with("https://") {
            true => filename.to_string(),
            false => format!("{coll}/{}/{filename}", self.archive_dir),
        }
    }
}

#[async_trait]
impl ResourceResolver for IndexResolver {
    #[tracing::instrument(level = "debug", skip(self, request), fields(method = request.method()))]
    async fn resolve(
        &self,
        coll: &str,
        lookup_url: &str,
        closest: Option<&str>,
        request: &CanonicalRequest,
    ) -> Result<ArchiveRecord> {
        let response = self.cdx.query(coll, Some(&Self::query(lookup_url, closest))).await?;
        match response.status {
            200..=299 => {},
            404 => exn::bail!(ErrorKind::NotFound(lookup_url.to_string())),
            status => exn::bail!(ErrorKind::Upstream {
                status,
                message: String::from_utf8_lossy(&response.body).trim().to_string(),
            }),
        }
        let body = String::from_utf8_lossy(&response.body);
        let Some(line) = body.lines().map(str::trim).find(|line| !line.is_empty()) else {
            exn::bail!(ErrorKind::NotFound(lookup_url.to_string()));
        };
        let capture = CdxLine::parse(line)?;
        let location = self.location(coll, &capture.filename);
        tracing::debug!(%location, offset = capture.offset, timestamp = %capture.timestamp, "capture found");
        self.loader
            .load(&location, capture.offset, capture.length)
            .await
            .or_raise(|| ErrorKind::ArchiveLoadFailed(location.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::CdxResponse;
    use bytes::Bytes;
    use rewind_compress::Compression;
    use rewind_request::{IncomingRequest, InputRequest};
    use rewind_storage::RemoteSource;
    use rewind_storage::backend::MockBackend;
    use rewind_warc::{RecordType, WarcRecordBuilder};
    use rstest::rstest;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeIndex {
        status: u16,
        body: String,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CdxSource for FakeIndex {
        async fn query(&self, coll: &str, query: Option<&str>) -> Result<CdxResponse> {
            self.queries.lock().unwrap().push(format!("{coll}?{}", query.unwrap_or_default()));
            Ok(CdxResponse {
                status: self.status,
                content_type: Some("text/plain".to_string()),
                body: Bytes::from(self.body.clone()),
            })
        }
    }

    fn resolver(status: u16, body: impl Into<String>, storage: MockBackend) -> (Arc<FakeIndex>, IndexResolver) {
        let index = Arc::new(FakeIndex {
            status,
            body: body.into(),
            queries: Mutex::new(Vec::new()),
        });
        let loader = RecordLoader::new(Arc::new(storage), RemoteSource::new(Duration::from_secs(1)).unwrap());
        (index.clone(), IndexResolver::new(index, loader, "archive"))
    }

    fn request() -> CanonicalRequest {
        let incoming = IncomingRequest::new("GET", "/my-coll/http://example.com/");
        InputRequest::direct(&incoming).canonicalize("http://example.com/")
    }

    #[test]
    fn test_query() {
        assert_eq!(
            IndexResolver::query("http://example.com/?a=1&b=2", Some("2020")),
            "url=http://example.com/?a=1%26b=2&limit=1&closest=2020"
        );
        assert_eq!(IndexResolver::query("http://example.com/", None), "url=http://example.com/&limit=1");
    }

    #[tokio::test]
    async fn test_resolve_loads_record() {
        let record = WarcRecordBuilder::new(RecordType::Response)
            .target_uri("http://example.com/")
            .content_type("application/http; msgtype=response")
            .block("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello")
            .encode(Compression::Gzip)
            .unwrap();
        let line = format!(
            r#"com,example)/ 20200101000000 {{"url": "http://example.com/", "length": "{}", "offset": "0", "filename": "a.warc.gz"}}"#,
            record.len()
        );
        let storage = MockBackend::with_files([("my-coll/archive/a.warc.gz", record)]);
        let (index, resolver) = resolver(200, line, storage);

        let mut record = resolver.resolve("my-coll", "http://example.com/", Some("2020"), &request()).await.unwrap();
        assert_eq!(record.record_type, RecordType::Response);
        assert_eq!(record.status_headers.status_code(), Some(200));
        assert_eq!(record.read_payload().unwrap(), b"hello");
        assert_eq!(
            index.queries.lock().unwrap().as_slice(),
            ["my-coll?url=http://example.com/&limit=1&closest=2020"]
        );
    }

    #[rstest]
    #[case(200, "")]
    #[case(200, "\n\n")]
    #[case(404, "not found")]
    #[tokio::test]
    async fn test_not_found(#[case] status: u16, #[case] body: &str) {
        let (_, resolver) = resolver(status, body, MockBackend::default());
        let err = resolver.resolve("my-coll", "http://example.com/", None, &request()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_index_failure() {
        let (_, resolver) = resolver(500, "boom\n", MockBackend::default());
        let err = resolver.resolve("my-coll", "http://example.com/", None, &request()).await.unwrap_err();
        assert_eq!(
            &*err,
            &ErrorKind::Upstream {
                status: 500,
                message: "boom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_container() {
        let line = "com,example)/ 2020 http://example.com/ text/html 200 - - - 10 0 missing.warc.gz\n";
        let (_, resolver) = resolver(200, line, MockBackend::default());
        let err = resolver.resolve("my-coll", "http://example.com/", None, &request()).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::ArchiveLoadFailed("my-coll/archive/missing.warc.gz".to_string()));
    }

    #[test]
    fn test_location() {
        let (_, resolver) = resolver(200, "", MockBackend::default());
        assert_eq!(resolver.location("c", "a.warc.gz"), "c/archive/a.warc.gz");
        assert_eq!(resolver.location("c", "https://host/a.warc.gz"), "https://host/a.warc.gz");
    }
}
