//! Live capture into WARC containers.

use crate::error::{ErrorKind, Result};
use crate::response::is_hop_by_hop;
use crate::upstream::Recorder;
use async_trait::async_trait;
use bytes::Bytes;
use exn::{OptionExt, ResultExt};
use http::{StatusCode, Version};
use rewind_compress::Compression;
use rewind_request::CanonicalRequest;
use rewind_warc::{ArchiveRecord, MultiFileWarcWriter, RecordLoader, RecordType, WarcRecordBuilder, WrittenRecord};
use std::time::Duration;
use time::UtcDateTime;
use url::Url;

const RESPONSE_CONTENT_TYPE: &str = "application/http; msgtype=response";
const REQUEST_CONTENT_TYPE: &str = "application/http; msgtype=request";

/// A live response as fetched, before it is written anywhere.
#[derive(Debug, Clone)]
pub struct LiveResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl LiveResponse {
    /// Raw HTTP response bytes as stored in a `response` record.
    ///
    /// HTTP/2 and later are written as `HTTP/1.1`. The body has already lost
    /// its transfer framing, so hop-by-hop headers are dropped and
    /// `Content-Length` is rewritten to the stored length.
    pub fn to_http_block(&self) -> Vec<u8> {
        let protocol = match self.version {
            Version::HTTP_09 | Version::HTTP_10 => "HTTP/1.0",
            _ => "HTTP/1.1",
        };
        let mut block = format!("{protocol} {}\r\n", self.status).into_bytes();
        let end_to_end = self
            .headers
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name) && !name.eq_ignore_ascii_case("Content-Length"));
        for (name, value) in end_to_end {
            block.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        block.extend_from_slice(format!("content-length: {}\r\n\r\n", self.body.len()).as_bytes());
        block.extend_from_slice(&self.body);
        block
    }
}

/// Fetches requests live with `reqwest`, stores each exchange as a
/// `response` + `request` record pair, and replays the stored response.
pub struct WarcRecorder {
    client: reqwest::Client,
    writer: MultiFileWarcWriter,
    loader: RecordLoader,
}

impl WarcRecorder {
    /// `loader` must read from the same storage `writer` writes to.
    pub fn new(writer: MultiFileWarcWriter, loader: RecordLoader, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .or_raise(|| ErrorKind::Internal)?;
        Ok(Self { client, writer, loader })
    }

    pub fn writer(&self) -> &MultiFileWarcWriter {
        &self.writer
    }

    async fn fetch(&self, target: &Url, request: &CanonicalRequest) -> Result<LiveResponse> {
        let failed = || ErrorKind::Upstream {
            status: 502,
            message: format!("Live fetch failed: {target}"),
        };
        let method = reqwest::Method::from_bytes(request.method().as_bytes()).or_raise(|| ErrorKind::Upstream {
            status: 400,
            message: format!("Unsupported method: {}", request.method()),
        })?;
        let mut builder = self.client.request(method, target.clone());
        for (name, value) in request.headers() {
            let skip = is_hop_by_hop(name)
                || name.eq_ignore_ascii_case("Host")
                || name.eq_ignore_ascii_case("Content-Length");
            if !skip {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }
        let response = builder.send().await.or_raise(failed)?;
        let status = response.status();
        let version = response.version();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let body = response.bytes().await.or_raise(failed)?;
        tracing::debug!(%status, bytes = body.len(), "fetched live");
        Ok(LiveResponse {
            status,
            version,
            headers,
            body,
        })
    }

    /// Write the exchange to `coll`: the response record, then the request
    /// record pointing back at it.
    pub async fn store(
        &self,
        coll: &str,
        request: &CanonicalRequest,
        live: &LiveResponse,
    ) -> Result<Vec<WrittenRecord>> {
        let target = request.target_url();
        let date = UtcDateTime::now();
        let response = WarcRecordBuilder::new(RecordType::Response)
            .date(date)
            .target_uri(target)
            .content_type(RESPONSE_CONTENT_TYPE)
            .block(live.to_http_block());
        let request_record = WarcRecordBuilder::new(RecordType::Request)
            .date(date)
            .target_uri(target)
            .content_type(REQUEST_CONTENT_TYPE)
            .concurrent_to(response.record_id())
            .block(request.to_bytes());
        let encoded = [
            response.encode(Compression::Gzip).or_raise(|| ErrorKind::Internal)?,
            request_record.encode(Compression::Gzip).or_raise(|| ErrorKind::Internal)?,
        ];
        let written = self
            .writer
            .write_records(coll, &encoded)
            .await
            .or_raise(|| ErrorKind::ArchiveLoadFailed(coll.to_string()))?;
        Ok(written)
    }

    /// Store the exchange and load the response record back for replay.
    pub async fn persist(&self, coll: &str, request: &CanonicalRequest, live: &LiveResponse) -> Result<ArchiveRecord> {
        let written = self.store(coll, request, live).await?;
        let stored = written.first().ok_or_raise(|| ErrorKind::Internal)?;
        let location = stored.path.to_string_lossy().into_owned();
        tracing::info!(coll, %location, offset = stored.offset, url = request.target_url(), "recorded");
        self.loader
            .load(&location, stored.offset, Some(stored.length))
            .await
            .or_raise(|| ErrorKind::ArchiveLoadFailed(location.clone()))
    }
}

/// `path?query` of a URL, for the request line of a stored request.
fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

#[async_trait]
impl Recorder for WarcRecorder {
    #[tracing::instrument(level = "debug", skip(self, request), fields(url = request.target_url()))]
    async fn record(&self, coll: &str, request: &CanonicalRequest) -> Result<ArchiveRecord> {
        let target = Url::parse(request.target_url()).or_raise(|| ErrorKind::Upstream {
            status: 400,
            message: format!("Invalid URL: {}", request.target_url()),
        })?;
        let request = request.with_request_uri(path_and_query(&target));
        let live = self.fetch(&target, &request).await?;
        self.persist(coll, &request, &live).await
    }
}
