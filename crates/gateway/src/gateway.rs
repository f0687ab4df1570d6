//! Request dispatch.
//!
//! [`Gateway::handle`] never fails: every route either produces a response or
//! an error that is rendered through [`Views::error`], and a panic inside a
//! handler is caught and turned into a generic 500 page.

use crate::cdx::HttpCdxSource;
use crate::collections::Collections;
use crate::error::{ErrorKind, Result};
use crate::recorder::WarcRecorder;
use crate::referer::referer_redirect;
use crate::resolver::{IndexResolver, QUERY_VALUE};
use crate::response::{self, Response};
use crate::rewriter::IdentityRewriter;
use crate::route::{ROOT_COLL, Route, Router};
use crate::upstream::{CdxSource, Recorder, ReplayContext, ResourceResolver, Rewriter, Views};
use crate::views::PlainViews;
use crate::wburl::WbUrl;
use exn::{OptionExt, ResultExt};
use futures::FutureExt;
use http::StatusCode;
use percent_encoding::utf8_percent_encode;
use rewind_config::{Config, Metadata, MetadataCache};
use rewind_request::{IncomingRequest, InputRequest};
use rewind_storage::backend::LocalBackend;
use rewind_storage::{BackendHandle, RemoteSource};
use rewind_warc::{MultiFileWarcWriter, RecordLoader, RolloverSettings};
use serde_json::{Value, json};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// The collaborators a [`Gateway`] delegates to.
#[derive(Clone)]
pub struct Upstream {
    pub resolver: Arc<dyn ResourceResolver>,
    pub rewriter: Arc<dyn Rewriter>,
    /// Recording routes only exist when this is set.
    pub recorder: Option<Arc<dyn Recorder>>,
    pub cdx: Arc<dyn CdxSource>,
    pub views: Arc<dyn Views>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Replay,
    Record,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Replay => "replay",
            Mode::Record => "record",
        }
    }
}

pub struct Gateway {
    config: Config,
    router: Router,
    collections: Collections,
    metadata: MetadataCache,
    upstream: Upstream,
}

impl Gateway {
    /// Root mode is decided once, here: it is on when a collection named
    /// [`ROOT_COLL`] exists at startup.
    pub async fn new(config: Config, storage: BackendHandle, upstream: Upstream) -> Result<Self> {
        let collections = Collections::new(config.collections.clone(), storage);
        let root_mode = collections.kind(ROOT_COLL).await?.is_some();
        let router = Router::new(root_mode, upstream.recorder.is_some());
        let metadata = MetadataCache::new(config.collections_root.clone(), config.metadata_file.clone());
        tracing::info!(root_mode, recording = upstream.recorder.is_some(), "gateway ready");
        Ok(Self {
            config,
            router,
            collections,
            metadata,
            upstream,
        })
    }

    /// Wire up the default collaborators: local containers under the
    /// collections root, an HTTP index server, and a WARC recorder when
    /// recording is configured.
    pub async fn from_config(mut config: Config) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config("validation failed".to_string()))?;
        let root_name = config.collections_root.display().to_string();
        config.collections_root =
            std::path::absolute(&config.collections_root).or_raise(|| ErrorKind::Config(root_name.clone()))?;
        let storage: BackendHandle = Arc::new(
            LocalBackend::new("collections", &config.collections_root).or_raise(|| ErrorKind::Config(root_name))?,
        );

        let timeout = config.upstream.timeout();
        let remote = RemoteSource::new(timeout).or_raise(|| ErrorKind::Config("remote containers".to_string()))?;
        let loader = RecordLoader::new(Arc::clone(&storage), remote).with_block_size(config.block_size);
        let cdx: Arc<dyn CdxSource> = Arc::new(HttpCdxSource::new(config.upstream.cdx_endpoint.clone(), timeout)?);
        let resolver = IndexResolver::new(Arc::clone(&cdx), loader.clone(), config.archive_dir.clone());

        let recorder = match &config.recorder {
            Some(settings) => {
                let settings = RolloverSettings {
                    max_size: settings.max_size,
                    max_idle: Duration::from_secs(settings.max_idle_secs),
                    filename_prefix: settings.filename_prefix.clone(),
                };
                let writer = MultiFileWarcWriter::new(Arc::clone(&storage), config.archive_dir.clone(), settings);
                let recorder: Arc<dyn Recorder> = Arc::new(WarcRecorder::new(writer, loader, timeout)?);
                Some(recorder)
            },
            None => None,
        };

        let upstream = Upstream {
            resolver: Arc::new(resolver),
            rewriter: Arc::new(IdentityRewriter),
            recorder,
            cdx,
            views: Arc::new(PlainViews),
        };
        Self::new(config, storage, upstream).await
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    #[tracing::instrument(level = "debug", skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn handle(&self, request: IncomingRequest) -> Response {
        match AssertUnwindSafe(self.dispatch(&request)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => self.error_response(&request, &err),
            Err(panic) => {
                tracing::error!(panic = panic_message(&*panic), "handler panicked");
                self.error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal Error")
            },
        }
    }

    async fn dispatch(&self, request: &IncomingRequest) -> Result<Response> {
        let route = self
            .router
            .resolve(&request.path)
            .ok_or_raise(|| ErrorKind::RouteNotFound(request.path.clone()))?;
        tracing::debug!(?route, "resolved route");
        match route {
            Route::Listing => self.serve_listing().await,
            Route::Home => self.serve_home().await,
            Route::CollectionRedirect { coll } => {
                self.ensure_valid(&coll).await?;
                response::redirect(StatusCode::MOVED_PERMANENTLY, &format!("{}/{coll}/", request.script_name))
            },
            Route::CollectionPage { coll } => self.serve_collection_page(request, &coll).await,
            Route::Cdx { coll } => {
                self.ensure_valid(&coll).await?;
                self.serve_cdx(&coll, request.query.as_deref()).await
            },
            Route::Timemap { coll, output, url } => self.serve_timemap(request, &coll, &output, &url).await,
            Route::Record { coll, url } => {
                if self.collections.is_fixed(&coll) {
                    exn::bail!(ErrorKind::RecordingRefused(coll));
                }
                self.serve_content(request, &coll, &url, Mode::Record).await
            },
            Route::Content { coll, url } => self.serve_content(request, &coll, &url, Mode::Replay).await,
        }
    }

    async fn serve_listing(&self) -> Result<Response> {
        let dynamic = self.collections.dynamic().await?;
        let listing = json!({ "fixed": self.collections.fixed(), "dynamic": dynamic });
        Ok(response::json(&listing))
    }

    async fn serve_home(&self) -> Result<Response> {
        let dynamic = self.collections.dynamic().await?;
        let all_metadata = self
            .metadata
            .get_all(dynamic.iter().map(String::as_str))
            .await
            .or_raise(|| ErrorKind::Internal)?;
        let mut colls = self.collections.fixed();
        colls.extend(dynamic);
        let page = self.upstream.views.home(&colls, &all_metadata);
        Ok(response::with_body(StatusCode::OK, Some(self.upstream.views.content_type()), page))
    }

    async fn serve_collection_page(&self, request: &IncomingRequest, coll: &str) -> Result<Response> {
        let metadata = self.metadata_for(coll, Mode::Replay).await?;
        let prefix = self.prefix(request, coll, Mode::Replay);
        let page = self.upstream.views.collection(&prefix, &metadata);
        Ok(response::with_body(StatusCode::OK, Some(self.upstream.views.content_type()), page))
    }

    async fn serve_cdx(&self, coll: &str, query: Option<&str>) -> Result<Response> {
        let upstream = self.upstream.cdx.query(coll, query).await?;
        let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
        Ok(response::with_body(status, upstream.content_type.as_deref(), upstream.body))
    }

    /// Timemaps are answered by the index server in the requested output
    /// format.
    async fn serve_timemap(&self, request: &IncomingRequest, coll: &str, output: &str, url: &str) -> Result<Response> {
        self.ensure_valid(coll).await?;
        let wb_url = WbUrl::parse(&with_query(url, request))?;
        let query = format!(
            "url={}&output={}",
            utf8_percent_encode(&wb_url.url, QUERY_VALUE),
            utf8_percent_encode(output, QUERY_VALUE)
        );
        self.serve_cdx(coll, Some(&query)).await
    }

    async fn serve_content(&self, request: &IncomingRequest, coll: &str, url: &str, mode: Mode) -> Result<Response> {
        let metadata = self.metadata_for(coll, mode).await?;
        let wb_url = WbUrl::parse(&with_query(url, request))?;
        let canonical = InputRequest::direct(request).canonicalize(&wb_url.url);

        let record = match (mode, &self.upstream.recorder) {
            (Mode::Record, Some(recorder)) => recorder.record(coll, &canonical).await?,
            (Mode::Record, None) => exn::bail!(ErrorKind::RouteNotFound(request.path.clone())),
            (Mode::Replay, _) => {
                let lookup_url = canonical.post_query().append_post_query(&wb_url.url);
                let closest = wb_url.timestamp.as_deref();
                self.upstream.resolver.resolve(coll, &lookup_url, closest, &canonical).await?
            },
        };

        let context = ReplayContext {
            coll: coll.to_string(),
            prefix: self.prefix(request, coll, mode),
            wb_url,
            metadata,
            request: canonical,
        };
        self.upstream.rewriter.rewrite(record, &context).await
    }

    async fn ensure_valid(&self, coll: &str) -> Result<()> {
        match self.collections.kind(coll).await? {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::RouteNotFound(format!("/{coll}"))),
        }
    }

    /// `{coll, type}` overlaid with the collection's own configuration or
    /// metadata file. The mode always wins over a configured `type`.
    async fn metadata_for(&self, coll: &str, mode: Mode) -> Result<Metadata> {
        let descriptor = self
            .collections
            .describe(coll, &self.metadata)
            .await?
            .ok_or_raise(|| ErrorKind::RouteNotFound(format!("/{coll}")))?;
        let mut metadata = Metadata::from([
            ("coll".to_string(), Value::from(coll)),
            ("type".to_string(), Value::from(Mode::Replay.as_str())),
        ]);
        if self.config.use_js_obj_proxy {
            metadata.insert("use_js_obj_proxy".to_string(), Value::Bool(true));
        }
        metadata.extend(descriptor.metadata.iter().map(|(key, value)| (key.clone(), value.clone())));
        if mode == Mode::Record {
            metadata.insert("type".to_string(), Value::from(mode.as_str()));
        }
        Ok(metadata)
    }

    fn prefix(&self, request: &IncomingRequest, coll: &str, mode: Mode) -> String {
        let mut prefix = format!("{}/", request.script_name);
        if !self.router.root_mode() {
            prefix.push_str(coll);
            prefix.push('/');
        }
        if mode == Mode::Record {
            prefix.push_str("record/");
        }
        prefix
    }

    fn error_response(&self, request: &IncomingRequest, err: &crate::error::Error) -> Response {
        let kind: &ErrorKind = err;
        if kind.is_not_found()
            && let Some(location) = referer_redirect(request)
        {
            match response::redirect(StatusCode::TEMPORARY_REDIRECT, &location) {
                Ok(response) => return response,
                Err(err) => tracing::debug!(error = ?err, "referer redirect not representable"),
            }
        }

        let status = kind.status_code();
        if self.config.debug {
            tracing::error!(error = ?err, %status, "request failed");
        } else if status.is_server_error() {
            tracing::warn!(error = ?kind, %status, "request failed");
        } else {
            tracing::debug!(error = %kind, %status, "request failed");
        }
        self.error_page(status, &kind.to_string())
    }

    fn error_page(&self, status: StatusCode, message: &str) -> Response {
        let page = self.upstream.views.error(status, message);
        response::with_body(status, Some(self.upstream.views.content_type()), page)
    }
}

/// Archival URLs carry the inbound query string with them.
fn with_query(url: &str, request: &IncomingRequest) -> String {
    match request.query.as_deref() {
        Some(query) if !query.is_empty() => format!("{url}?{query}"),
        _ => url.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::CdxResponse;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::header::{CONTENT_TYPE, LOCATION};
    use rewind_compress::Compression;
    use rewind_request::CanonicalRequest;
    use rewind_storage::backend::MockBackend;
    use rewind_warc::{ArchiveRecord, RecordType, WarcRecordBuilder, parse_record_stream};
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const ARCHIVED: &str = "http://example.com/";

    fn record() -> ArchiveRecord {
        let raw = WarcRecordBuilder::new(RecordType::Response)
            .target_uri(ARCHIVED)
            .block("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<p>archived</p>")
            .encode(Compression::None)
            .unwrap();
        parse_record_stream(Box::new(Cursor::new(raw))).unwrap()
    }

    #[derive(Default)]
    struct FakeResolver {
        lookups: Mutex<Vec<(String, String, Option<String>)>>,
    }

    #[async_trait]
    impl ResourceResolver for FakeResolver {
        async fn resolve(
            &self,
            coll: &str,
            lookup_url: &str,
            closest: Option<&str>,
            _request: &CanonicalRequest,
        ) -> Result<ArchiveRecord> {
            if lookup_url.contains("panic") {
                panic!("resolver exploded");
            }
            if lookup_url.contains("unreadable") {
                exn::bail!(ErrorKind::ArchiveLoadFailed(format!("{coll}/archive/unreadable.warc.gz")));
            }
            let lookup = (coll.to_string(), lookup_url.to_string(), closest.map(str::to_string));
            self.lookups.lock().unwrap().push(lookup);
            match lookup_url == ARCHIVED {
                true => Ok(record()),
                false => exn::bail!(ErrorKind::NotFound(lookup_url.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeRecorder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Recorder for FakeRecorder {
        async fn record(&self, _coll: &str, _request: &CanonicalRequest) -> Result<ArchiveRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(record())
        }
    }

    /// Echoes what the dispatcher handed over instead of the record itself.
    struct EchoRewriter;

    #[async_trait]
    impl Rewriter for EchoRewriter {
        async fn rewrite(&self, _record: ArchiveRecord, context: &ReplayContext) -> Result<Response> {
            Ok(response::json(&json!({
                "url": context.wb_url.url,
                "prefix": context.prefix,
                "metadata": context.metadata,
                "host": context.request.header("Host"),
            })))
        }
    }

    struct EchoCdx;

    #[async_trait]
    impl CdxSource for EchoCdx {
        async fn query(&self, coll: &str, query: Option<&str>) -> Result<CdxResponse> {
            Ok(CdxResponse {
                status: 200,
                content_type: Some("text/x-cdxj".to_string()),
                body: Bytes::from(format!("{coll}?{}", query.unwrap_or_default())),
            })
        }
    }

    struct Harness {
        gateway: Gateway,
        resolver: Arc<FakeResolver>,
        recorder: Arc<FakeRecorder>,
        root: TempDir,
    }

    async fn harness(dirs: &[&str], fixed: &[&str]) -> Harness {
        let root = TempDir::new().unwrap();
        let files = dirs.iter().map(|dir| (format!("{dir}/archive/a.warc.gz"), Vec::<u8>::new()));
        let storage = MockBackend::with_files(files);
        let config = Config {
            collections_root: root.path().to_path_buf(),
            collections: fixed
                .iter()
                .map(|name| (name.to_string(), Metadata::from([("title".to_string(), json!("Fixed"))])))
                .collect(),
            use_js_obj_proxy: true,
            ..Config::default()
        };
        let resolver = Arc::new(FakeResolver::default());
        let recorder = Arc::new(FakeRecorder::default());
        let upstream = Upstream {
            resolver: resolver.clone(),
            rewriter: Arc::new(EchoRewriter),
            recorder: Some(recorder.clone()),
            cdx: Arc::new(EchoCdx),
            views: Arc::new(PlainViews),
        };
        let gateway = Gateway::new(config, Arc::new(storage), upstream).await.unwrap();
        Harness {
            gateway,
            resolver,
            recorder,
            root,
        }
    }

    fn body_json(response: &Response) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    fn body_text(response: &Response) -> &str {
        std::str::from_utf8(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_listing() {
        let harness = harness(&["dyn"], &["curated"]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/collinfo.json")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(&response), json!({"fixed": ["curated"], "dynamic": ["dyn"]}));
    }

    #[tokio::test]
    async fn test_home_lists_every_collection() {
        let harness = harness(&["dyn"], &["curated"]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(&response), "Collections\n\n/curated/\n/dyn/\n");
    }

    #[tokio::test]
    async fn test_collection_redirect() {
        let harness = harness(&["dyn"], &[]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/dyn").with_script_name("/wb")).await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[LOCATION], "/wb/dyn/");

        let response = harness.gateway.handle(IncomingRequest::new("GET", "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(&response).contains("No handler for \"/nope\""));
    }

    #[tokio::test]
    async fn test_collection_page_uses_fixed_config() {
        let harness = harness(&[], &["curated"]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/curated/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(&response).starts_with("Fixed\n\n"));
        assert!(body_text(&response).contains("Search: /curated/*/<url>"));
    }

    #[tokio::test]
    async fn test_replay() {
        let harness = harness(&["dyn"], &[]).await;
        let request = IncomingRequest::new("GET", "/dyn/2020/http://example.com/");
        let response = harness.gateway.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(&response),
            json!({
                "url": ARCHIVED,
                "prefix": "/dyn/",
                "metadata": {"coll": "dyn", "type": "replay", "use_js_obj_proxy": true},
                "host": "example.com",
            })
        );
        let lookups = harness.resolver.lookups.lock().unwrap();
        assert_eq!(*lookups, [("dyn".to_string(), ARCHIVED.to_string(), Some("2020".to_string()))]);
    }

    #[tokio::test]
    async fn test_replay_merges_metadata_file() {
        let harness = harness(&["dyn"], &[]).await;
        let dir = harness.root.path().join("dyn");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("metadata.yaml"), "title: Dynamic\ntype: custom\n").unwrap();

        let response = harness.gateway.handle(IncomingRequest::new("GET", "/dyn/http://example.com/")).await;
        let metadata = &body_json(&response)["metadata"];
        assert_eq!(metadata["title"], json!("Dynamic"));
        assert_eq!(metadata["type"], json!("custom"));
    }

    #[tokio::test]
    async fn test_archival_miss() {
        let harness = harness(&["dyn"], &[]).await;
        let request = IncomingRequest::new("GET", "/dyn/http://example.com/missing").with_query("a=1");
        let response = harness.gateway.handle(request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(body_text(&response).contains("Archived URL not found: http://example.com/missing?a=1"));
    }

    #[tokio::test]
    async fn test_recording_into_fixed_collection_is_refused() {
        let harness = harness(&[], &["curated"]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/curated/record/http://example.com/")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_text(&response).contains("Can not record into fixed collection \"curated\""));
        assert_eq!(harness.recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_record() {
        let harness = harness(&["dyn"], &[]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/dyn/record/http://example.com/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(&response);
        assert_eq!(body["prefix"], json!("/dyn/record/"));
        assert_eq!(body["metadata"]["type"], json!("record"));
        assert_eq!(harness.recorder.calls.load(Ordering::SeqCst), 1);
        assert!(harness.resolver.lookups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cdx_pass_through() {
        let harness = harness(&["dyn"], &[]).await;
        let request = IncomingRequest::new("GET", "/dyn/cdx").with_query("url=example.com&output=json");
        let response = harness.gateway.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/x-cdxj");
        assert_eq!(body_text(&response), "dyn?url=example.com&output=json");
    }

    #[tokio::test]
    async fn test_timemap() {
        let harness = harness(&["dyn"], &[]).await;
        let request = IncomingRequest::new("GET", "/dyn/timemap/link/http://example.com/a b");
        let response = harness.gateway.handle(request).await;
        assert_eq!(body_text(&response), "dyn?url=http://example.com/a%20b&output=link");
    }

    #[tokio::test]
    async fn test_referer_redirect_on_escaped_request() {
        let harness = harness(&["dyn"], &[]).await;
        let request = IncomingRequest::new("GET", "/images/logo.png")
            .with_header("Host", "localhost:8080")
            .with_header("Referer", "http://localhost:8080/dyn/2020/http://example.com/page.html");
        let response = harness.gateway.handle(request).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[LOCATION],
            "http://localhost:8080/dyn/2020/http://example.com/images/logo.png"
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let harness = harness(&["dyn"], &[]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/dyn/http://example.com/panic")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(&response), "500 Internal Server Error\n\nInternal Error\n");
    }

    #[tokio::test]
    async fn test_unreadable_archive_hides_location() {
        let harness = harness(&["dyn"], &[]).await;
        let response = harness.gateway.handle(IncomingRequest::new("GET", "/dyn/http://example.com/unreadable")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(&response), "503 Service Unavailable\n\nArchive unavailable\n");
    }

    #[tokio::test]
    async fn test_root_mode() {
        let harness = harness(&[], &[ROOT_COLL]).await;
        assert!(harness.gateway.router().root_mode());

        let response = harness.gateway.handle(IncomingRequest::new("GET", "/http://example.com/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(&response);
        assert_eq!(body["prefix"], json!("/"));
        assert_eq!(body["metadata"]["coll"], json!(ROOT_COLL));
        assert_eq!(body["metadata"]["title"], json!("Fixed"));
    }

    #[tokio::test]
    async fn test_from_config_creates_root() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            collections_root: temp_dir.path().join("collections"),
            collections: BTreeMap::from([("curated".to_string(), Metadata::new())]),
            ..Config::default()
        };
        let gateway = Gateway::from_config(config).await.unwrap();
        assert!(temp_dir.path().join("collections").is_dir());
        assert!(!gateway.router().root_mode());

        let response = gateway.handle(IncomingRequest::new("GET", "/collinfo.json")).await;
        assert_eq!(body_json(&response), json!({"fixed": ["curated"], "dynamic": []}));
    }
}
