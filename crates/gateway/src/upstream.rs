//! Collaborators the dispatcher talks to.
//!
//! Each trait has a default implementation in this crate, wired up by
//! [`Gateway::from_config`](crate::Gateway::from_config); tests and embedders
//! can substitute their own.

use crate::error::Result;
use crate::response::Response;
use crate::wburl::WbUrl;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use rewind_config::Metadata;
use rewind_request::CanonicalRequest;
use rewind_warc::ArchiveRecord;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything a rewriter may want to know about the request being replayed.
#[derive(Debug, Clone)]
pub struct ReplayContext {
    pub coll: String,
    pub wb_url: WbUrl,
    /// Path prefix of the collection, ending in `/`.
    pub prefix: String,
    /// `{coll, type, ...}` merged with the collection's own metadata.
    pub metadata: Metadata,
    pub request: CanonicalRequest,
}

/// Finds and loads the archived record answering a request.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// # Errors
    /// - [`NotFound`](crate::error::ErrorKind::NotFound) when the collection
    ///   holds no capture of `lookup_url`.
    /// - [`ArchiveLoadFailed`](crate::error::ErrorKind::ArchiveLoadFailed)
    ///   when the capture exists but its container cannot be read.
    async fn resolve(
        &self,
        coll: &str,
        lookup_url: &str,
        closest: Option<&str>,
        request: &CanonicalRequest,
    ) -> Result<ArchiveRecord>;
}

/// Turns an archived record into the response sent to the client.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn rewrite(&self, record: ArchiveRecord, context: &ReplayContext) -> Result<Response>;
}

/// Captures live traffic into a collection.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Fetch `request` live, persist it, and return the stored response
    /// record ready for replay.
    async fn record(&self, coll: &str, request: &CanonicalRequest) -> Result<ArchiveRecord>;
}

/// Raw index server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait CdxSource: Send + Sync {
    /// Run `query` (a raw query string) against the index of `coll`.
    async fn query(&self, coll: &str, query: Option<&str>) -> Result<CdxResponse>;
}

/// Rendered pages.
pub trait Views: Send + Sync {
    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    /// Landing page listing every collection.
    fn home(&self, colls: &[String], all_metadata: &BTreeMap<String, Arc<Metadata>>) -> String;

    /// Search page of one collection.
    fn collection(&self, prefix: &str, metadata: &Metadata) -> String;

    fn error(&self, status: StatusCode, message: &str) -> String;
}
