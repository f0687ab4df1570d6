//! CDX index access: line parsing and the HTTP index client.

use crate::error::{ErrorKind, Result};
use crate::upstream::{CdxResponse, CdxSource};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use rewind_config::COLL_PLACEHOLDER;
use std::time::Duration;

/// One index line: where a capture of `url` at `timestamp` is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxLine {
    pub urlkey: String,
    pub timestamp: String,
    pub url: String,
    pub mime: Option<String>,
    pub status: Option<String>,
    pub digest: Option<String>,
    /// Length of the (compressed) record; absent in 9-field lines.
    pub length: Option<u64>,
    pub offset: u64,
    pub filename: String,
}

impl CdxLine {
    /// Parse a CDXJ line (`urlkey timestamp {json}`) or a classic
    /// space-separated line with 11 or 9 fields.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let malformed = || ErrorKind::Upstream {
            status: 502,
            message: format!("Malformed index line: {line}"),
        };
        let mut parts = line.splitn(3, ' ');
        let (Some(urlkey), Some(timestamp), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
            exn::bail!(malformed());
        };
        if rest.starts_with('{') {
            let fields: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(rest).or_raise(malformed)?;
            let field = |name: &str| match fields.get(name)? {
                serde_json::Value::String(value) => Some(value.clone()),
                serde_json::Value::Number(value) => Some(value.to_string()),
                _ => None,
            };
            return Ok(Self {
                urlkey: urlkey.to_string(),
                timestamp: timestamp.to_string(),
                url: field("url").ok_or_raise(malformed)?,
                mime: field("mime"),
                status: field("status"),
                digest: field("digest"),
                length: field("length").map(|length| parse_number(&length)).transpose().or_raise(malformed)?,
                offset: parse_number(&field("offset").ok_or_raise(malformed)?).or_raise(malformed)?,
                filename: field("filename").ok_or_raise(malformed)?,
            });
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let (length, offset, filename) = match fields.len() {
            11 => (Some(parse_number(fields[8]).or_raise(malformed)?), fields[9], fields[10]),
            9 => (None, fields[7], fields[8]),
            _ => exn::bail!(malformed()),
        };
        Ok(Self {
            urlkey: fields[0].to_string(),
            timestamp: fields[1].to_string(),
            url: fields[2].to_string(),
            mime: optional(fields[3]),
            status: optional(fields[4]),
            digest: optional(fields[5]),
            length,
            offset: parse_number(offset).or_raise(malformed)?,
            filename: filename.to_string(),
        })
    }
}

fn parse_number(value: &str) -> std::result::Result<u64, std::num::ParseIntError> {
    value.trim().parse()
}

fn optional(value: &str) -> Option<String> {
    (value != "-").then(|| value.to_string())
}

/// Forwards queries to an HTTP CDX server.
pub struct HttpCdxSource {
    client: reqwest::Client,
    /// Endpoint template containing `{coll}`.
    endpoint: String,
}

impl HttpCdxSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().or_raise(|| ErrorKind::Internal)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint of `coll` with `query` appended verbatim.
    pub fn url_for(&self, coll: &str, query: Option<&str>) -> String {
        let mut url = self.endpoint.replace(COLL_PLACEHOLDER, coll);
        if let Some(query) = query.filter(|query| !query.is_empty()) {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(query);
        }
        url
    }
}

#[async_trait]
impl CdxSource for HttpCdxSource {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn query(&self, coll: &str, query: Option<&str>) -> Result<CdxResponse> {
        let url = self.url_for(coll, query);
        let transport_error = |err: &reqwest::Error| ErrorKind::Upstream {
            status: 400,
            message: format!("Error: {err}"),
        };
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => exn::bail!(transport_error(&err)),
        };
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => exn::bail!(transport_error(&err)),
        };
        tracing::debug!(status, bytes = body.len(), "index responded");
        Ok(CdxResponse {
            status,
            content_type,
            body,
        })
    }
}
