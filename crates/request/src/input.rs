//! Canonical request reconstruction.
//!
//! Both a direct inbound request and a request encapsulated in a POST body
//! reduce to the same [`CanonicalRequest`]: an `HTTP/1.0` request whose
//! `Host` comes from the target URL rather than from the gateway's own host.

use crate::error::{ErrorKind, Result};
use crate::incoming::IncomingRequest;
use crate::postquery::PostQueryExtractor;
use bytes::Bytes;
use exn::ResultExt;
use rewind_warc::StatusAndHeadersParser;
use std::io::Cursor;
use url::Url;

/// The inbound request reduced to what reconstruction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequest {
    method: String,
    request_uri: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl InputRequest {
    /// Take method, URI, headers and body straight from the inbound request.
    pub fn direct(request: &IncomingRequest) -> Self {
        Self {
            method: request.method.clone(),
            request_uri: request.request_uri(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        }
    }

    /// Parse the inbound body as a complete serialized request (request
    /// line, headers, body). The target URL is supplied separately.
    pub fn post(request: &IncomingRequest) -> Result<Self> {
        let mut reader = Cursor::new(request.body.as_ref());
        let parsed = StatusAndHeadersParser::unverified()
            .parse(&mut reader, None)
            .or_raise(|| ErrorKind::MalformedRequest("unreadable request head".to_string()))?;
        if parsed.protocol.is_empty() {
            exn::bail!(ErrorKind::MalformedRequest("empty request line".to_string()));
        }
        // `status` holds `<uri> HTTP/x.y`; the version is dropped.
        let request_uri = match parsed.status.rsplit_once(' ') {
            Some((uri, version)) if version.starts_with("HTTP/") => uri.trim(),
            _ => parsed.status.as_str(),
        };
        let consumed = (parsed.total_len as usize).min(request.body.len());
        Ok(Self {
            method: parsed.protocol.clone(),
            request_uri: request_uri.to_string(),
            headers: parsed.headers.clone(),
            body: request.body.slice(consumed..),
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Extractor over this request's body, for folding a POST into a lookup
    /// URL.
    pub fn post_query(&self) -> PostQueryExtractor {
        PostQueryExtractor::new(&self.method, self.header("Content-Type"), self.header("Content-Length"), &self.body)
    }

    /// Build the canonical request aimed at `target_url`.
    pub fn canonicalize(&self, target_url: &str) -> CanonicalRequest {
        let mut headers = Vec::with_capacity(self.headers.len() + 2);
        headers.push(("Host".to_string(), authority(target_url)));
        headers.extend(self.headers.iter().filter(|(name, _)| !name.eq_ignore_ascii_case("Host")).cloned());
        let body = (!self.body.is_empty()).then(|| self.body.clone());
        if let Some(body) = &body
            && !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("Content-Length"))
        {
            headers.push(("Content-Length".to_string(), body.len().to_string()));
        }
        CanonicalRequest {
            method: self.method.clone(),
            request_uri: self.request_uri.clone(),
            target_url: target_url.to_string(),
            headers,
            body,
        }
    }

    /// Raw `HTTP/1.0` request bytes aimed at `target_url`.
    pub fn reconstruct_request(&self, target_url: &str) -> Vec<u8> {
        self.canonicalize(target_url).to_bytes()
    }
}

/// `host[:port]` of a URL. Scheme-less targets are read as `http://`;
/// anything unparseable yields its first path segment.
fn authority(target_url: &str) -> String {
    let parsed = Url::parse(target_url)
        .ok()
        .filter(Url::has_host)
        .or_else(|| Url::parse(&format!("http://{target_url}")).ok());
    let from_url = parsed.and_then(|url| {
        let host = url.host()?.to_string();
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        })
    });
    from_url.unwrap_or_else(|| target_url.split('/').next().unwrap_or_default().to_string())
}

/// A fully reconstructed request, immutable once built.
///
/// Headers keep their order and case, with `Host` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    request_uri: String,
    target_url: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl CanonicalRequest {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Target of the request line.
    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    /// URL the request is aimed at; source of `Host`.
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Copy of this request with a different request-line target, used when
    /// forwarding upstream (for instance to the archived URL's own path).
    pub fn with_request_uri(&self, request_uri: impl Into<String>) -> Self {
        Self {
            request_uri: request_uri.into(),
            ..self.clone()
        }
    }

    pub fn post_query(&self) -> PostQueryExtractor {
        let body = self.body.as_deref().unwrap_or_default();
        PostQueryExtractor::new(&self.method, self.header("Content-Type"), self.header("Content-Length"), body)
    }

    /// Serialize as raw `HTTP/1.0` request bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = format!("{} {} HTTP/1.0\r\n", self.method, self.request_uri).into_bytes();
        for (name, value) in &self.headers {
            buffer.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        buffer.extend_from_slice(b"\r\n");
        if let Some(body) = &self.body {
            buffer.extend_from_slice(body);
        }
        buffer
    }
}
