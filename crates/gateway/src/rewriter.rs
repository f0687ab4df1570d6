use crate::error::{ErrorKind, Result};
use crate::response::{Response, is_hop_by_hop};
use crate::upstream::{ReplayContext, Rewriter};
use async_trait::async_trait;
use bytes::Bytes;
use exn::ResultExt;
use http::header::{CONTENT_LENGTH, HeaderName};
use http::{HeaderValue, StatusCode};
use rewind_warc::ArchiveRecord;

/// Replays the archived status, headers and payload unchanged, apart from
/// connection framing: hop-by-hop headers are dropped, a chunked payload is
/// decoded and `Content-Length` is recomputed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRewriter;

#[async_trait]
impl Rewriter for IdentityRewriter {
    #[tracing::instrument(level = "debug", skip_all, fields(url = %context.wb_url.url))]
    async fn rewrite(&self, mut record: ArchiveRecord, context: &ReplayContext) -> Result<Response> {
        let status = record
            .status_headers
            .status_code()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);
        let chunked = record
            .status_headers
            .get_all("Transfer-Encoding")
            .any(|value| value.to_ascii_lowercase().contains("chunked"));
        let headers = record.status_headers.headers.clone();
        let payload = tokio::task::spawn_blocking(move || record.read_payload())
            .await
            .or_raise(|| ErrorKind::Internal)?
            .or_raise(|| ErrorKind::ArchiveLoadFailed(context.wb_url.url.clone()))?;
        let payload = match chunked {
            true => dechunk(&payload).unwrap_or(payload),
            false => payload,
        };

        let mut response = Response::new(Bytes::from(payload));
        *response.status_mut() = status;
        for (name, value) in &headers {
            if is_hop_by_hop(name) || name.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                },
                _ => tracing::trace!(name, "dropping unrepresentable archived header"),
            }
        }
        let length = HeaderValue::from(response.body().len());
        response.headers_mut().insert(CONTENT_LENGTH, length);
        Ok(response)
    }
}

/// Decode a `Transfer-Encoding: chunked` body. `None` when the framing is
/// broken, in which case the raw bytes are better than nothing.
fn dechunk(mut data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len());
    loop {
        let line_end = data.windows(2).position(|window| window == b"\r\n")?;
        let size_line = std::str::from_utf8(&data[..line_end]).ok()?;
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Some(decoded);
        }
        decoded.extend_from_slice(data.get(..size)?);
        data = data.get(size..)?.strip_prefix(b"\r\n")?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wburl::WbUrl;
    use rewind_compress::Compression;
    use rewind_config::Metadata;
    use rewind_request::{IncomingRequest, InputRequest};
    use rewind_warc::{RecordType, WarcRecordBuilder, parse_record_stream};
    use rstest::rstest;
    use std::io::Cursor;

    fn record(http: &str) -> ArchiveRecord {
        let raw = WarcRecordBuilder::new(RecordType::Response)
            .target_uri("http://example.com/")
            .block(http)
            .encode(Compression::None)
            .unwrap();
        parse_record_stream(Box::new(Cursor::new(raw))).unwrap()
    }

    fn context() -> ReplayContext {
        let incoming = IncomingRequest::new("GET", "/my-coll/http://example.com/");
        ReplayContext {
            coll: "my-coll".to_string(),
            wb_url: WbUrl::parse("http://example.com/").unwrap(),
            prefix: "/my-coll/".to_string(),
            metadata: Metadata::new(),
            request: InputRequest::direct(&incoming).canonicalize("http://example.com/"),
        }
    }

    #[tokio::test]
    async fn test_replays_unchanged() {
        let record = record(
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\
             Connection: close\r\nContent-Length: 999\r\n\r\n<p>gone</p>",
        );
        let response = IdentityRewriter.rewrite(record, &context()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "text/html");
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 2);
        assert!(response.headers().get("connection").is_none());
        assert_eq!(response.headers()[CONTENT_LENGTH], "11");
        assert_eq!(response.body().as_ref(), b"<p>gone</p>");
    }

    #[tokio::test]
    async fn test_chunked_payload_is_decoded() {
        let record = record("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n");
        let response = IdentityRewriter.rewrite(record, &context()).await.unwrap();
        assert!(response.headers().get("transfer-encoding").is_none());
        assert_eq!(response.body().as_ref(), b"hello world");
    }

    #[rstest]
    #[case(b"5\r\nhello\r\n0\r\n\r\n", Some(&b"hello"[..]))]
    #[case(b"3;ext=1\r\nabc\r\n0\r\n", Some(&b"abc"[..]))]
    #[case(b"0\r\n\r\n", Some(&b""[..]))]
    #[case(b"zz\r\nhello\r\n", None)]
    #[case(b"10\r\nshort\r\n", None)]
    #[case(b"hello world", None)]
    fn test_dechunk(#[case] data: &[u8], #[case] expected: Option<&[u8]>) {
        assert_eq!(dechunk(data).as_deref(), expected);
    }
}
