use crate::error::{ErrorKind, Result};
use bytes::Bytes;
use exn::ResultExt;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderValue, StatusCode};

/// A fully buffered response handed back to the transport.
pub type Response = http::Response<Bytes>;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// Connection-level headers that must not be replayed or forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|hop| hop.eq_ignore_ascii_case(name))
}

/// A response with a body and, when it is a valid header value, a content type.
pub fn with_body(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    if let Some(value) = content_type.and_then(|content_type| HeaderValue::from_str(content_type).ok()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

pub fn json(value: &serde_json::Value) -> Response {
    with_body(StatusCode::OK, Some(APPLICATION_JSON), value.to_string())
}

pub fn redirect(status: StatusCode, location: &str) -> Result<Response> {
    let value = HeaderValue::from_str(location).or_raise(|| ErrorKind::Internal)?;
    let mut response = with_body(status, Some(TEXT_PLAIN), format!("Redirecting to {location}\n"));
    response.headers_mut().insert(LOCATION, value);
    Ok(response)
}
