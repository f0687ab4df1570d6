use bytes::Bytes;

/// A request as delivered by the transport, before any reconstruction.
///
/// `script_name` is the prefix the gateway is mounted under (empty at the
/// root); `path` is the rest of the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingRequest {
    pub method: String,
    pub script_name: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    /// Set the query string; an empty one is treated as absent.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// `script_name + path`, plus `?query` when there is one.
    pub fn request_uri(&self) -> String {
        match &self.query {
            Some(query) => format!("{}{}?{}", self.script_name, self.path, query),
            None => format!("{}{}", self.script_name, self.path),
        }
    }
}

/// `content-type` → `Content-Type`.
pub(crate) fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

impl From<http::Request<Bytes>> for IncomingRequest {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let headers = parts
            .headers
            .iter()
            .map(|(name, value)| (title_case(name.as_str()), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        Self {
            method: parts.method.as_str().to_string(),
            script_name: String::new(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().filter(|query| !query.is_empty()).map(str::to_string),
            headers,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("content-type", "Content-Type")]
    #[case("x-forwarded-for", "X-Forwarded-For")]
    #[case("HOST", "Host")]
    #[case("etag", "Etag")]
    fn test_title_case(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(title_case(name), expected);
    }

    #[test]
    fn test_from_http_request() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/my-coll/http://example.com/?a=1")
            .header("content-type", "text/plain")
            .header("x-test", "1")
            .body(Bytes::from_static(b"ABC"))
            .unwrap();
        let incoming = IncomingRequest::from(request);
        assert_eq!(incoming.method, "POST");
        assert_eq!(incoming.path, "/my-coll/http://example.com/");
        assert_eq!(incoming.query.as_deref(), Some("a=1"));
        assert_eq!(
            incoming.headers,
            vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("X-Test".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(incoming.body, Bytes::from_static(b"ABC"));
    }

    #[test]
    fn test_request_uri() {
        let request = IncomingRequest::new("GET", "/http://example.com/").with_script_name("/test");
        assert_eq!(request.request_uri(), "/test/http://example.com/");
        assert_eq!(request.with_query("x=y").request_uri(), "/test/http://example.com/?x=y");
    }
}
