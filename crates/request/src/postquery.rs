//! Folding a POST body into a lookup URL.
//!
//! Archives index POST captures under a URL that carries the body as query
//! parameters, so replay must derive the same URL from the live request.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
/// Query parameter carrying a non-form body, base64-encoded.
pub const POST_DATA_PARAM: &str = "__wb_post_data";

/// Derives the query fragment for a POST body once, then appends it to any
/// number of URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQueryExtractor {
    query: Option<String>,
}

impl PostQueryExtractor {
    /// Extract from a request body.
    ///
    /// Only `POST` bodies are considered. At most `content_length` bytes are
    /// used; a missing or non-numeric length counts as zero and disables
    /// extraction, and a length beyond the body just uses the whole body.
    pub fn new(method: &str, content_type: Option<&str>, content_length: Option<&str>, body: &[u8]) -> Self {
        if method != "POST" {
            return Self { query: None };
        }
        let length = content_length.and_then(|length| length.trim().parse::<usize>().ok()).unwrap_or(0);
        let data = &body[..length.min(body.len())];
        if data.is_empty() {
            return Self { query: None };
        }
        let is_form = content_type.is_some_and(|content_type| {
            content_type.trim().to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE)
        });
        let query = match is_form {
            true => decode_form(data),
            false => format!("{POST_DATA_PARAM}={}", STANDARD.encode(data)),
        };
        tracing::trace!(is_form, bytes = data.len(), "extracted post query");
        Self { query: Some(query) }
    }

    /// The derived query fragment, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Append the derived query to `url` with `&` or `?` as appropriate.
    /// Returns `url` unchanged when there is nothing to append.
    pub fn append_post_query(&self, url: &str) -> String {
        match &self.query {
            Some(query) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}{query}")
            },
            None => url.to_string(),
        }
    }
}

/// `+` becomes a space, then percent-escapes are decoded. Malformed escapes
/// stay as they are.
fn decode_form(data: &[u8]) -> String {
    let spaced: Vec<u8> = data.iter().map(|&byte| if byte == b'+' { b' ' } else { byte }).collect();
    percent_decode(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const POST_DATA: &[u8] = b"foo=bar&dir=%2Fbaz";
    const FORM: Option<&str> = Some(FORM_CONTENT_TYPE);

    fn len(delta: isize) -> String {
        (POST_DATA.len() as isize + delta).to_string()
    }

    #[test]
    fn test_form_data() {
        let extractor = PostQueryExtractor::new("POST", FORM, Some(&len(0)), POST_DATA);
        assert_eq!(extractor.append_post_query("http://example.com/"), "http://example.com/?foo=bar&dir=/baz");
        assert_eq!(
            extractor.append_post_query("http://example.com/?123=ABC"),
            "http://example.com/?123=ABC&foo=bar&dir=/baz"
        );
    }

    #[rstest]
    #[case("PUT")]
    #[case("GET")]
    #[case("post")]
    fn test_other_methods_are_ignored(#[case] method: &str) {
        let extractor = PostQueryExtractor::new(method, FORM, Some(&len(0)), POST_DATA);
        assert_eq!(extractor.append_post_query("http://example.com/"), "http://example.com/");
    }

    #[rstest]
    #[case(
        Some("application/octet-stream"),
        "http://example.com/",
        "http://example.com/?__wb_post_data=Zm9vPWJhciZkaXI9JTJGYmF6"
    )]
    #[case(
        Some("text/plain"),
        "http://example.com/pathbar?id=123",
        "http://example.com/pathbar?id=123&__wb_post_data=Zm9vPWJhciZkaXI9JTJGYmF6"
    )]
    #[case(None, "http://example.com/", "http://example.com/?__wb_post_data=Zm9vPWJhciZkaXI9JTJGYmF6")]
    fn test_non_form_data_is_base64(#[case] content_type: Option<&str>, #[case] url: &str, #[case] expected: &str) {
        let extractor = PostQueryExtractor::new("POST", content_type, Some(&len(0)), POST_DATA);
        assert_eq!(extractor.append_post_query(url), expected);
    }

    #[rstest]
    #[case(Some("0"))]
    #[case(Some("abc"))]
    #[case(None)]
    fn test_invalid_length_is_ignored(#[case] length: Option<&str>) {
        let extractor = PostQueryExtractor::new("POST", FORM, length, POST_DATA);
        assert_eq!(extractor.query(), None);
        assert_eq!(extractor.append_post_query("http://example.com/"), "http://example.com/");
    }

    #[test]
    fn test_length_too_short() {
        let extractor = PostQueryExtractor::new("POST", FORM, Some(&len(-4)), POST_DATA);
        assert_eq!(extractor.append_post_query("http://example.com/"), "http://example.com/?foo=bar&dir=%2");
    }

    #[test]
    fn test_length_too_long() {
        let extractor = PostQueryExtractor::new("POST", FORM, Some(&len(4)), POST_DATA);
        assert_eq!(extractor.append_post_query("http://example.com/"), "http://example.com/?foo=bar&dir=/baz");
    }

    #[test]
    fn test_empty_body() {
        let extractor = PostQueryExtractor::new("POST", FORM, Some("10"), b"");
        assert_eq!(extractor.query(), None);
    }

    #[test]
    fn test_plus_is_space() {
        let content_type = Some("application/x-www-form-urlencoded; charset=UTF-8");
        let extractor = PostQueryExtractor::new("POST", content_type, Some("13"), b"q=hello+world");
        assert_eq!(extractor.query(), Some("q=hello world"));
    }
}
