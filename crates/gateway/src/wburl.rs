//! Archival URLs: `[<timestamp>][<modifier>_]/<url>`.

use crate::error::{ErrorKind, Result};
use std::fmt;

const MAX_TIMESTAMP_DIGITS: usize = 14;

/// An archival URL path split into its parts.
///
/// `2020010112id_/http://example.com/` has timestamp `2020010112`, modifier
/// `id_` and URL `http://example.com/`. Both prefixes are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WbUrl {
    pub timestamp: Option<String>,
    pub modifier: Option<String>,
    pub url: String,
}

impl WbUrl {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim_start_matches('/');
        let (timestamp, modifier, url) = match value.split_once('/') {
            Some((head, url)) if !url.is_empty() => match split_prefix(head) {
                Some((timestamp, modifier)) => (timestamp, modifier, url),
                None => (None, None, value),
            },
            _ => (None, None, value),
        };
        if url.is_empty() {
            exn::bail!(ErrorKind::RouteNotFound(format!("/{value}")));
        }
        Ok(Self {
            timestamp: timestamp.map(str::to_string),
            modifier: modifier.map(str::to_string),
            url: normalize(url),
        })
    }
}

/// Split `2020id_` into its timestamp and modifier. `None` when `head` is
/// not an archival prefix at all.
fn split_prefix(head: &str) -> Option<(Option<&str>, Option<&str>)> {
    let digits = head.bytes().take_while(u8::is_ascii_digit).count();
    if digits > MAX_TIMESTAMP_DIGITS {
        return None;
    }
    let (timestamp, modifier) = head.split_at(digits);
    let modifier_ok = modifier.is_empty()
        || (modifier.len() == 3 && modifier.ends_with('_') && modifier[..2].bytes().all(|b| b.is_ascii_lowercase()));
    if head.is_empty() || !modifier_ok {
        return None;
    }
    Some(((!timestamp.is_empty()).then_some(timestamp), (!modifier.is_empty()).then_some(modifier)))
}

/// Restore a scheme, and the `//` that some transports collapse.
fn normalize(url: &str) -> String {
    for scheme in ["http:", "https:"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            return format!("{scheme}//{}", rest.trim_start_matches('/'));
        }
    }
    match url.strip_prefix("//") {
        Some(rest) => format!("http://{rest}"),
        None if url.contains("://") => url.to_string(),
        None => format!("http://{url}"),
    }
}

impl fmt::Display for WbUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timestamp.is_none() && self.modifier.is_none() {
            return f.write_str(&self.url);
        }
        let timestamp = self.timestamp.as_deref().unwrap_or_default();
        let modifier = self.modifier.as_deref().unwrap_or_default();
        write!(f, "{timestamp}{modifier}/{}", self.url)
    }
}
