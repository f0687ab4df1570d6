use crate::response::TEXT_PLAIN;
use crate::upstream::Views;
use http::StatusCode;
use rewind_config::Metadata;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

/// Renders every page as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainViews;

fn title(metadata: &Metadata) -> Option<&str> {
    metadata.get("title").and_then(serde_json::Value::as_str)
}

impl Views for PlainViews {
    fn content_type(&self) -> &'static str {
        TEXT_PLAIN
    }

    fn home(&self, colls: &[String], all_metadata: &BTreeMap<String, Arc<Metadata>>) -> String {
        let mut page = String::from("Collections\n\n");
        if colls.is_empty() {
            page.push_str("(none)\n");
        }
        for coll in colls {
            match all_metadata.get(coll).and_then(|metadata| title(metadata)) {
                Some(title) => _ = writeln!(page, "/{coll}/ - {title}"),
                None => _ = writeln!(page, "/{coll}/"),
            }
        }
        page
    }

    fn collection(&self, prefix: &str, metadata: &Metadata) -> String {
        let mut page = String::new();
        let coll = metadata.get("coll").and_then(serde_json::Value::as_str).unwrap_or_default();
        _ = writeln!(page, "{}\n", title(metadata).unwrap_or(coll));
        _ = writeln!(page, "Search: {prefix}*/<url>");
        _ = writeln!(page, "Replay: {prefix}<timestamp>/<url>");
        page
    }

    fn error(&self, status: StatusCode, message: &str) -> String {
        format!("{status}\n\n{message}\n")
    }
}
