//! Referer redirect heuristic.
//!
//! A page replayed from `/<coll>/<ts>/http://example.com/page` may contain a
//! root-relative link that escaped rewriting, so the browser asks for
//! `/images/logo.png` and gets a 404. The `Referer` still carries the archival
//! prefix and the original URL, which is enough to redirect to
//! `/<coll>/<ts>/http://example.com/images/logo.png`.

use rewind_request::IncomingRequest;
use url::Url;

/// Where to redirect a request that failed with 404, if anywhere.
///
/// Only applies when the referer is on this host and embeds an absolute
/// `http(s)://` URL after its own authority. Requests already under the
/// referer's archival prefix are genuine misses and are left alone.
pub fn referer_redirect(request: &IncomingRequest) -> Option<String> {
    let referer = request.header("Referer")?;
    let host = request.header("Host")?;
    if host.is_empty() || !referer.contains(host) {
        return None;
    }

    let authority_start = referer.find("://").map_or(0, |index| index + 3);
    let path_start = authority_start + referer[authority_start..].find('/')?;
    let embedded_start = path_start + ["http://", "https://"]
        .iter()
        .filter_map(|scheme| referer[path_start..].find(scheme))
        .min()?;
    let (prefix, embedded) = referer.split_at(embedded_start);

    let prefix_path = &prefix[path_start..];
    let request_path = format!("{}{}", request.script_name, request.path);
    if request_path.starts_with(prefix_path) {
        return None;
    }

    let relative = match &request.query {
        Some(query) => format!("{}?{query}", request.path),
        None => request.path.clone(),
    };
    let target = Url::parse(embedded).ok()?.join(&relative).ok()?;
    tracing::debug!(%referer, %target, "redirecting escaped request");
    Some(format!("{prefix}{target}"))
}
