//! Path routing.
//!
//! In root mode a single collection named [`ROOT_COLL`] is served directly
//! under `/`; otherwise every route is prefixed with `/<coll>`.

/// Name of the collection served without a path prefix.
pub const ROOT_COLL: &str = "$root";

const LISTING: &str = "/collinfo.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/collinfo.json`
    Listing,
    /// `/`, multi-collection mode only.
    Home,
    CollectionPage { coll: String },
    /// `/<coll>` without its trailing slash.
    CollectionRedirect { coll: String },
    Cdx { coll: String },
    Timemap { coll: String, output: String, url: String },
    Record { coll: String, url: String },
    Content { coll: String, url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Router {
    root_mode: bool,
    recording: bool,
}

impl Router {
    /// `record/` routes only exist when `recording` is enabled; without it
    /// such paths fall through to content lookups.
    pub fn new(root_mode: bool, recording: bool) -> Self {
        Self { root_mode, recording }
    }

    pub fn root_mode(&self) -> bool {
        self.root_mode
    }

    /// Resolve a path (excluding the script prefix and query string).
    pub fn resolve(&self, path: &str) -> Option<Route> {
        if path == LISTING {
            return Some(Route::Listing);
        }
        let rest = path.strip_prefix('/')?;
        if self.root_mode {
            return Some(self.collection_route(ROOT_COLL, rest));
        }
        if rest.is_empty() {
            return Some(Route::Home);
        }
        match rest.split_once('/') {
            None => Some(Route::CollectionRedirect { coll: rest.to_string() }),
            Some(("", _)) => None,
            Some((coll, rest)) => Some(self.collection_route(coll, rest)),
        }
    }

    fn collection_route(&self, coll: &str, rest: &str) -> Route {
        let coll = coll.to_string();
        if rest.is_empty() {
            return Route::CollectionPage { coll };
        }
        if rest == "cdx" {
            return Route::Cdx { coll };
        }
        if let Some((output, url)) = rest.strip_prefix("timemap/").and_then(|timemap| timemap.split_once('/'))
            && !output.is_empty()
            && !url.is_empty()
        {
            return Route::Timemap {
                coll,
                output: output.to_string(),
                url: url.to_string(),
            };
        }
        if self.recording
            && let Some(url) = rest.strip_prefix("record/")
            && !url.is_empty()
        {
            return Route::Record { coll, url: url.to_string() };
        }
        Route::Content { coll, url: rest.to_string() }
    }
}
