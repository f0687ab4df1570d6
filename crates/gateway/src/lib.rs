//! Replay and capture gateway.
//!
//! [`Gateway`] routes inbound requests to collection pages, the index
//! server, archived content (replay) or the live web (record). Everything it
//! talks to sits behind a trait in [`upstream`], with default implementations
//! wired up by [`Gateway::from_config`].

mod cdx;
mod collections;
pub mod error;
mod gateway;
mod recorder;
mod referer;
mod resolver;
pub mod response;
mod rewriter;
mod route;
pub mod upstream;
mod views;
mod wburl;

pub use crate::cdx::{CdxLine, HttpCdxSource};
pub use crate::collections::{CollectionDescriptor, CollectionKind, Collections};
pub use crate::gateway::{Gateway, Upstream};
pub use crate::recorder::{LiveResponse, WarcRecorder};
pub use crate::referer::referer_redirect;
pub use crate::resolver::IndexResolver;
pub use crate::response::Response;
pub use crate::rewriter::IdentityRewriter;
pub use crate::route::{ROOT_COLL, Route, Router};
pub use crate::upstream::{CdxResponse, CdxSource, Recorder, ReplayContext, ResourceResolver, Rewriter, Views};
pub use crate::views::PlainViews;
pub use crate::wburl::WbUrl;
