//! Reconstruction of inbound requests into canonical `HTTP/1.0` requests.
//!
//! A [`CanonicalRequest`] is what the gateway hands to the index (as a lookup
//! URL, with POST bodies folded in by [`PostQueryExtractor`]) and to the
//! recorder (as raw request bytes).

pub mod error;
mod incoming;
mod input;
mod postquery;

pub use crate::incoming::IncomingRequest;
pub use crate::input::{CanonicalRequest, InputRequest};
pub use crate::postquery::{POST_DATA_PARAM, PostQueryExtractor};
