//! Storage for archive containers.
//!
//! Containers are addressed by a path relative to the collections root
//! (`<coll>/archive/<name>.warc.gz`) and read by byte range: a record is
//! always located by `(container, offset, length)` from the index. Remote
//! containers (`http://` or `https://`) are read with HTTP range requests
//! through [`RemoteSource`].

pub mod backend;
pub mod error;
mod path;
mod remote;

pub use crate::backend::StorageBackend;
pub use crate::path::validate as validate_path;
pub use crate::remote::RemoteSource;
use std::io::Read;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
/// A `'static` blocking reader over a byte range, suitable for
/// [`spawn_blocking`](tokio::task::spawn_blocking).
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
