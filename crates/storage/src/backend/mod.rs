//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a unified interface for
//! the handful of operations the gateway needs against the collections root.
//! Replay only ever reads byte ranges; recording writes at offsets it
//! reserved up front.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::BoxSyncRead;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the collections root and must be validated
/// using [`validate_path`](crate::validate_path) before use.
/// Implementations enforce this validation.
///
/// # Examples
///
/// Read a single record out of a container, decompressing it in a blocking
/// task:
///
/// ```no_run
/// use std::io::Read;
/// use std::path::Path;
/// use rewind_compress::Compression;
/// use rewind_storage::backend::StorageBackend;
/// use rewind_storage::error::Result;
///
/// async fn record_bytes(backend: &dyn StorageBackend, offset: u64, length: u64) -> Result<Vec<u8>> {
///     let range = backend.read_range(Path::new("my-coll/archive/a.warc.gz"), offset, Some(length)).await?;
///     let record = tokio::task::spawn_blocking(move || {
///         let (_, mut reader) = Compression::sniff_reader(range).unwrap();
///         let mut buf = Vec::new();
///         reader.read_to_end(&mut buf).unwrap();
///         buf
///     }).await.unwrap();
///     Ok(record)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// Read a whole file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a byte range of a container for streaming reads.
    ///
    /// With `length` of `None` the range runs to the end of the container.
    /// Returns a `'static` boxed [`Read`](std::io::Read) suitable for use
    /// inside [`spawn_blocking`](tokio::task::spawn_blocking); the async
    /// setup (open, seek) happens before returning.
    ///
    /// # Errors
    /// - [`NotFound`](crate::error::ErrorKind::NotFound) if the container
    ///   does not exist.
    /// - [`ShortRead`](crate::error::ErrorKind::ShortRead) if the container
    ///   ends before `offset + length`.
    async fn read_range(&self, path: &Path, offset: u64, length: Option<u64>) -> Result<BoxSyncRead>;

    /// Write file contents, creating parent directories as needed and
    /// overwriting any existing file.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Write `data` at `offset`, creating the container (and its parent
    /// directories) if needed. Bytes outside the written range are left
    /// untouched, so writers that reserved disjoint ranges can write
    /// concurrently.
    async fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<()>;

    /// List the directories directly under `prefix` (or the root), as sorted
    /// paths relative to the root.
    ///
    /// A prefix that does not exist yields an empty list, not an error.
    async fn list_dirs(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>>;
}
