//! In-memory storage backend for testing.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{BoxSyncRead, StorageBackend};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Directories are
/// implied by the paths of the files present.
///
/// # Examples
///
/// ```
/// use rewind_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("my-coll/archive/a.warc", b"WARC/1.0\r\n"),
/// ]);
/// backend.write_at(Path::new("my-coll/archive/a.warc"), 10, b"more").await?;
/// assert_eq!(backend.read(Path::new("my-coll/archive/a.warc")).await?, b"WARC/1.0\r\nmore");
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal).
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn not_found(path: &Path) -> exn::Exn<ErrorKind> {
        exn::Exn::from(ErrorKind::NotFound(path.display().to_string()))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        self.storage.read().await.get(&path).cloned().ok_or_else(|| Self::not_found(&path))
    }

    async fn read_range(&self, path: &Path, offset: u64, length: Option<u64>) -> Result<BoxSyncRead> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let data = guard.get(&path).ok_or_else(|| Self::not_found(&path))?;
        let size = data.len() as u64;
        let end = match length {
            Some(length) => offset.checked_add(length),
            None => Some(size),
        };
        match end {
            Some(end) if offset <= size && end <= size => {
                Ok(Box::new(Cursor::new(data[offset as usize..end as usize].to_vec())))
            },
            _ => exn::bail!(ErrorKind::ShortRead {
                location: path.display().to_string(),
                offset,
                wanted: length.unwrap_or(0),
                available: size.saturating_sub(offset),
            }),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, data.to_vec());
        Ok(())
    }

    async fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.storage.write().await;
        let contents = guard.entry(path).or_default();
        let start = offset as usize;
        let end = start + data.len();
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    async fn list_dirs(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>> {
        let base = prefix.map(validate_path).transpose()?.unwrap_or_default();
        let guard = self.storage.read().await;
        let dirs: BTreeSet<PathBuf> = guard
            .keys()
            .filter_map(|path| {
                let rest = path.strip_prefix(&base).ok()?;
                let mut components = rest.components();
                let first = components.next()?;
                // The last component is the file itself.
                components.next()?;
                Some(base.join(first))
            })
            .collect();
        Ok(dirs.into_iter().collect())
    }
}
