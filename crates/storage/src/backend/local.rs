//! Local filesystem storage backend.
//!
//! Containers live under a configured collections root and are accessed with
//! `tokio::fs`. Ranged reads seek on the async handle and then hand a
//! blocking `std::fs::File` limited to the range back to the caller.

use crate::error::ErrorKind;
use crate::{BoxSyncRead, StorageBackend, error::Result, path::validate as validate_path};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::io::{Read, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Local filesystem storage backend.
///
/// All paths are relative to the configured collections root.
///
/// # Examples
///
/// ```no_run
/// use rewind_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("collections", "/srv/rewind/collections")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Collections root
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating the root directory if
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or names something other
    /// than a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a relative storage path and join it onto the root.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn create_parent(&self, abs_path: &Path, path: &Path) -> Result<()> {
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = %self.name))]
    async fn read_range(&self, path: &Path, offset: u64, length: Option<u64>) -> Result<BoxSyncRead> {
        let abs_path = self.absolute_path(path)?;
        let mut file = fs::File::open(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        let size = file.metadata().await.map_err(|e| Self::map_io_error(e, path))?.len();
        let end = match length {
            Some(length) => offset.checked_add(length),
            None => Some(size),
        };
        if offset > size || end.is_none_or(|end| end > size) {
            exn::bail!(ErrorKind::ShortRead {
                location: path.display().to_string(),
                offset,
                wanted: length.unwrap_or(0),
                available: size.saturating_sub(offset),
            });
        }
        file.seek(SeekFrom::Start(offset)).await.map_err(ErrorKind::Io)?;
        let wanted = length.unwrap_or(size - offset);
        Ok(Box::new(file.into_std().await.take(wanted)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        self.create_parent(&abs_path, path).await?;
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    #[tracing::instrument(level = "trace", skip(self, data), fields(backend = %self.name, len = data.len()))]
    async fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        self.create_parent(&abs_path, path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&abs_path)
            .await
            .map_err(|e| Self::map_io_error(e, path))?;
        file.seek(SeekFrom::Start(offset)).await.map_err(ErrorKind::Io)?;
        file.write_all(data).await.map_err(ErrorKind::Io)?;
        file.flush().await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    async fn list_dirs(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>> {
        let (dir, relative_base) = match prefix {
            Some(prefix) => {
                let validated = validate_path(prefix)?;
                (self.root.join(&validated), validated)
            },
            None => (self.root.clone(), PathBuf::new()),
        };
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(Self::map_io_error(err, &dir)),
        };
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &dir))? {
            // Follow symlinks: a collection may be linked in from elsewhere.
            match fs::metadata(entry.path()).await {
                Ok(metadata) if metadata.is_dir() => dirs.push(relative_base.join(entry.file_name())),
                Ok(_) => {},
                Err(err) => tracing::debug!(path = %entry.path().display(), %err, "skipping unreadable entry"),
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
