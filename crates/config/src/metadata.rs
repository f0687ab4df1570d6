//! Per-collection metadata files, cached by modification time.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Format, Yaml};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Free-form metadata of a collection.
pub type Metadata = BTreeMap<String, serde_json::Value>;

#[derive(Debug)]
struct Entry {
    modified: SystemTime,
    metadata: Arc<Metadata>,
}

/// Reads `<root>/<coll>/<file_name>` and keeps the decoded mapping until
/// the file's mtime changes.
///
/// The lock is only held to look up or store an entry, never while reading
/// or decoding the file.
#[derive(Debug)]
pub struct MetadataCache {
    root: PathBuf,
    file_name: String,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MetadataCache {
    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, coll: &str) -> PathBuf {
        self.root.join(coll).join(&self.file_name)
    }

    /// Metadata of one collection.
    ///
    /// A missing or unreadable file yields an empty mapping. A file that
    /// exists but cannot be decoded is an error.
    pub async fn load(&self, coll: &str) -> Result<Arc<Metadata>> {
        let path = self.path_for(coll);
        let modified = match tokio::fs::metadata(&path).await.and_then(|stat| stat.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::trace!(coll, path = %path.display(), error = %err, "no metadata file");
                self.entries.lock().remove(coll);
                return Ok(Arc::new(Metadata::new()));
            },
        };

        if let Some(entry) = self.entries.lock().get(coll)
            && entry.modified == modified
        {
            return Ok(Arc::clone(&entry.metadata));
        }

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!(coll, path = %path.display(), error = %err, "unreadable metadata file");
                self.entries.lock().remove(coll);
                return Ok(Arc::new(Metadata::new()));
            },
        };
        let metadata = Arc::new(decode(&path, &contents)?);
        tracing::debug!(coll, keys = metadata.len(), "metadata reloaded");
        self.entries.lock().insert(
            coll.to_string(),
            Entry {
                modified,
                metadata: Arc::clone(&metadata),
            },
        );
        Ok(metadata)
    }

    /// Refresh every named collection, then return everything cached.
    ///
    /// Collections without a metadata file are absent from the result.
    pub async fn get_all<'a>(
        &self,
        colls: impl IntoIterator<Item = &'a str>,
    ) -> Result<BTreeMap<String, Arc<Metadata>>> {
        for coll in colls {
            self.load(coll).await?;
        }
        let entries = self.entries.lock();
        Ok(entries.iter().map(|(coll, entry)| (coll.clone(), Arc::clone(&entry.metadata))).collect())
    }
}

fn decode(path: &Path, contents: &str) -> Result<Metadata> {
    if contents.trim().is_empty() {
        return Ok(Metadata::new());
    }
    Figment::from(Yaml::string(contents))
        .extract()
        .or_raise(|| ErrorKind::Metadata(path.display().to_string()))
}
