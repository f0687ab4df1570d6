use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use rewind_config::{Metadata, MetadataCache};
use rewind_storage::BackendHandle;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Configured up front; immutable for the life of the process.
    Fixed,
    /// A directory under the collections root, discovered per request.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    pub name: String,
    pub kind: CollectionKind,
    /// Fixed configuration, or the contents of the metadata file.
    pub metadata: Arc<Metadata>,
}

/// Fixed collections plus whatever directories exist under the storage root.
pub struct Collections {
    fixed: BTreeMap<String, Arc<Metadata>>,
    storage: BackendHandle,
}

impl Collections {
    pub fn new(fixed: BTreeMap<String, Metadata>, storage: BackendHandle) -> Self {
        let fixed = fixed.into_iter().map(|(name, config)| (name, Arc::new(config))).collect();
        Self { fixed, storage }
    }

    pub fn fixed(&self) -> Vec<String> {
        self.fixed.keys().cloned().collect()
    }

    pub fn is_fixed(&self, coll: &str) -> bool {
        self.fixed.contains_key(coll)
    }

    /// Directories currently present under the collections root.
    pub async fn dynamic(&self) -> Result<Vec<String>> {
        let dirs = self
            .storage
            .list_dirs(None)
            .await
            .or_raise(|| ErrorKind::ArchiveLoadFailed("collections root".to_string()))?;
        Ok(dirs.iter().filter_map(|dir| dir.to_str()).map(str::to_string).collect())
    }

    pub async fn kind(&self, coll: &str) -> Result<Option<CollectionKind>> {
        if self.is_fixed(coll) {
            return Ok(Some(CollectionKind::Fixed));
        }
        let dynamic = self.dynamic().await?;
        Ok(dynamic.iter().any(|name| name == coll).then_some(CollectionKind::Dynamic))
    }

    /// Describe `coll`, or `None` if no such collection exists.
    pub async fn describe(&self, coll: &str, cache: &MetadataCache) -> Result<Option<CollectionDescriptor>> {
        let Some(kind) = self.kind(coll).await? else {
            return Ok(None);
        };
        let metadata = match (kind, self.fixed.get(coll)) {
            (CollectionKind::Fixed, Some(config)) => Arc::clone(config),
            _ => cache.load(coll).await.or_raise(|| ErrorKind::Internal)?,
        };
        Ok(Some(CollectionDescriptor {
            name: coll.to_string(),
            kind,
            metadata,
        }))
    }
}
