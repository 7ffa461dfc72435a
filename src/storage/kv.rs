//! Ordered KV store adapter.
//!
//! One sled tree per project, named by the project UUID, so per-project
//! namespacing is structural: dropping a project is dropping its tree, and
//! iteration never crosses project boundaries. Batched writes go through
//! `sled::Batch` and are atomic per batch; iterators see a point-in-time
//! view and tolerate concurrent writers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::storage::keys;
use crate::storage::{ProjectUuid, StorageResult};

/// One key/value pair destined for a batched write.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Entry {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }
}

/// The embedded ordered store holding every project's graph records.
pub struct GraphStore {
    db: sled::Db,
    trees: RwLock<HashMap<String, sled::Tree>>,
    writes: AtomicU64,
}

impl GraphStore {
    /// Open (or create) the store under the given directory.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = sled::open(path.as_ref())?;
        Ok(Self {
            db,
            trees: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
        })
    }

    /// Open an in-memory store; used by tests.
    pub fn open_temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self {
            db,
            trees: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
        })
    }

    fn tree(&self, project: &ProjectUuid) -> StorageResult<sled::Tree> {
        if let Some(tree) = self.trees.read().get(project.as_str()) {
            return Ok(tree.clone());
        }
        let tree = self.db.open_tree(project.as_str())?;
        self.trees
            .write()
            .insert(project.as_str().to_string(), tree.clone());
        Ok(tree)
    }

    pub fn get(&self, project: &ProjectUuid, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let tree = self.tree(project)?;
        Ok(tree.get(key)?.map(|v| v.to_vec()))
    }

    pub fn put(&self, project: &ProjectUuid, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let tree = self.tree(project)?;
        tree.insert(key, value)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            project = %project,
            key = %String::from_utf8_lossy(key),
            bytes = value.len(),
            "kv put"
        );
        Ok(())
    }

    /// Idempotent single-key delete.
    pub fn delete(&self, project: &ProjectUuid, key: &[u8]) -> StorageResult<()> {
        let tree = self.tree(project)?;
        tree.remove(key)?;
        Ok(())
    }

    /// All-or-nothing write of a group of entries.
    pub fn batch_save(&self, project: &ProjectUuid, entries: Vec<Entry>) -> StorageResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let tree = self.tree(project)?;
        let count = entries.len() as u64;
        let mut batch = sled::Batch::default();
        for entry in entries {
            batch.insert(entry.key, entry.value);
        }
        tree.apply_batch(batch)?;
        self.writes.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    /// Delete every key starting with `prefix`. Returns the number removed.
    pub fn delete_all_with_prefix(
        &self,
        project: &ProjectUuid,
        prefix: &[u8],
    ) -> StorageResult<usize> {
        let tree = self.tree(project)?;
        let keys: Vec<sled::IVec> = tree
            .scan_prefix(prefix)
            .keys()
            .collect::<Result<Vec<_>, _>>()?;
        let removed = keys.len();
        for key in keys {
            tree.remove(key)?;
        }
        Ok(removed)
    }

    /// Drop the whole project namespace.
    pub fn delete_all(&self, project: &ProjectUuid) -> StorageResult<()> {
        self.trees.write().remove(project.as_str());
        self.db.drop_tree(project.as_str())?;
        Ok(())
    }

    /// Ascending iteration over every record of a project.
    pub fn iter(&self, project: &ProjectUuid) -> StorageResult<sled::Iter> {
        let tree = self.tree(project)?;
        Ok(tree.iter())
    }

    /// Ascending iteration over keys starting with `prefix`.
    pub fn scan_prefix(&self, project: &ProjectUuid, prefix: &[u8]) -> StorageResult<sled::Iter> {
        let tree = self.tree(project)?;
        Ok(tree.scan_prefix(prefix))
    }

    /// Count keys, optionally restricted to a prefix.
    pub fn size(&self, project: &ProjectUuid, prefix: Option<&[u8]>) -> StorageResult<usize> {
        let tree = self.tree(project)?;
        match prefix {
            Some(prefix) => {
                let mut count = 0;
                for item in tree.scan_prefix(prefix).keys() {
                    item?;
                    count += 1;
                }
                Ok(count)
            }
            None => Ok(tree.len()),
        }
    }

    pub fn exists(&self, project: &ProjectUuid, key: &[u8]) -> StorageResult<bool> {
        let tree = self.tree(project)?;
        Ok(tree.contains_key(key)?)
    }

    /// Whether the project has any core graph records.
    pub fn project_index_exists(&self, project: &ProjectUuid) -> StorageResult<bool> {
        Ok(self.size(project, Some(keys::PATH_PREFIX.as_bytes()))? > 0
            || self.size(project, Some(keys::SYMBOL_PREFIX.as_bytes()))? > 0)
    }

    /// Total number of value writes since the store was opened. Visible to
    /// tests asserting that an unchanged workspace produces zero writes.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Flush dirty buffers to disk.
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("writes", &self.write_count())
            .finish()
    }
}
