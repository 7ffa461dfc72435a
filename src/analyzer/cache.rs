//! Bounded write-coalescing caches over persisted records.
//!
//! Both caches follow the same discipline: reads fill the cache from the
//! store, writes only mark entries dirty, and eviction or an explicit flush
//! pushes dirty entries back to the store. Losing an eviction is never an
//! option; the store is always updated before an entry leaves memory.

use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;

use crate::parsing::Language;
use crate::storage::{
    CalleeMapItem, Entry, GraphKey, GraphStore, Occurrence, ProjectUuid, StorageResult,
    SymbolOccurrence,
};

/// Write-coalescing cache for symbol-occurrence records.
///
/// Keeps the hottest symbol names in memory during indexing so repeated
/// upserts for the same name touch the store once instead of per element.
pub struct SymbolOccurrenceCache {
    cache: LruCache<Vec<u8>, SymbolOccurrence>,
    dirty: HashSet<Vec<u8>>,
}

impl SymbolOccurrenceCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least one");
        Self {
            cache: LruCache::new(capacity),
            dirty: HashSet::new(),
        }
    }

    /// Apply one definitional occurrence to the record for `name`.
    pub fn upsert(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        language: Language,
        name: &str,
        occurrence: Occurrence,
    ) -> StorageResult<()> {
        let key = GraphKey::symbol(language, name).encode();
        self.fill(store, project, language, name, &key)?;
        if let Some(record) = self.cache.get_mut(&key) {
            record.upsert(occurrence);
            self.dirty.insert(key);
        }
        Ok(())
    }

    /// Cached or stored record for `name`, if any occurrence exists.
    pub fn get(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        language: Language,
        name: &str,
    ) -> StorageResult<Option<SymbolOccurrence>> {
        let key = GraphKey::symbol(language, name).encode();
        self.fill(store, project, language, name, &key)?;
        Ok(self.cache.get(&key).filter(|r| !r.is_empty()).cloned())
    }

    fn fill(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        language: Language,
        name: &str,
        key: &[u8],
    ) -> StorageResult<()> {
        if self.cache.contains(key) {
            return Ok(());
        }
        let record = match store.get(project, key)? {
            Some(bytes) => SymbolOccurrence::from_bytes(&bytes)?,
            None => SymbolOccurrence::new(name, language),
        };
        if let Some((evicted_key, evicted)) = self.cache.push(key.to_vec(), record) {
            if evicted_key != key {
                self.write_back(store, project, &evicted_key, &evicted)?;
            }
        }
        Ok(())
    }

    fn write_back(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        key: &[u8],
        record: &SymbolOccurrence,
    ) -> StorageResult<()> {
        if !self.dirty.remove(key) {
            return Ok(());
        }
        if record.is_empty() {
            store.delete(project, key)?;
        } else {
            store.put(project, key, &record.to_bytes()?)?;
        }
        Ok(())
    }

    /// Persist every dirty entry. Returns how many records were written.
    pub fn flush(&mut self, store: &GraphStore, project: &ProjectUuid) -> StorageResult<usize> {
        let dirty: Vec<Vec<u8>> = self.dirty.iter().cloned().collect();
        let mut flushed = 0;
        for key in dirty {
            if let Some(record) = self.cache.peek(&key).cloned() {
                self.write_back(store, project, &key, &record)?;
                flushed += 1;
            } else {
                self.dirty.remove(&key);
            }
        }
        Ok(flushed)
    }

    /// Drop all cached state without writing. Used when the underlying
    /// records were rewritten out from under the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.dirty.clear();
    }
}

/// Bounded cache for the reverse call index.
///
/// Entries fill from the persisted `@callee:` records; eviction merges the
/// in-memory entry with the stored one (set-union, commutative) and writes
/// the result back.
pub struct CalleeMapCache {
    cache: LruCache<Vec<u8>, CalleeMapItem>,
    dirty: HashSet<Vec<u8>>,
}

impl CalleeMapCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least one");
        Self {
            cache: LruCache::new(capacity),
            dirty: HashSet::new(),
        }
    }

    /// Merge `item` into the entry for its `(name, arity)` pair.
    pub fn merge(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        item: CalleeMapItem,
    ) -> StorageResult<()> {
        let key = item.key().encode();
        self.fill(store, project, &item.callee_name, item.param_count, &key)?;
        if let Some(existing) = self.cache.get_mut(&key) {
            existing.merge(item);
            self.dirty.insert(key);
        }
        Ok(())
    }

    /// Entry for a `(name, arity)` pair, from cache or store.
    pub fn get(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        name: &str,
        param_count: u32,
    ) -> StorageResult<Option<CalleeMapItem>> {
        let key = GraphKey::callee(name, param_count).encode();
        self.fill(store, project, name, param_count, &key)?;
        Ok(self
            .cache
            .get(&key)
            .filter(|item| !item.targets.is_empty())
            .cloned())
    }

    fn fill(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        name: &str,
        param_count: u32,
        key: &[u8],
    ) -> StorageResult<()> {
        if self.cache.contains(key) {
            return Ok(());
        }
        let item = match store.get(project, key)? {
            Some(bytes) => CalleeMapItem::from_bytes(&bytes)?,
            None => CalleeMapItem::new(name, param_count),
        };
        if let Some((evicted_key, evicted)) = self.cache.push(key.to_vec(), item) {
            if evicted_key != key {
                self.write_back(store, project, &evicted_key, evicted)?;
            }
        }
        Ok(())
    }

    fn write_back(
        &mut self,
        store: &GraphStore,
        project: &ProjectUuid,
        key: &[u8],
        mut item: CalleeMapItem,
    ) -> StorageResult<()> {
        if !self.dirty.remove(key) {
            return Ok(());
        }
        // Another writer may have persisted in the meantime; union keeps both.
        if let Some(bytes) = store.get(project, key)? {
            let persisted = CalleeMapItem::from_bytes(&bytes)?;
            item.merge(persisted);
        }
        store.batch_save(
            project,
            vec![Entry::new(key.to_vec(), item.to_bytes()?)],
        )?;
        Ok(())
    }

    /// Persist every dirty entry.
    pub fn flush(&mut self, store: &GraphStore, project: &ProjectUuid) -> StorageResult<usize> {
        let dirty: Vec<Vec<u8>> = self.dirty.iter().cloned().collect();
        let mut flushed = 0;
        for key in dirty {
            if let Some(item) = self.cache.peek(&key).cloned() {
                self.write_back(store, project, &key, item)?;
                flushed += 1;
            } else {
                self.dirty.remove(&key);
            }
        }
        Ok(flushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CalleeTarget;
    use crate::types::{ElementType, Range};
    use std::path::PathBuf;

    fn project() -> ProjectUuid {
        ProjectUuid::from_root_path(&PathBuf::from("/virtual/cache-tests"))
    }

    fn occurrence(path: &str, line: u32) -> Occurrence {
        Occurrence {
            path: path.to_string(),
            range: Range::new(line, 0, line + 1, 1),
            element_type: ElementType::Function,
        }
    }

    #[test]
    fn test_upsert_coalesces_writes_until_flush() {
        let store = GraphStore::open_temporary().unwrap();
        let p = project();
        let mut cache = SymbolOccurrenceCache::new(16);

        cache
            .upsert(&store, &p, Language::Go, "F", occurrence("a.go", 1))
            .unwrap();
        cache
            .upsert(&store, &p, Language::Go, "F", occurrence("b.go", 5))
            .unwrap();
        // Nothing persisted yet.
        let key = GraphKey::symbol(Language::Go, "F").encode();
        assert_eq!(store.get(&p, &key).unwrap(), None);

        let flushed = cache.flush(&store, &p).unwrap();
        assert_eq!(flushed, 1);
        let record = SymbolOccurrence::from_bytes(&store.get(&p, &key).unwrap().unwrap()).unwrap();
        assert_eq!(record.occurrences.len(), 2);
    }

    #[test]
    fn test_eviction_writes_back() {
        let store = GraphStore::open_temporary().unwrap();
        let p = project();
        let mut cache = SymbolOccurrenceCache::new(2);

        cache
            .upsert(&store, &p, Language::Go, "A", occurrence("a.go", 1))
            .unwrap();
        cache
            .upsert(&store, &p, Language::Go, "B", occurrence("b.go", 1))
            .unwrap();
        // Capacity 2: loading C evicts the least-recently-used entry (A).
        cache
            .upsert(&store, &p, Language::Go, "C", occurrence("c.go", 1))
            .unwrap();

        let key_a = GraphKey::symbol(Language::Go, "A").encode();
        assert!(store.get(&p, &key_a).unwrap().is_some());
    }

    #[test]
    fn test_cache_reads_stored_record() {
        let store = GraphStore::open_temporary().unwrap();
        let p = project();

        let mut seed = SymbolOccurrence::new("F", Language::Go);
        seed.upsert(occurrence("a.go", 3));
        store
            .put(&p, &seed.key().encode(), &seed.to_bytes().unwrap())
            .unwrap();

        let mut cache = SymbolOccurrenceCache::new(4);
        let loaded = cache.get(&store, &p, Language::Go, "F").unwrap().unwrap();
        assert_eq!(loaded.occurrences.len(), 1);

        let missing = cache.get(&store, &p, Language::Go, "nope").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_callee_cache_merges_with_persisted_on_write_back() {
        let store = GraphStore::open_temporary().unwrap();
        let p = project();

        let target = |file: &str| CalleeTarget {
            symbol_name: "F".to_string(),
            file_path: file.to_string(),
            position: Range::default(),
            param_count: 0,
            score: 1.0,
        };

        // Persist one target out-of-band.
        let mut persisted = CalleeMapItem::new("F", 0);
        persisted.targets.push(target("x.go"));
        store
            .put(&p, &persisted.key().encode(), &persisted.to_bytes().unwrap())
            .unwrap();

        let mut cache = CalleeMapCache::new(4);
        let mut fresh = CalleeMapItem::new("F", 0);
        fresh.targets.push(target("y.go"));
        cache.merge(&store, &p, fresh).unwrap();
        cache.flush(&store, &p).unwrap();

        let key = GraphKey::callee("F", 0).encode();
        let merged = CalleeMapItem::from_bytes(&store.get(&p, &key).unwrap().unwrap()).unwrap();
        assert_eq!(merged.targets.len(), 2);
    }
}
