//! Read-through cache layer over any record store.

use crate::models::{Memory, MemoryId};
use crate::storage::cache::{CacheStats, L1Cache};
use crate::storage::traits::{MemoryQuery, MemoryStore, MemoryUpdate};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::instrument;

/// A [`MemoryStore`] with an [`L1Cache`] in front of reads and searches.
///
/// Reads fill the cache on a miss; `create`, `update` and `delete` write
/// through to the inner store and then invalidate the cached copy.
///
/// A cache hit still counts as a read of the record: the hit is forwarded to
/// [`MemoryStore::record_access`] and the cached copy is patched with the
/// stored count. If the store is down the hit is served uncounted.
///
/// Searches ask the inner store for matching ids only, serve the ids that are
/// cached, and fetch the rest in one batch that then fills the cache.
#[derive(Debug)]
pub struct CachedMemoryStore<S: MemoryStore> {
    inner: S,
    cache: L1Cache<MemoryId, Memory>,
}

impl<S: MemoryStore> CachedMemoryStore<S> {
    /// Wraps `inner` with a cache of the given capacity.
    #[must_use]
    pub fn new(inner: S, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: L1Cache::new(capacity),
        }
    }

    /// Returns the wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the cache.
    pub const fn cache(&self) -> &L1Cache<MemoryId, Memory> {
        &self.cache
    }

    /// Drops cached copies of `ids`.
    pub fn invalidate<'a>(&self, ids: impl IntoIterator<Item = &'a MemoryId>) -> usize {
        let dropped = ids.into_iter().filter(|id| self.cache.delete(id)).count();
        if dropped > 0 {
            tracing::debug!(dropped, "invalidated cached memories");
        }
        dropped
    }

    /// Returns cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Resolves `ids` to records, cached copies first, preserving order.
    ///
    /// Ids that vanish between the id search and the batch fetch are skipped.
    fn resolve(&self, ids: Vec<MemoryId>) -> Result<Vec<Memory>> {
        let mut slots: Vec<(MemoryId, Option<Memory>)> = ids
            .into_iter()
            .map(|id| {
                let cached = self.cache.get(&id);
                (id, cached)
            })
            .collect();

        let missing: Vec<MemoryId> = slots
            .iter()
            .filter(|(_, cached)| cached.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        if !missing.is_empty() {
            let fetched = self.inner.search(&MemoryQuery::new().with_ids(missing))?;
            let mut by_id: HashMap<MemoryId, Memory> =
                fetched.into_iter().map(|m| (m.id.clone(), m)).collect();
            for (id, slot) in &mut slots {
                if slot.is_none()
                    && let Some(memory) = by_id.remove(&*id)
                {
                    self.cache.set(id.clone(), memory.clone());
                    *slot = Some(memory);
                }
            }
        }

        Ok(slots.into_iter().filter_map(|(_, memory)| memory).collect())
    }
}

impl<S: MemoryStore> MemoryStore for CachedMemoryStore<S> {
    fn create(&self, memory: Memory) -> Result<MemoryId> {
        let id = self.inner.create(memory)?;
        self.cache.delete(&id);
        Ok(id)
    }

    #[instrument(skip(self), fields(operation = "cached_read", memory_id = %id))]
    fn read(&self, id: &MemoryId) -> Result<Option<Memory>> {
        if let Some(mut memory) = self.cache.get(id) {
            match self.inner.record_access(id) {
                Ok(Some(count)) => {
                    let at = Some(Utc::now());
                    memory.access_count = count;
                    memory.last_accessed = at;
                    self.cache.update(id, |cached| {
                        cached.access_count = count;
                        cached.last_accessed = at;
                    });
                },
                Ok(None) => {
                    self.cache.delete(id);
                    return Ok(None);
                },
                Err(e) => {
                    tracing::warn!(error = %e, "serving cached memory without counting the access");
                },
            }
            return Ok(Some(memory));
        }
        let memory = self.inner.read(id)?;
        if let Some(m) = &memory {
            self.cache.set(id.clone(), m.clone());
        }
        Ok(memory)
    }

    fn update(&self, id: &MemoryId, update: &MemoryUpdate) -> Result<Option<Memory>> {
        let result = self.inner.update(id, update);
        self.cache.delete(id);
        result
    }

    fn delete(&self, id: &MemoryId) -> Result<bool> {
        let result = self.inner.delete(id);
        self.cache.delete(id);
        result
    }

    fn search(&self, query: &MemoryQuery) -> Result<Vec<Memory>> {
        let ids = self.inner.search_ids(query)?;
        self.resolve(ids)
    }

    fn search_ids(&self, query: &MemoryQuery) -> Result<Vec<MemoryId>> {
        self.inner.search_ids(query)
    }

    fn find_by_file(&self, path: &str) -> Result<Vec<Memory>> {
        let found = self.inner.find_by_file(path)?;
        Ok(found
            .into_iter()
            .map(|memory| {
                self.cache.get(&memory.id).unwrap_or_else(|| {
                    self.cache.set(memory.id.clone(), memory.clone());
                    memory
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoryContent, TribalPayload};
    use crate::storage::InMemoryMemoryStore;

    fn tribal(id: &str) -> Memory {
        Memory::new(id, "original", MemoryContent::Tribal(TribalPayload::default()))
    }

    fn store() -> CachedMemoryStore<InMemoryMemoryStore> {
        let inner = InMemoryMemoryStore::with_memories([tribal("mem-1")]);
        CachedMemoryStore::new(inner, NonZeroUsize::new(4).unwrap())
    }

    #[test]
    fn test_read_fills_cache() {
        let s = store();
        let id = MemoryId::new("mem-1");
        s.read(&id).unwrap();
        s.read(&id).unwrap();

        let stats = s.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_hits_count_as_store_reads() {
        let s = store();
        let id = MemoryId::new("mem-1");
        for _ in 0..3 {
            s.read(&id).unwrap();
        }
        let served = s.read(&id).unwrap().unwrap();

        assert_eq!(s.stats().hits, 3);
        assert_eq!(served.access_count, 4);
        assert!(served.last_accessed.is_some());
        let stored = s.inner().peek(&id).unwrap();
        assert_eq!(stored.access_count, 4);
        assert_eq!(s.cache().get(&id).unwrap().access_count, 4);
    }

    #[test]
    fn test_hit_on_record_deleted_behind_cache() {
        let s = store();
        let id = MemoryId::new("mem-1");
        s.read(&id).unwrap();
        s.inner().delete(&id).unwrap();

        assert!(s.read(&id).unwrap().is_none());
        assert!(!s.cache().contains(&id));
    }

    #[test]
    fn test_search_serves_cached_and_fills_misses() {
        let inner = InMemoryMemoryStore::with_memories([tribal("mem-1"), tribal("mem-2")]);
        let s = CachedMemoryStore::new(inner, NonZeroUsize::new(4).unwrap());
        s.read(&MemoryId::new("mem-1")).unwrap();

        let found = s.search(&MemoryQuery::new()).unwrap();
        let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["mem-1", "mem-2"]);
        assert_eq!(s.stats().hits, 1);
        assert!(s.cache().contains(&MemoryId::new("mem-2")));

        // Searches never count as reads.
        assert_eq!(s.inner().peek(&MemoryId::new("mem-2")).unwrap().access_count, 0);
        s.read(&MemoryId::new("mem-2")).unwrap();
        assert_eq!(s.stats().hits, 2);
    }

    #[test]
    fn test_search_all_pages_through_cache() {
        let inner = InMemoryMemoryStore::with_memories((0..7).map(|i| tribal(&format!("mem-{i}"))));
        let s = CachedMemoryStore::new(inner, NonZeroUsize::new(16).unwrap());
        let all = s
            .search_all(&MemoryQuery::new(), 3, &crate::Cancellation::none())
            .unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(s.cache().size(), 7);
    }

    #[test]
    fn test_update_invalidates() {
        let s = store();
        let id = MemoryId::new("mem-1");
        s.read(&id).unwrap();
        s.update(&id, &MemoryUpdate::new().with_summary("changed"))
            .unwrap();
        assert!(!s.cache().contains(&id));
        assert_eq!(s.read(&id).unwrap().unwrap().summary, "changed");
    }

    #[test]
    fn test_cache_survives_store_outage_for_hits_only() {
        let s = store();
        let id = MemoryId::new("mem-1");
        s.read(&id).unwrap();
        s.inner().set_available(false);
        assert!(s.read(&id).unwrap().is_some());
        assert!(s.read(&MemoryId::new("mem-2")).is_err());
    }

    #[test]
    fn test_invalidate_counts_dropped() {
        let s = store();
        let id = MemoryId::new("mem-1");
        s.read(&id).unwrap();
        assert_eq!(s.invalidate([&id, &MemoryId::new("mem-9")]), 1);
    }
}
