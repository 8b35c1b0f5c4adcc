//! In-memory record store.
//!
//! Fast, non-persistent implementation of [`MemoryStore`] for tests,
//! benchmarks and embedding the engine without a durable backend.

use crate::models::{Memory, MemoryId};
use crate::storage::traits::{MemoryQuery, MemoryStore, MemoryUpdate};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory record store.
///
/// Records are kept in id order, so `search` results are deterministic.
/// [`set_available`](Self::set_available) simulates an outage: while
/// unavailable every call fails with [`Error::StorageUnavailable`].
#[derive(Debug)]
pub struct InMemoryMemoryStore {
    memories: RwLock<BTreeMap<MemoryId, Memory>>,
    available: AtomicBool,
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self {
            memories: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `memories`. Later duplicates win.
    #[must_use]
    pub fn with_memories(memories: impl IntoIterator<Item = Memory>) -> Self {
        let map = memories.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            memories: RwLock::new(map),
            available: AtomicBool::new(true),
        }
    }

    /// Switches simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memories.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a record without counting the access.
    #[must_use]
    pub fn peek(&self, id: &MemoryId) -> Option<Memory> {
        self.memories.read().ok()?.get(id).cloned()
    }

    fn ensure_available(&self, operation: &str) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::storage(operation, "store is unavailable"))
        }
    }

    fn read_guard(
        &self,
        operation: &str,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<MemoryId, Memory>>> {
        self.ensure_available(operation)?;
        self.memories
            .read()
            .map_err(|e| Error::storage(operation, e.to_string()))
    }

    /// Matches in id order, after `offset` and up to `limit`.
    fn matching<'a>(
        memories: &'a BTreeMap<MemoryId, Memory>,
        query: &'a MemoryQuery,
    ) -> Box<dyn Iterator<Item = &'a Memory> + 'a> {
        let limit = query.limit.unwrap_or(usize::MAX);
        let found: Box<dyn Iterator<Item = &'a Memory> + 'a> = if query.ids.is_empty() {
            Box::new(memories.values())
        } else {
            let mut ids: Vec<&MemoryId> = query.ids.iter().collect();
            ids.sort();
            ids.dedup();
            Box::new(ids.into_iter().filter_map(|id| memories.get(id)))
        };
        Box::new(
            found
                .filter(|m| query.matches(m))
                .skip(query.offset)
                .take(limit),
        )
    }

    fn write_guard(
        &self,
        operation: &str,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<MemoryId, Memory>>> {
        self.ensure_available(operation)?;
        self.memories
            .write()
            .map_err(|e| Error::storage(operation, e.to_string()))
    }
}

impl MemoryStore for InMemoryMemoryStore {
    fn create(&self, memory: Memory) -> Result<MemoryId> {
        if memory.id.as_str().trim().is_empty() {
            return Err(Error::InvalidInput("memory id must not be empty".to_string()));
        }
        let mut memories = self.write_guard("create")?;
        if memories.contains_key(&memory.id) {
            return Err(Error::InvalidInput(format!(
                "memory {} already exists",
                memory.id
            )));
        }
        let id = memory.id.clone();
        memories.insert(id.clone(), memory);
        Ok(id)
    }

    fn read(&self, id: &MemoryId) -> Result<Option<Memory>> {
        let mut memories = self.write_guard("read")?;
        Ok(memories.get_mut(id).map(|m| {
            m.touch();
            m.clone()
        }))
    }

    fn update(&self, id: &MemoryId, update: &MemoryUpdate) -> Result<Option<Memory>> {
        let mut memories = self.write_guard("update")?;
        let Some(memory) = memories.get_mut(id) else {
            return Ok(None);
        };
        update.apply(memory)?;
        Ok(Some(memory.clone()))
    }

    fn delete(&self, id: &MemoryId) -> Result<bool> {
        Ok(self.write_guard("delete")?.remove(id).is_some())
    }

    fn search(&self, query: &MemoryQuery) -> Result<Vec<Memory>> {
        let memories = self.read_guard("search")?;
        Ok(Self::matching(&memories, query).cloned().collect())
    }

    fn search_ids(&self, query: &MemoryQuery) -> Result<Vec<MemoryId>> {
        let memories = self.read_guard("search_ids")?;
        Ok(Self::matching(&memories, query).map(|m| m.id.clone()).collect())
    }

    fn record_access(&self, id: &MemoryId) -> Result<Option<u64>> {
        let mut memories = self.write_guard("record_access")?;
        Ok(memories.get_mut(id).map(|m| {
            m.touch();
            m.access_count
        }))
    }

    fn find_by_file(&self, path: &str) -> Result<Vec<Memory>> {
        let memories = self.read_guard("find_by_file")?;
        Ok(memories
            .values()
            .filter(|m| m.links.files.contains(path))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cancellation;
    use crate::models::{MemoryContent, MemoryType, TribalPayload};

    fn tribal(id: &str) -> Memory {
        Memory::new(id, format!("summary {id}"), MemoryContent::Tribal(TribalPayload::default()))
    }

    #[test]
    fn test_crud_roundtrip() {
        let store = InMemoryMemoryStore::new();
        let id = store.create(tribal("mem-1")).unwrap();
        assert_eq!(id.as_str(), "mem-1");

        let read = store.read(&id).unwrap().unwrap();
        assert_eq!(read.summary, "summary mem-1");

        let updated = store
            .update(&id, &MemoryUpdate::new().with_summary("changed"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.summary, "changed");

        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.read(&id).unwrap().is_none());
    }

    #[test]
    fn test_read_increments_access_count() {
        let store = InMemoryMemoryStore::with_memories([tribal("mem-1")]);
        let id = MemoryId::new("mem-1");
        store.read(&id).unwrap();
        let second = store.read(&id).unwrap().unwrap();
        assert_eq!(second.access_count, 2);
        assert_eq!(store.peek(&id).unwrap().access_count, 2);
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let store = InMemoryMemoryStore::new();
        store.create(tribal("mem-1")).unwrap();
        assert!(matches!(
            store.create(tribal("mem-1")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_search_and_find_by_file() {
        let store = InMemoryMemoryStore::with_memories([
            tribal("mem-1").with_file("src/a.rs"),
            tribal("mem-2"),
            tribal("mem-3").with_file("src/a.rs"),
        ]);

        let all = store
            .search(&MemoryQuery::new().with_types([MemoryType::Tribal]))
            .unwrap();
        assert_eq!(all.len(), 3);
        let limited = store.search(&MemoryQuery::new().with_limit(2)).unwrap();
        assert_eq!(limited.len(), 2);
        let page = store
            .search_ids(&MemoryQuery::new().with_offset(2).with_limit(2))
            .unwrap();
        assert_eq!(page, [MemoryId::new("mem-3")]);
        assert_eq!(store.find_by_file("src/a.rs").unwrap().len(), 2);
    }

    #[test]
    fn test_search_all_pages_past_limit() {
        let store = InMemoryMemoryStore::with_memories(
            (0..25).map(|i| tribal(&format!("mem-{i:03}"))),
        );
        let all = store
            .search_all(&MemoryQuery::new().with_limit(3), 10, &Cancellation::none())
            .unwrap();
        assert_eq!(all.len(), 25);
        assert_eq!(all[24].id.as_str(), "mem-024");

        let err = store
            .search_all(&MemoryQuery::new(), 0, &Cancellation::none())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_record_access_bumps_count() {
        let store = InMemoryMemoryStore::with_memories([tribal("mem-1")]);
        let id = MemoryId::new("mem-1");
        assert_eq!(store.record_access(&id).unwrap(), Some(1));
        assert_eq!(store.record_access(&id).unwrap(), Some(2));
        assert_eq!(store.record_access(&MemoryId::new("mem-9")).unwrap(), None);
        assert!(store.peek(&id).unwrap().last_accessed.is_some());
    }

    #[test]
    fn test_unavailable_store_fails() {
        let store = InMemoryMemoryStore::with_memories([tribal("mem-1")]);
        store.set_available(false);
        let err = store.read(&MemoryId::new("mem-1")).unwrap_err();
        assert!(err.is_storage_unavailable());
        store.set_available(true);
        assert!(store.read(&MemoryId::new("mem-1")).unwrap().is_some());
    }
}
