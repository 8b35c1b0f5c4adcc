//! Record store trait.
//!
//! The record store is the authoritative owner of memory records. The engine
//! assumes only this contract; durability, encoding and index layout belong to
//! the implementation.
//!
//! # Error Modes and Guarantees
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Record absent | `Ok(None)` / `Ok(false)` / empty `Vec` |
//! | Backend down | `Err(Error::StorageUnavailable)` |
//! | Duplicate id on `create` | `Err(Error::InvalidInput)` |
//! | Illegal status transition on `update` | `Err(Error::InvalidInput)` |
//!
//! The engine never retries a failed call; retry policy belongs to the store.

use crate::cancellation::Cancellation;
use crate::models::{
    ConsolidationStatus, Importance, Memory, MemoryContent, MemoryId, MemoryLinks, MemoryType,
};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Trait for record store backends.
///
/// Methods take `&self`; implementations use interior mutability so a store
/// can be shared behind `Arc<dyn MemoryStore>`.
pub trait MemoryStore: Send + Sync {
    /// Stores a new record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is already taken or the backend fails.
    fn create(&self, memory: Memory) -> Result<MemoryId>;

    /// Reads a record by id, incrementing its access count.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn read(&self, id: &MemoryId) -> Result<Option<Memory>>;

    /// Applies a partial update and returns the updated record, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the update is illegal or the backend fails.
    fn update(&self, id: &MemoryId, update: &MemoryUpdate) -> Result<Option<Memory>>;

    /// Deletes a record. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete(&self, id: &MemoryId) -> Result<bool>;

    /// Returns records matching the query without touching access counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn search(&self, query: &MemoryQuery) -> Result<Vec<Memory>>;

    /// Returns records linked to the given file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_by_file(&self, path: &str) -> Result<Vec<Memory>>;

    /// Reads several records, skipping absent ids.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure.
    fn read_many(&self, ids: &[MemoryId]) -> Result<Vec<Memory>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(memory) = self.read(id)? {
                out.push(memory);
            }
        }
        Ok(out)
    }

    /// Counts one read of `id` and returns the new access count, or `None`
    /// if the record is absent.
    ///
    /// Stores that can bump the counter without loading the record should
    /// override this.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn record_access(&self, id: &MemoryId) -> Result<Option<u64>> {
        Ok(self.read(id)?.map(|m| m.access_count))
    }

    /// Returns the ids of records matching the query, in `search` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn search_ids(&self, query: &MemoryQuery) -> Result<Vec<MemoryId>> {
        Ok(self.search(query)?.into_iter().map(|m| m.id).collect())
    }

    /// Pages through every record matching `query`, `page_size` at a time.
    ///
    /// The query's own `limit` and `offset` are replaced per page. The
    /// cancellation token is checked before each page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero page size, the first
    /// backend failure, or [`Error::Cancelled`].
    fn search_all(
        &self,
        query: &MemoryQuery,
        page_size: usize,
        cancel: &Cancellation,
    ) -> Result<Vec<Memory>> {
        if page_size == 0 {
            return Err(Error::InvalidInput("page size must be > 0".to_string()));
        }
        let mut out = Vec::new();
        loop {
            cancel.check("search_all")?;
            let page = self.search(&query.clone().with_offset(out.len()).with_limit(page_size))?;
            let done = page.len() < page_size;
            out.extend(page);
            if done {
                return Ok(out);
            }
        }
    }
}

impl<T: MemoryStore + ?Sized> MemoryStore for Arc<T> {
    fn create(&self, memory: Memory) -> Result<MemoryId> {
        (**self).create(memory)
    }

    fn read(&self, id: &MemoryId) -> Result<Option<Memory>> {
        (**self).read(id)
    }

    fn update(&self, id: &MemoryId, update: &MemoryUpdate) -> Result<Option<Memory>> {
        (**self).update(id, update)
    }

    fn delete(&self, id: &MemoryId) -> Result<bool> {
        (**self).delete(id)
    }

    fn search(&self, query: &MemoryQuery) -> Result<Vec<Memory>> {
        (**self).search(query)
    }

    fn find_by_file(&self, path: &str) -> Result<Vec<Memory>> {
        (**self).find_by_file(path)
    }

    fn read_many(&self, ids: &[MemoryId]) -> Result<Vec<Memory>> {
        (**self).read_many(ids)
    }

    fn record_access(&self, id: &MemoryId) -> Result<Option<u64>> {
        (**self).record_access(id)
    }

    fn search_ids(&self, query: &MemoryQuery) -> Result<Vec<MemoryId>> {
        (**self).search_ids(query)
    }

    fn search_all(
        &self,
        query: &MemoryQuery,
        page_size: usize,
        cancel: &Cancellation,
    ) -> Result<Vec<Memory>> {
        (**self).search_all(query, page_size, cancel)
    }
}

/// Search filter for [`MemoryStore::search`].
///
/// Empty filters match everything. `tags` matches records carrying any of the
/// listed tags; `text` is a case-insensitive substring match over all text fields.
/// `live_only` drops superseded records and pruned episodes before `offset`
/// and `limit` are applied, so a page never comes back short because of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryQuery {
    /// Allowed ids.
    pub ids: Vec<MemoryId>,
    /// Allowed memory types.
    pub types: Vec<MemoryType>,
    /// Required tags (any of).
    pub tags: Vec<String>,
    /// Free-text substring.
    pub text: Option<String>,
    /// Only records for which [`Memory::is_live`] holds.
    pub live_only: bool,
    /// Matching records to skip before the first result.
    pub offset: usize,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl MemoryQuery {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given ids.
    #[must_use]
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = MemoryId>) -> Self {
        self.ids.extend(ids);
        self
    }

    /// Restricts to the given types.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = MemoryType>) -> Self {
        self.types.extend(types);
        self
    }

    /// Restricts to records carrying any of the given tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Restricts to records whose text contains `text`.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Drops superseded records and pruned episodes.
    #[must_use]
    pub const fn live_only(mut self) -> Self {
        self.live_only = true;
        self
    }

    /// Skips the first `offset` matches.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `memory` passes every filter.
    #[must_use]
    pub fn matches(&self, memory: &Memory) -> bool {
        if self.live_only && !memory.is_live() {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.contains(&memory.id) {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&memory.memory_type()) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| memory.tags.contains(t)) {
            return false;
        }
        if let Some(text) = self.text.as_deref().filter(|t| !t.trim().is_empty()) {
            let needle = text.to_lowercase();
            return memory
                .text_fields()
                .iter()
                .any(|f| f.to_lowercase().contains(&needle));
        }
        true
    }
}

/// Partial update for [`MemoryStore::update`]. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUpdate {
    /// New summary.
    pub summary: Option<String>,
    /// New confidence (clamped on apply).
    pub confidence: Option<f64>,
    /// New importance.
    pub importance: Option<Importance>,
    /// Replacement tag set.
    pub tags: Option<BTreeSet<String>>,
    /// Record this one replaces.
    pub supersedes: Option<MemoryId>,
    /// Record replacing this one.
    pub superseded_by: Option<MemoryId>,
    /// Replacement codebase links.
    pub links: Option<MemoryLinks>,
    /// New consolidation status (episodic records only).
    pub consolidation_status: Option<ConsolidationStatus>,
}

impl MemoryUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the importance.
    #[must_use]
    pub const fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Marks the record as superseded by `id`.
    #[must_use]
    pub fn with_superseded_by(mut self, id: impl Into<MemoryId>) -> Self {
        self.superseded_by = Some(id.into());
        self
    }

    /// Sets the consolidation status.
    #[must_use]
    pub const fn with_consolidation_status(mut self, status: ConsolidationStatus) -> Self {
        self.consolidation_status = Some(status);
        self
    }

    /// Returns true if the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.confidence.is_none()
            && self.importance.is_none()
            && self.tags.is_none()
            && self.supersedes.is_none()
            && self.superseded_by.is_none()
            && self.links.is_none()
            && self.consolidation_status.is_none()
    }

    /// Applies the update to `memory` in place and refreshes `updated_at`.
    ///
    /// Validation happens before any field is written, so a rejected update
    /// leaves the record untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a status is set on a non-episodic
    /// record or the status transition is not allowed.
    pub fn apply(&self, memory: &mut Memory) -> Result<()> {
        let next_status = match (self.consolidation_status, &memory.content) {
            (None, _) => None,
            (Some(to), MemoryContent::Episodic(p)) => {
                let next = p.consolidation_status.transition(to).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "illegal consolidation transition {} -> {to} for {}",
                        p.consolidation_status, memory.id
                    ))
                })?;
                Some(next)
            },
            (Some(_), _) => {
                return Err(Error::InvalidInput(format!(
                    "consolidation status only applies to episodic records, {} is {}",
                    memory.id,
                    memory.memory_type()
                )));
            },
        };

        if let Some(summary) = &self.summary {
            memory.summary.clone_from(summary);
        }
        if let Some(confidence) = self.confidence {
            memory.confidence = confidence.into();
        }
        if let Some(importance) = self.importance {
            memory.importance = importance;
        }
        if let Some(tags) = &self.tags {
            memory.tags.clone_from(tags);
        }
        if let Some(id) = &self.supersedes {
            memory.supersedes = Some(id.clone());
        }
        if let Some(id) = &self.superseded_by {
            memory.superseded_by = Some(id.clone());
        }
        if let Some(links) = &self.links {
            memory.links.clone_from(links);
        }
        if let (Some(status), MemoryContent::Episodic(p)) = (next_status, &mut memory.content) {
            p.consolidation_status = status;
        }
        memory.updated_at = Utc::now();
        Ok(())
    }
}
