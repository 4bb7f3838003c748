//! Dedup index over channel ids
//!
//! Overlapping city/category searches routinely return the same channel.
//! The index is consulted twice: before a detail fetch, so quota is not
//! spent re-enriching a known channel, and before appending to the result
//! set, so no two accepted records share an id.

use std::collections::HashSet;

/// Set of channel ids already encountered this run
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores an index from a checkpoint's id set
    pub fn from_ids<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self {
            seen: ids.into_iter().collect(),
        }
    }

    /// Returns true if the id has been marked this run
    pub fn seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Marks an id; returns true if it was new
    pub fn mark(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    /// Number of ids marked
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True if nothing has been marked
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Snapshot of all marked ids, for checkpointing
    pub fn ids(&self) -> Vec<String> {
        self.seen.iter().cloned().collect()
    }
}
