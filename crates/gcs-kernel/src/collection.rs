//! [`IndexedCollection`] – positionally addressed, grow-only record list.
//!
//! The vehicle reports GPUs, disk partitions and network interfaces one
//! entry at a time, each tagged with a small integer index.  An update for an
//! index past the end grows the list with empty placeholders; later partial
//! updates merge into the existing slot and never replace it.

use gcs_types::{FieldMap, FieldMerge};
use serde::Serialize;

/// Grow-only list of mergeable records.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct IndexedCollection<T> {
    entries: Vec<T>,
}

impl<T> Default for IndexedCollection<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: FieldMerge + Default> IndexedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `fields` into the slot at `index`, growing with placeholders
    /// first when needed.  Returns the number of fields written.
    pub fn upsert(&mut self, index: usize, fields: &FieldMap) -> usize {
        if index >= self.entries.len() {
            self.entries.resize_with(index + 1, T::default);
        }
        self.entries[index].merge(fields)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }
}
