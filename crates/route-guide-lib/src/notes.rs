//! Concurrent per-location note registry
//!
//! Notes are grouped by the location they were sent for. The registry is shared by every
//! chat session of the process; it is sharded so that appends to different locations do
//! not wait on each other.

use crate::{Point, RouteNote};
use dashmap::DashMap;

/// Append-only map from location to the notes sent there, in arrival order
#[derive(Debug, Default)]
pub struct NoteRegistry {
    /// Keyed by [`Point::registry_key`]
    notes: DashMap<String, Vec<RouteNote>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl NoteRegistry {
    pub fn new() -> Self {
        Self {
            notes: DashMap::new(),
        }
    }

    /// Append a note and return every note recorded at its location so far
    ///
    /// The push and the copy happen under the same shard lock, so the returned snapshot
    /// always ends with `note` and no other append to that location can land in between.
    pub fn append(&self, note: RouteNote) -> Vec<RouteNote> {
        let key = note.location.registry_key();
        let mut entry = self.notes.entry(key).or_default();
        entry.push(note);
        entry.value().clone()
    }

    /// Copy of the notes recorded at a location (empty if none)
    pub fn notes_at(&self, point: &Point) -> Vec<RouteNote> {
        self.notes
            .get(&point.registry_key())
            .map(|notes| notes.value().clone())
            .unwrap_or_default()
    }

    /// Number of distinct locations with at least one note
    #[inline]
    pub fn location_count(&self) -> usize {
        self.notes.len()
    }

    /// Total number of notes across all locations
    pub fn note_count(&self) -> usize {
        self.notes.iter().map(|entry| entry.value().len()).sum()
    }
}
