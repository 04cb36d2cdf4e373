//! In-memory annotation store.
//!
//! The store is the single owner of annotation records. Everything rendered on
//! the shape layer is derived from it, and every optimistic mutation made
//! before the backend answers is reversible through [`AnnotationStore::rollback`]
//! or [`AnnotationStore::restore`].

use crate::record::{AnnotationId, AnnotationRecord};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct AnnotationStore {
    records: Vec<AnnotationRecord>,
    next_temp_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection. Records with duplicate or temporary ids
    /// are dropped with a warning.
    pub fn load(&mut self, initial: Vec<AnnotationRecord>) {
        let mut seen = HashSet::new();
        self.records = initial
            .into_iter()
            .filter(|record| {
                if record.id.is_temporary() {
                    log::warn!("Ignoring loaded annotation without a backend id");
                    return false;
                }
                if !seen.insert(record.id.clone()) {
                    log::warn!("Ignoring duplicate annotation id {}", record.id);
                    return false;
                }
                true
            })
            .collect();
        log::debug!("Loaded {} annotations", self.records.len());
    }

    /// Append a record under a fresh temporary id and return that id.
    pub fn add(&mut self, mut record: AnnotationRecord) -> AnnotationId {
        self.next_temp_id += 1;
        let id = AnnotationId::Temporary(self.next_temp_id);
        record.id = id.clone();
        self.records.push(record);
        id
    }

    /// Rename a temporary record to the id the backend assigned.
    ///
    /// Returns the updated record, or `None` when `temp_id` is unknown or the
    /// confirmed id is unusable.
    pub fn confirm(
        &mut self,
        temp_id: &AnnotationId,
        confirmed: &AnnotationRecord,
    ) -> Option<&AnnotationRecord> {
        if !temp_id.is_temporary() || confirmed.id.is_temporary() {
            return None;
        }
        if self.find_by_id(&confirmed.id).is_some() {
            log::warn!("Backend returned id {} which is already in use", confirmed.id);
            return None;
        }
        let record = self.records.iter_mut().find(|r| &r.id == temp_id)?;
        record.id = confirmed.id.clone();
        Some(&*record)
    }

    /// Remove a record that was never confirmed.
    pub fn rollback(&mut self, temp_id: &AnnotationId) -> Option<AnnotationRecord> {
        if !temp_id.is_temporary() {
            return None;
        }
        self.remove(temp_id)
    }

    /// Replace geometry and comment of an existing record.
    ///
    /// `page`, `user` and `created_at` are taken from the stored record. Returns
    /// the previous version, or `None` for unknown ids.
    pub fn update(&mut self, record: &AnnotationRecord) -> Option<AnnotationRecord> {
        let stored = self.records.iter_mut().find(|r| r.id == record.id)?;
        let previous = stored.clone();
        stored.geometry = record.geometry.clone();
        stored.comment = record.comment.clone();
        Some(previous)
    }

    /// Put back a previously stored version (used when an update is rejected).
    pub fn restore(&mut self, previous: AnnotationRecord) {
        match self.records.iter_mut().find(|r| r.id == previous.id) {
            Some(stored) => *stored = previous,
            None => log::debug!("Not restoring {}: record is gone", previous.id),
        }
    }

    pub fn remove(&mut self, id: &AnnotationId) -> Option<AnnotationRecord> {
        let index = self.records.iter().position(|r| &r.id == id)?;
        Some(self.records.remove(index))
    }

    pub fn find_by_id(&self, id: &AnnotationId) -> Option<&AnnotationRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn list_by_page(&self, page: u32) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.iter().filter(move |r| r.page == page)
    }

    /// Records with a non-empty comment, in insertion order.
    pub fn list_with_comments(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.iter().filter(|r| r.has_comment())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
