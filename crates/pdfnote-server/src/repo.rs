//! In-memory annotation repository.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// An annotation as it travels over the wire.
///
/// `geometry` is stored as-is; the server never looks inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub page: u32,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub geometry: serde_json::Value,
    #[serde(default)]
    pub comment: String,
}

struct Stored {
    /// Insertion order, so listings are stable.
    seq: u64,
    record: AnnotationRecord,
}

/// Annotation storage shared by all handlers.
#[derive(Default)]
pub struct AnnotationRepo {
    records: DashMap<String, Stored>,
    next_seq: AtomicU64,
}

impl AnnotationRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// All annotations in creation order.
    pub fn list(&self) -> Vec<AnnotationRecord> {
        let mut entries: Vec<(u64, AnnotationRecord)> = self
            .records
            .iter()
            .map(|entry| (entry.seq, entry.record.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, record)| record).collect()
    }

    /// Store a new annotation under a fresh id. Any client-sent id is ignored.
    pub fn create(&self, mut record: AnnotationRecord) -> AnnotationRecord {
        let id = Uuid::new_v4().to_string();
        record.id = Some(id.clone());
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.records.insert(
            id,
            Stored {
                seq,
                record: record.clone(),
            },
        );
        record
    }

    /// Replace an annotation. The id in the path wins over the body.
    pub fn update(&self, id: &str, mut record: AnnotationRecord) -> Option<AnnotationRecord> {
        let mut stored = self.records.get_mut(id)?;
        record.id = Some(id.to_string());
        stored.record = record.clone();
        Some(record)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.records.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
