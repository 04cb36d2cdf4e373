//! In-memory gateway implementation.

use super::{BoxFuture, GatewayError, GatewayResult, PersistenceGateway};
use crate::record::{AnnotationId, AnnotationRecord};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// In-process backend for tests, demos and offline use.
///
/// Assigns UUID ids on create. [`MemoryGateway::fail_next`] makes the next
/// call reject, which is how the rollback paths are exercised.
#[derive(Default)]
pub struct MemoryGateway {
    records: RwLock<Vec<AnnotationRecord>>,
    fail_next: AtomicBool,
}

impl MemoryGateway {
    /// Create a new empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway pre-populated with records.
    pub fn with_records(records: Vec<AnnotationRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Make the next call fail with a network error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the stored records.
    pub fn records(&self) -> Vec<AnnotationRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    fn check_failure(&self) -> GatewayResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(GatewayError::Network("simulated failure".into()));
        }
        Ok(())
    }
}

fn lock_error(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Other(format!("Lock error: {}", e))
}

impl PersistenceGateway for MemoryGateway {
    fn load(&self) -> BoxFuture<'_, GatewayResult<Vec<AnnotationRecord>>> {
        Box::pin(async move {
            self.check_failure()?;
            let records = self.records.read().map_err(lock_error)?;
            Ok(records.clone())
        })
    }

    fn create(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>> {
        let mut record = record.clone();
        Box::pin(async move {
            self.check_failure()?;
            record.id = AnnotationId::Persisted(Uuid::new_v4().to_string());
            let mut records = self.records.write().map_err(lock_error)?;
            records.push(record.clone());
            Ok(record)
        })
    }

    fn update(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>> {
        let record = record.clone();
        Box::pin(async move {
            self.check_failure()?;
            let mut records = self.records.write().map_err(lock_error)?;
            let stored = records
                .iter_mut()
                .find(|r| r.id == record.id)
                .ok_or(GatewayError::Status(404))?;
            *stored = record.clone();
            Ok(record)
        })
    }

    fn delete(&self, id: &AnnotationId) -> BoxFuture<'_, GatewayResult<()>> {
        let id = id.clone();
        Box::pin(async move {
            self.check_failure()?;
            let mut records = self.records.write().map_err(lock_error)?;
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(GatewayError::Status(404));
            }
            Ok(())
        })
    }
}
