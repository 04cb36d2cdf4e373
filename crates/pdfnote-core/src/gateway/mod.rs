//! Persistence gateway abstraction.
//!
//! The editor talks to its backend through four verbs. Every call is
//! asynchronous and may fail; callers treat failures as recoverable and roll
//! their optimistic local state back.

mod memory;

#[cfg(feature = "http")]
mod http;

pub use memory::MemoryGateway;

#[cfg(feature = "http")]
pub use http::HttpGateway;

use crate::record::{AnnotationId, AnnotationRecord};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use thiserror::Error;

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Backend responded with status {0}")]
    Status(u16),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Gateway error: {0}")]
    Other(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Boxed future for async operations. Not `Send`: the editor is single-threaded.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Backend for annotation records.
pub trait PersistenceGateway {
    /// Fetch every stored annotation.
    fn load(&self) -> BoxFuture<'_, GatewayResult<Vec<AnnotationRecord>>>;

    /// Store a new annotation. The returned record carries the backend id.
    fn create(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>>;

    /// Replace an existing annotation.
    fn update(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>>;

    /// Delete an annotation.
    fn delete(&self, id: &AnnotationId) -> BoxFuture<'_, GatewayResult<()>>;
}

/// Shared gateways, so a host can keep a handle to the backend it gave away.
impl<G: PersistenceGateway + ?Sized> PersistenceGateway for Rc<G> {
    fn load(&self) -> BoxFuture<'_, GatewayResult<Vec<AnnotationRecord>>> {
        (**self).load()
    }

    fn create(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>> {
        (**self).create(record)
    }

    fn update(&self, record: &AnnotationRecord) -> BoxFuture<'_, GatewayResult<AnnotationRecord>> {
        (**self).update(record)
    }

    fn delete(&self, id: &AnnotationId) -> BoxFuture<'_, GatewayResult<()>> {
        (**self).delete(id)
    }
}
