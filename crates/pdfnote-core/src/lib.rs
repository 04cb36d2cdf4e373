//! PdfNote Core Library
//!
//! Platform-agnostic annotation model and editing logic for the PdfNote PDF
//! annotator. Rendering and export live in `pdfnote-render`.

pub mod camera;
pub mod canvas;
pub mod config;
pub mod document;
pub mod editor;
pub mod events;
pub mod gateway;
pub mod page_sync;
pub mod projection;
pub mod record;
pub mod selection;
pub mod session;
pub mod shapes;
pub mod store;
pub mod tools;

pub use camera::{Camera, ZoomAction};
pub use canvas::{HandleFlags, ShapeHandle, ShapeLayer};
pub use config::{ConfigError, EditorConfig, Theme};
pub use document::{DocumentError, DocumentSource, PdfDocument, ViewHost};
pub use editor::{CompletedWrite, ContextMenu, Editor, EditorError, PendingRender, PendingWrite, Scene, Tooltip};
pub use events::{AnnotationEvent, EventBus, EventKind};
pub use gateway::{GatewayError, MemoryGateway, PersistenceGateway};
pub use page_sync::{PageSynchronizer, RenderTicket};
pub use projection::{Callout, ProjectedShape, project_shapes};
pub use record::{AnnotationId, AnnotationRecord, Geometry};
pub use selection::ManipulationState;
pub use session::Session;
pub use shapes::{SerializableColor, Shape, ShapeStyle};
pub use store::AnnotationStore;
pub use tools::{ToolKind, ToolManager};

#[cfg(feature = "http")]
pub use gateway::HttpGateway;
