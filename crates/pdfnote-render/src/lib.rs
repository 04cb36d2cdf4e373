//! PdfNote Render Library
//!
//! Scene painting and flattened PDF export for PdfNote.
//! The default painter rasterizes on the CPU with tiny-skia, so exports work
//! headless.

mod callout;
mod export;
mod pdf;
mod raster;
mod renderer;

pub use callout::CalloutLayout;
pub use export::{
    EXPORT_FILENAME, EXPORT_SCALE, ExportCompositor, ExportError, ExportedPdf, JPEG_QUALITY, encode_jpeg,
};
pub use pdf::PdfWriter;
pub use raster::RasterPainter;
pub use renderer::{RenderContext, RenderResult, RendererError, SELECTION_COLOR, ScenePainter};
