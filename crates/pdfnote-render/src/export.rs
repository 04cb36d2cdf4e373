//! Flattened PDF export.
//!
//! Every page is rendered at [`EXPORT_SCALE`], its annotations are projected
//! with the same function the interactive view uses, and the composited page
//! is embedded as a JPEG in a new PDF. Comments are painted over a white
//! callout box and also written as PDF text, hidden when the painter already
//! drew them.

use crate::callout::CalloutLayout;
use crate::pdf::PdfWriter;
use crate::raster::RasterPainter;
use crate::renderer::{RenderContext, RendererError, ScenePainter};
use image::RgbaImage;
use image::codecs::jpeg::JpegEncoder;
use kurbo::Vec2;
use pdfnote_core::document::{DocumentError, PdfDocument, ViewHost};
use pdfnote_core::editor::{Editor, ExportParts};
use pdfnote_core::projection::project_shapes;
use pdfnote_core::store::AnnotationStore;
use std::cell::{Cell, RefCell};
use thiserror::Error;

/// Resolution multiplier for exported pages.
pub const EXPORT_SCALE: f64 = 2.0;
/// JPEG quality for exported pages.
pub const JPEG_QUALITY: u8 = 90;
/// Name offered for the exported file.
pub const EXPORT_FILENAME: &str = "PdfNote-Annotated.pdf";

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("An export is already in progress")]
    Busy,
    #[error("No document is loaded")]
    NoDocument,
    #[error("Failed to render page: {0}")]
    Render(String),
    #[error("Failed to encode page: {0}")]
    Encode(String),
    #[error("Failed to write PDF: {0}")]
    Pdf(String),
}

impl From<DocumentError> for ExportError {
    fn from(e: DocumentError) -> Self {
        ExportError::Render(e.to_string())
    }
}

impl From<RendererError> for ExportError {
    fn from(e: RendererError) -> Self {
        ExportError::Render(e.to_string())
    }
}

impl From<lopdf::Error> for ExportError {
    fn from(e: lopdf::Error) -> Self {
        ExportError::Pdf(e.to_string())
    }
}

/// The finished download.
#[derive(Debug, Clone)]
pub struct ExportedPdf {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub pages: u32,
}

/// Encode a composited page as an RGB JPEG.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Resets the busy flag when an export ends, however it ends.
struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Runs exports one at a time.
pub struct ExportCompositor<P: ScenePainter = RasterPainter> {
    painter: RefCell<P>,
    busy: Cell<bool>,
}

impl ExportCompositor<RasterPainter> {
    pub fn new() -> Self {
        Self::with_painter(RasterPainter::new())
    }
}

impl Default for ExportCompositor<RasterPainter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ScenePainter> ExportCompositor<P> {
    pub fn with_painter(painter: P) -> Self {
        Self {
            painter: RefCell::new(painter),
            busy: Cell::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Export the editor's document with all of its annotations.
    pub async fn export_editor(&self, editor: &mut Editor) -> Result<ExportedPdf, ExportError> {
        let parts = editor.export_parts().ok_or(ExportError::NoDocument)?;
        self.export(parts).await
    }

    /// Export every page. Progress goes to the view; the status is cleared
    /// when the export ends. A call made while another export is running
    /// fails with [`ExportError::Busy`] and leaves the running one alone.
    pub async fn export(&self, parts: ExportParts<'_>) -> Result<ExportedPdf, ExportError> {
        if self.busy.replace(true) {
            log::warn!("Export requested while another export is running");
            return Err(ExportError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let ExportParts {
            document,
            store,
            offset,
            view,
        } = parts;
        let result = self.compose(document, store, offset, &mut *view).await;
        view.show_status(None);
        match &result {
            Ok(pdf) => log::info!("Exported {} pages ({} bytes)", pdf.pages, pdf.bytes.len()),
            Err(e) => log::error!("Error exporting PDF: {}", e),
        }
        result
    }

    async fn compose(
        &self,
        document: &dyn PdfDocument,
        store: &AnnotationStore,
        offset: Vec2,
        view: &mut dyn ViewHost,
    ) -> Result<ExportedPdf, ExportError> {
        let count = document.page_count();
        if count == 0 {
            return Err(ExportError::NoDocument);
        }
        let mut writer = PdfWriter::new();
        for page in 1..=count {
            view.show_status(Some(&format!("Processing page {} of {}...", page, count)));
            let size = document.page_size(page)?;
            let raster = document.render_page(page, EXPORT_SCALE).await?;

            let projected = project_shapes(store.list_by_page(page), EXPORT_SCALE, offset);
            let callouts: Vec<CalloutLayout> = projected
                .iter()
                .filter_map(|p| p.callout(EXPORT_SCALE))
                .map(CalloutLayout::new)
                .collect();
            let ctx = RenderContext::new(&raster)
                .with_shapes(projected.into_iter().map(|p| p.shape).collect())
                .with_callouts(callouts);
            let composed = self.painter.borrow_mut().paint(&ctx)?;
            let text_visible = !self.painter.borrow().draws_callout_text();

            let jpeg = encode_jpeg(&composed, JPEG_QUALITY)?;
            log::debug!(
                "Page {}: {}x{} pt ({}), {} callouts, {} byte JPEG",
                page,
                size.width,
                size.height,
                if size.width > size.height { "landscape" } else { "portrait" },
                ctx.callouts.len(),
                jpeg.len()
            );
            writer.add_page(
                size,
                composed.dimensions(),
                jpeg,
                &ctx.callouts,
                EXPORT_SCALE,
                text_visible,
            )?;
        }
        Ok(ExportedPdf {
            filename: EXPORT_FILENAME.to_string(),
            bytes: writer.finish()?,
            pages: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use kurbo::{Point, Size};
    use lopdf::content::Content;
    use lopdf::{Document, Object};
    use pdfnote_core::document::{BlankDocument, HeadlessView};
    use pdfnote_core::gateway::BoxFuture;
    use pdfnote_core::record::AnnotationRecord;
    use pdfnote_core::shapes::{Rectangle, SerializableColor, Shape, ShapeStyle};
    use pollster::block_on;
    use std::future::{Future, poll_fn};
    use std::pin::pin;
    use std::rc::Rc;
    use std::task::{Context, Poll, Waker};

    fn commented_store(page: u32) -> AnnotationStore {
        let mut rect = Rectangle::new(Point::new(100.0, 200.0), 80.0, 50.0);
        rect.style = ShapeStyle::stroked(SerializableColor::new(0, 0, 255, 255), 2.0);
        let record = AnnotationRecord::new(page, "alice", &Shape::Rectangle(rect)).with_comment("Check this");
        let mut store = AnnotationStore::new();
        store.add(record);
        store
    }

    fn parts<'a>(
        document: &'a dyn PdfDocument,
        store: &'a AnnotationStore,
        view: &'a mut HeadlessView,
    ) -> ExportParts<'a> {
        ExportParts {
            document,
            store,
            offset: Vec2::ZERO,
            view,
        }
    }

    fn page_text_ops(doc: &Document, page: u32) -> Vec<(f32, f32, Vec<u8>)> {
        let id = doc.get_pages()[&page];
        let content = Content::decode(&doc.get_page_content(id).unwrap()).unwrap();
        let mut position = (0.0, 0.0);
        let mut shown = Vec::new();
        for op in content.operations {
            match op.operator.as_str() {
                "Td" => {
                    position = (
                        op.operands[0].as_float().unwrap(),
                        op.operands[1].as_float().unwrap(),
                    )
                }
                "Tj" => {
                    if let Object::String(bytes, _) = &op.operands[0] {
                        shown.push((position.0, position.1, bytes.clone()));
                    }
                }
                _ => {}
            }
        }
        shown
    }

    #[test]
    fn test_one_page_with_callout() {
        let document = BlankDocument::letter(1);
        let store = commented_store(1);
        let mut view = HeadlessView::default();
        let compositor = ExportCompositor::new();

        let pdf = block_on(compositor.export(parts(&document, &store, &mut view))).unwrap();
        assert_eq!(pdf.filename, "PdfNote-Annotated.pdf");
        assert_eq!(pdf.pages, 1);
        assert!(view.status.is_none());
        assert!(!compositor.is_busy());

        let doc = Document::load_mem(&pdf.bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page = doc.get_dictionary(pages[&1]).unwrap();
        let media_box: Vec<f32> = page
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        assert_eq!(media_box, vec![0.0, 0.0, 612.0, 792.0]);

        let text = page_text_ops(&doc, 1);
        assert_eq!(text.len(), 1);
        let (x, y, bytes) = &text[0];
        assert_eq!(bytes, b"Check this");
        assert!((x - 100.0).abs() < 1e-3);
        // Above the shape's top edge (792 - 200 in PDF space).
        assert!(*y > 592.0);
    }

    #[test]
    fn test_non_latin_comment_survives_export() {
        let mut rect = Rectangle::new(Point::new(100.0, 200.0), 200.0, 50.0);
        rect.style = ShapeStyle::stroked(SerializableColor::new(0, 0, 255, 255), 2.0);
        let comment = "\u{201c}Revisar\u{201d} \u{8bf7}\u{68c0}\u{67e5}";
        let mut store = AnnotationStore::new();
        store.add(AnnotationRecord::new(1, "alice", &Shape::Rectangle(rect)).with_comment(comment));
        let document = BlankDocument::letter(1);
        let mut view = HeadlessView::default();
        let compositor = ExportCompositor::with_painter(RasterPainter::with_fonts(Default::default()));

        let pdf = block_on(compositor.export(parts(&document, &store, &mut view))).unwrap();
        let doc = Document::load_mem(&pdf.bytes).unwrap();
        let text = page_text_ops(&doc, 1);
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].2, b"\x93Revisar\x94 ???".to_vec());

        let id = doc.get_pages()[&1];
        let ops = Content::decode(&doc.get_page_content(id).unwrap()).unwrap().operations;
        let actual = ops
            .iter()
            .find(|op| op.operator == "BDC")
            .and_then(|op| op.operands[1].as_dict().ok())
            .and_then(|d| d.get(b"ActualText").ok())
            .and_then(|o| o.as_str().ok())
            .unwrap();
        let units: Vec<u16> = actual[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(String::from_utf16(&units).unwrap(), comment);
        // No fonts to paint with, so the text layer stays visible.
        let mode = ops.iter().find(|op| op.operator == "Tr").unwrap();
        assert_eq!(mode.operands[0].as_i64().unwrap(), 0);
    }

    #[test]
    fn test_image_is_rendered_at_export_scale() {
        let document = BlankDocument::new(vec![Size::new(300.0, 200.0), Size::new(200.0, 300.0)]);
        let store = AnnotationStore::new();
        let mut view = HeadlessView::default();
        let pdf = block_on(ExportCompositor::new().export(parts(&document, &store, &mut view))).unwrap();

        let doc = Document::load_mem(&pdf.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        let images: Vec<(i64, i64)> = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| s.dict.get(b"Subtype").and_then(|v| v.as_name()).ok() == Some(b"Image".as_slice()))
            .map(|s| {
                (
                    s.dict.get(b"Width").unwrap().as_i64().unwrap(),
                    s.dict.get(b"Height").unwrap().as_i64().unwrap(),
                )
            })
            .collect();
        assert_eq!(images.len(), 2);
        assert!(images.contains(&(600, 400)));
        assert!(images.contains(&(400, 600)));
    }

    #[test]
    fn test_annotations_are_painted_into_the_page() {
        let mut rect = Rectangle::new(Point::new(10.0, 10.0), 50.0, 50.0);
        rect.style = ShapeStyle::filled(SerializableColor::black());
        let mut store = AnnotationStore::new();
        store.add(AnnotationRecord::new(1, "alice", &Shape::Rectangle(rect)));
        let document = BlankDocument::letter(1);

        let raster = block_on(document.render_page(1, EXPORT_SCALE)).unwrap();
        let projected = project_shapes(store.list_by_page(1), EXPORT_SCALE, Vec2::ZERO);
        let ctx = RenderContext::new(&raster).with_shapes(projected.into_iter().map(|p| p.shape).collect());
        let composed = RasterPainter::with_fonts(Default::default()).paint(&ctx).unwrap();
        assert_eq!(composed.get_pixel(60, 60).0, [0, 0, 0, 255]);
        assert_eq!(composed.get_pixel(130, 130).0, [255, 255, 255, 255]);

        let jpeg = encode_jpeg(&composed, JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let document = BlankDocument::new(Vec::new());
        let store = AnnotationStore::new();
        let mut view = HeadlessView::default();
        let result = block_on(ExportCompositor::new().export(parts(&document, &store, &mut view)));
        assert!(matches!(result, Err(ExportError::NoDocument)));
    }

    /// Renders only once `open` is set.
    struct GatedDocument {
        inner: BlankDocument,
        open: Rc<Cell<bool>>,
    }

    impl PdfDocument for GatedDocument {
        fn page_count(&self) -> u32 {
            self.inner.page_count()
        }

        fn page_size(&self, page: u32) -> Result<Size, DocumentError> {
            self.inner.page_size(page)
        }

        fn render_page(&self, page: u32, scale: f64) -> BoxFuture<'_, Result<RgbaImage, DocumentError>> {
            Box::pin(async move {
                poll_fn(|_| {
                    if self.open.get() {
                        Poll::Ready(())
                    } else {
                        Poll::Pending
                    }
                })
                .await;
                self.inner.render_page(page, scale).await
            })
        }
    }

    #[test]
    fn test_overlapping_export_is_busy() {
        let open = Rc::new(Cell::new(false));
        let document = GatedDocument {
            inner: BlankDocument::letter(1),
            open: open.clone(),
        };
        let store = AnnotationStore::new();
        let mut first_view = HeadlessView::default();
        let mut second_view = HeadlessView::default();
        let compositor = ExportCompositor::new();

        let mut first = pin!(compositor.export(parts(&document, &store, &mut first_view)));
        let mut cx = Context::from_waker(Waker::noop());
        assert!(first.as_mut().poll(&mut cx).is_pending());
        assert!(compositor.is_busy());

        let second = block_on(compositor.export(parts(&document, &store, &mut second_view)));
        assert!(matches!(second, Err(ExportError::Busy)));

        open.set(true);
        let pdf = block_on(first).unwrap();
        assert_eq!(pdf.pages, 1);
        assert!(!compositor.is_busy());
    }

    #[test]
    fn test_failed_page_aborts_and_clears_status() {
        struct Broken;
        impl PdfDocument for Broken {
            fn page_count(&self) -> u32 {
                2
            }
            fn page_size(&self, _page: u32) -> Result<Size, DocumentError> {
                Ok(Size::new(100.0, 100.0))
            }
            fn render_page(&self, page: u32, _scale: f64) -> BoxFuture<'_, Result<RgbaImage, DocumentError>> {
                Box::pin(async move {
                    if page == 2 {
                        Err(DocumentError::Render("corrupt page".into()))
                    } else {
                        Ok(RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255])))
                    }
                })
            }
        }

        let store = AnnotationStore::new();
        let mut view = HeadlessView::default();
        let compositor = ExportCompositor::new();
        let result = block_on(compositor.export(parts(&Broken, &store, &mut view)));
        assert!(matches!(result, Err(ExportError::Render(_))));
        assert!(view.status.is_none());
        assert!(!compositor.is_busy());
    }

    #[test]
    fn test_export_editor_without_document() {
        use pdfnote_core::config::EditorConfig;
        use pdfnote_core::document::BlankSource;

        let mut editor = Editor::new(
            EditorConfig::new("doc.pdf"),
            BlankSource(BlankDocument::letter(1)),
            HeadlessView::default(),
        );
        let compositor = ExportCompositor::new();
        assert!(matches!(
            block_on(compositor.export_editor(&mut editor)),
            Err(ExportError::NoDocument)
        ));
        block_on(editor.load()).unwrap();
        let pdf = block_on(compositor.export_editor(&mut editor)).unwrap();
        assert_eq!(pdf.pages, 1);
    }
}
