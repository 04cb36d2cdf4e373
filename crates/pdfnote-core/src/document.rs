//! Seams to the PDF-rendering collaborator and the view layer.

use crate::gateway::BoxFuture;
use image::{Rgba, RgbaImage};
use kurbo::Size;
use thiserror::Error;

/// Document errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to open document: {0}")]
    Open(String),
    #[error("Page {0} does not exist")]
    Page(u32),
    #[error("Failed to render page: {0}")]
    Render(String),
}

/// An opened PDF.
pub trait PdfDocument {
    fn page_count(&self) -> u32;

    /// Unscaled size of a 1-based page, in PDF points.
    fn page_size(&self, page: u32) -> Result<Size, DocumentError>;

    /// Rasterize a 1-based page. The image is `page_size * scale` pixels.
    fn render_page(&self, page: u32, scale: f64) -> BoxFuture<'_, Result<RgbaImage, DocumentError>>;
}

/// Opens documents from a locator (path or URL).
pub trait DocumentSource {
    fn open(&self, locator: &str) -> BoxFuture<'_, Result<Box<dyn PdfDocument>, DocumentError>>;
}

/// Host-side view collaborator: progress messages and viewport geometry.
pub trait ViewHost {
    /// Show a blocking status message, or hide it with `None`.
    fn show_status(&mut self, message: Option<&str>);

    /// Size of the scrollable viewport in screen pixels.
    fn viewport_size(&self) -> Size;
}

/// View with no visible surface.
#[derive(Debug, Clone, Default)]
pub struct HeadlessView {
    pub viewport: Size,
    /// Last status shown, if still visible.
    pub status: Option<String>,
}

impl HeadlessView {
    pub fn new(viewport: Size) -> Self {
        Self {
            viewport,
            status: None,
        }
    }
}

impl ViewHost for HeadlessView {
    fn show_status(&mut self, message: Option<&str>) {
        self.status = message.map(str::to_string);
    }

    fn viewport_size(&self) -> Size {
        self.viewport
    }
}

/// Document of blank white pages, for previews and headless hosts.
#[derive(Debug, Clone)]
pub struct BlankDocument {
    pages: Vec<Size>,
}

impl BlankDocument {
    pub fn new(pages: Vec<Size>) -> Self {
        Self { pages }
    }

    /// `count` pages of US Letter.
    pub fn letter(count: u32) -> Self {
        Self::new(vec![Size::new(612.0, 792.0); count as usize])
    }
}

impl PdfDocument for BlankDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page: u32) -> Result<Size, DocumentError> {
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or(DocumentError::Page(page))
    }

    fn render_page(&self, page: u32, scale: f64) -> BoxFuture<'_, Result<RgbaImage, DocumentError>> {
        Box::pin(async move {
            let size = self.page_size(page)?;
            let width = (size.width * scale).round() as u32;
            let height = (size.height * scale).round() as u32;
            if width == 0 || height == 0 {
                return Err(DocumentError::Render(format!(
                    "page {page} has no area at scale {scale}"
                )));
            }
            Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
        })
    }
}

/// Source that hands out a clone of one [`BlankDocument`] for any locator.
#[derive(Debug, Clone)]
pub struct BlankSource(pub BlankDocument);

impl DocumentSource for BlankSource {
    fn open(&self, locator: &str) -> BoxFuture<'_, Result<Box<dyn PdfDocument>, DocumentError>> {
        if locator.trim().is_empty() {
            return Box::pin(async { Err(DocumentError::Open("empty document path".into())) });
        }
        let document = self.0.clone();
        Box::pin(async move { Ok(Box::new(document) as Box<dyn PdfDocument>) })
    }
}
