//! Scene painter abstraction.

use crate::callout::CalloutLayout;
use image::RgbaImage;
use kurbo::Rect;
use pdfnote_core::editor::{FLASH_COLOR, Scene};
use pdfnote_core::shapes::Shape;
use peniko::Color;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Render failed: {0}")]
    RenderFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Stroke width used to flash shapes that have no outline.
const FLASH_STROKE_WIDTH: f64 = 2.0;

/// Outline color for the selected shape's bounds.
pub const SELECTION_COLOR: Color = Color::from_rgba8(59, 130, 246, 255);

/// Everything composited over one page raster, in raster pixels.
pub struct RenderContext<'a> {
    /// The rendered page.
    pub page: &'a RgbaImage,
    /// Shapes in paint order, already projected onto the raster.
    pub shapes: Vec<Shape>,
    /// Comment callouts, painted after the shapes.
    pub callouts: Vec<CalloutLayout>,
    /// Outline of the selected shape.
    pub selection_rect: Option<Rect>,
    /// Selection highlight color.
    pub selection_color: Color,
}

impl<'a> RenderContext<'a> {
    pub fn new(page: &'a RgbaImage) -> Self {
        Self {
            page,
            shapes: Vec::new(),
            callouts: Vec::new(),
            selection_rect: None,
            selection_color: SELECTION_COLOR,
        }
    }

    /// Context for the interactive view. `None` until a page has rendered.
    ///
    /// The flashed shape is outlined in the accent color.
    pub fn from_scene(scene: &Scene<'a>) -> Option<Self> {
        let page = scene.raster?;
        let mut shapes: Vec<Shape> = scene
            .shapes
            .iter()
            .map(|(id, shape)| {
                let mut shape = shape.clone();
                if scene.flashed.as_ref() == Some(id) {
                    let style = shape.style_mut();
                    style.stroke_color = FLASH_COLOR;
                    if style.stroke_width <= 0.0 {
                        style.stroke_width = FLASH_STROKE_WIDTH;
                    }
                }
                shape
            })
            .collect();
        shapes.extend(scene.preview.clone());
        Some(
            Self::new(page)
                .with_shapes(shapes)
                .with_selection_rect(scene.selection),
        )
    }

    pub fn with_shapes(mut self, shapes: Vec<Shape>) -> Self {
        self.shapes = shapes;
        self
    }

    pub fn with_callouts(mut self, callouts: Vec<CalloutLayout>) -> Self {
        self.callouts = callouts;
        self
    }

    pub fn with_selection_rect(mut self, rect: Option<Rect>) -> Self {
        self.selection_rect = rect;
        self
    }
}

/// Composites shapes over a page raster.
///
/// Callout backgrounds are always painted. Callout text is painted only when
/// [`ScenePainter::draws_callout_text`] says so; otherwise the export shows it
/// as PDF text.
pub trait ScenePainter {
    fn paint(&mut self, ctx: &RenderContext<'_>) -> RenderResult<RgbaImage>;

    fn draws_callout_text(&self) -> bool {
        false
    }
}
