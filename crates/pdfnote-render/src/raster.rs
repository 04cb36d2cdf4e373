//! CPU scene painter.
//!
//! Shapes become `tiny-skia` paths painted over a premultiplied copy of the
//! page raster. Callout text is laid out by `usvg` with the system fonts, so
//! any script those fonts cover ends up in the image.

use crate::callout::CalloutLayout;
use crate::renderer::{RenderContext, RenderResult, RendererError, ScenePainter};
use image::RgbaImage;
use kurbo::{BezPath, PathEl, Shape as KurboShape};
use pdfnote_core::shapes::{SerializableColor, Shape};
use resvg::tiny_skia::{self, FillRule, IntSize, Paint, PathBuilder, Pixmap, Stroke, Transform};
use resvg::usvg::{self, fontdb};
use std::fmt;
use std::sync::Arc;

const SELECTION_STROKE_WIDTH: f32 = 1.5;

/// Families tried for callout text, in order.
const CALLOUT_FONT_FAMILY: &str =
    "Helvetica, Arial, 'Noto Sans', 'Noto Sans CJK SC', 'DejaVu Sans', sans-serif";

fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn paint_for(color: SerializableColor) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn fill(pixmap: &mut Pixmap, path: &tiny_skia::Path, color: SerializableColor) {
    pixmap.fill_path(path, &paint_for(color), FillRule::Winding, Transform::identity(), None);
}

fn stroke(pixmap: &mut Pixmap, path: &tiny_skia::Path, width: f32, color: SerializableColor) {
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    pixmap.stroke_path(path, &paint_for(color), &stroke, Transform::identity(), None);
}

/// Premultiplied copy of a page raster. `None` for an empty raster.
fn pixmap_from_image(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut data = image.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        for channel in &mut px[..3] {
            *channel = ((*channel as u16 * alpha + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size)
}

fn image_from_pixmap(pixmap: Pixmap) -> Option<RgbaImage> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let mut data = pixmap.take();
    for px in data.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        if alpha == 0 || alpha == 255 {
            continue;
        }
        for channel in &mut px[..3] {
            *channel = ((*channel as u16 * 255 + alpha / 2) / alpha).min(255) as u8;
        }
    }
    RgbaImage::from_raw(width, height, data)
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// SVG document holding the text of one callout, in box-local coordinates.
fn callout_svg(callout: &CalloutLayout) -> String {
    let bounds = callout.bounds();
    let color = callout.callout.text_color;
    let mut svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}"><text font-family="{}" font-size="{}" fill="#{:02x}{:02x}{:02x}" fill-opacity="{}">"##,
        bounds.width().ceil().max(1.0),
        bounds.height().ceil().max(1.0),
        CALLOUT_FONT_FAMILY,
        callout.callout.font_size,
        color.r,
        color.g,
        color.b,
        color.a as f64 / 255.0,
    );
    for (origin, line) in callout.baselines() {
        if line.is_empty() {
            continue;
        }
        svg.push_str(&format!(
            r#"<tspan x="{}" y="{}">{}</tspan>"#,
            origin.x - bounds.x0,
            origin.y - bounds.y0,
            escape_xml(line)
        ));
    }
    svg.push_str("</text></svg>");
    svg
}

/// Software [`ScenePainter`].
pub struct RasterPainter {
    fonts: Arc<fontdb::Database>,
}

impl RasterPainter {
    /// Painter that draws callout text with the system fonts.
    pub fn new() -> Self {
        let mut fonts = fontdb::Database::new();
        fonts.load_system_fonts();
        log::debug!("Loaded {} font faces for callout text", fonts.len());
        Self::with_fonts(fonts)
    }

    pub fn with_fonts(fonts: fontdb::Database) -> Self {
        Self {
            fonts: Arc::new(fonts),
        }
    }

    pub fn has_fonts(&self) -> bool {
        !self.fonts.is_empty()
    }

    fn render_shape(&self, pixmap: &mut Pixmap, shape: &Shape) {
        let Some(path) = to_skia_path(&shape.to_path()) else {
            return;
        };
        let style = shape.style();
        if let Some(fill_color) = style.fill_with_opacity() {
            fill(pixmap, &path, fill_color.into());
        }
        if style.has_stroke() {
            stroke(
                pixmap,
                &path,
                style.stroke_width as f32,
                style.stroke_with_opacity().into(),
            );
        }
    }

    fn render_callout(&self, pixmap: &mut Pixmap, callout: &CalloutLayout) {
        let bounds = callout.bounds();
        if let Some(background) = to_skia_path(&bounds.to_path(0.1)) {
            fill(pixmap, &background, callout.callout.background);
        }
        if !self.has_fonts() {
            return;
        }
        let mut options = usvg::Options::default();
        options.fontdb = self.fonts.clone();
        match usvg::Tree::from_str(&callout_svg(callout), &options) {
            Ok(tree) => resvg::render(
                &tree,
                Transform::from_translate(bounds.x0 as f32, bounds.y0 as f32),
                &mut pixmap.as_mut(),
            ),
            Err(e) => log::warn!("Failed to lay out callout text: {}", e),
        }
    }
}

impl Default for RasterPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RasterPainter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterPainter")
            .field("font_faces", &self.fonts.len())
            .finish()
    }
}

impl ScenePainter for RasterPainter {
    fn paint(&mut self, ctx: &RenderContext<'_>) -> RenderResult<RgbaImage> {
        let mut pixmap = pixmap_from_image(ctx.page)
            .ok_or_else(|| RendererError::RenderFailed("page raster is empty".into()))?;
        for shape in &ctx.shapes {
            self.render_shape(&mut pixmap, shape);
        }
        if let Some(path) = ctx.selection_rect.and_then(|rect| to_skia_path(&rect.to_path(0.1))) {
            stroke(
                &mut pixmap,
                &path,
                SELECTION_STROKE_WIDTH,
                ctx.selection_color.into(),
            );
        }
        for callout in &ctx.callouts {
            self.render_callout(&mut pixmap, callout);
        }
        image_from_pixmap(pixmap)
            .ok_or_else(|| RendererError::RenderFailed("pixmap size mismatch".into()))
    }

    fn draws_callout_text(&self) -> bool {
        self.has_fonts()
    }
}
