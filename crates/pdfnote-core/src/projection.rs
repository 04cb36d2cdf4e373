//! Page-to-canvas projection shared by the interactive view and export.
//!
//! Both paths place stored shapes on a raster of the page rendered at some
//! scale. Using one function for both keeps exported annotations exactly where
//! they appear on screen.

use crate::record::{AnnotationId, AnnotationRecord};
use crate::shapes::{SerializableColor, Shape};
use kurbo::{Affine, Point, Rect, Vec2};

/// Minimum callout width in page units (scaled with the export).
pub const CALLOUT_MIN_WIDTH: f64 = 150.0;
/// Callout font size in page units.
pub const CALLOUT_FONT_SIZE: f64 = 8.0;
/// Gap between a shape and its callout in page units.
pub const CALLOUT_MARGIN: f64 = 3.0;

/// Transform from page coordinates to a raster rendered at `scale`.
///
/// `offset` is in page units and applied before scaling.
pub fn projection_transform(scale: f64, offset: Vec2) -> Affine {
    Affine::scale(scale) * Affine::translate(offset)
}

/// Project one shape. Stroke widths scale with the content.
pub fn project_shape(shape: &Shape, scale: f64, offset: Vec2) -> Shape {
    shape.transformed(projection_transform(scale, offset))
}

/// A record placed on a scaled raster.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedShape {
    pub id: AnnotationId,
    pub shape: Shape,
    pub comment: String,
}

impl ProjectedShape {
    /// Callout for this shape, if it carries a comment.
    pub fn callout(&self, scale: f64) -> Option<Callout> {
        if self.comment.trim().is_empty() {
            return None;
        }
        Some(Callout::above(
            self.shape.bounds(),
            scale,
            self.comment.clone(),
            self.shape.text_color(),
        ))
    }
}

/// Decode and project `records`. Records with undecodable geometry are
/// skipped with a warning.
pub fn project_shapes<'a>(
    records: impl IntoIterator<Item = &'a AnnotationRecord>,
    scale: f64,
    offset: Vec2,
) -> Vec<ProjectedShape> {
    records
        .into_iter()
        .filter_map(|record| match record.shape() {
            Ok(shape) => Some(ProjectedShape {
                id: record.id.clone(),
                shape: project_shape(&shape, scale, offset),
                comment: record.comment.clone(),
            }),
            Err(e) => {
                log::warn!("Skipping annotation {}: bad geometry: {}", record.id, e);
                None
            }
        })
        .collect()
}

/// A comment label drawn above a shape.
///
/// `anchor` is the bottom-left corner; the label grows upward from there as
/// the text wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct Callout {
    pub anchor: Point,
    pub width: f64,
    pub font_size: f64,
    pub text: String,
    pub text_color: SerializableColor,
    pub background: SerializableColor,
}

impl Callout {
    /// Callout for already projected `bounds` on a raster at `scale`.
    pub fn above(bounds: Rect, scale: f64, text: String, text_color: SerializableColor) -> Self {
        Self {
            anchor: Point::new(bounds.x0, bounds.y0 - CALLOUT_MARGIN * scale),
            width: bounds.width().max(CALLOUT_MIN_WIDTH * scale),
            font_size: CALLOUT_FONT_SIZE * scale,
            text,
            text_color,
            background: SerializableColor::white(),
        }
    }
}
