//! Selection handles and move/resize manipulation.

use crate::record::AnnotationId;
use crate::shapes::Shape;
use kurbo::{Affine, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 8.0;

/// Shapes never shrink below this extent while resizing.
const MIN_EXTENT: f64 = 1.0;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn of(self, rect: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(rect.x0, rect.y0),
            Corner::TopRight => Point::new(rect.x1, rect.y0),
            Corner::BottomLeft => Point::new(rect.x0, rect.y1),
            Corner::BottomRight => Point::new(rect.x1, rect.y1),
        }
    }

    fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }
}

/// A resize handle with its position (page coordinates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub position: Point,
    pub corner: Corner,
}

impl Handle {
    /// Check if a point hits this handle. `tolerance` should be adjusted for zoom.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Corner handles around a shape's bounds.
pub fn get_handles(shape: &Shape) -> Vec<Handle> {
    let bounds = shape.bounds();
    Corner::ALL
        .iter()
        .map(|&corner| Handle {
            position: corner.of(bounds),
            corner,
        })
        .collect()
}

/// Find which handle (if any) is hit at the given point.
pub fn hit_test_handles(shape: &Shape, point: Point, tolerance: f64) -> Option<Corner> {
    get_handles(shape)
        .into_iter()
        .find(|h| h.hit_test(point, tolerance))
        .map(|h| h.corner)
}

/// State of an active move or resize.
#[derive(Debug, Clone, PartialEq)]
pub struct ManipulationState {
    pub id: AnnotationId,
    /// The corner being dragged (None = moving the whole shape).
    pub handle: Option<Corner>,
    pub start_point: Point,
    pub current_point: Point,
    /// Shape as it was when the drag started.
    pub original_shape: Shape,
}

impl ManipulationState {
    pub fn new(id: AnnotationId, handle: Option<Corner>, start_point: Point, original_shape: Shape) -> Self {
        Self {
            id,
            handle,
            start_point,
            current_point: start_point,
            original_shape,
        }
    }

    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }

    /// The shape with the drag applied.
    pub fn preview(&self) -> Shape {
        apply_manipulation(&self.original_shape, self.handle, self.delta())
    }

    /// Whether the drag changed anything.
    pub fn is_noop(&self) -> bool {
        self.delta().hypot2() < f64::EPSILON
    }
}

/// Apply a move or corner resize to a shape. Returns the modified shape.
pub fn apply_manipulation(shape: &Shape, handle: Option<Corner>, delta: Vec2) -> Shape {
    let mut shape = shape.clone();
    match handle {
        None => shape.transform(Affine::translate(delta)),
        Some(corner) => {
            let bounds = shape.bounds();
            let fixed = corner.opposite().of(bounds);
            let dragged = corner.of(bounds) + delta;
            let target = Rect::from_points(fixed, dragged);
            let sx = axis_scale(bounds.width(), target.width());
            let sy = axis_scale(bounds.height(), target.height());
            // Scale about the fixed corner, then move it to the target origin.
            let origin = Point::new(bounds.x0, bounds.y0);
            let affine = Affine::translate(Vec2::new(target.x0, target.y0))
                * Affine::scale_non_uniform(sx, sy)
                * Affine::translate(-origin.to_vec2());
            shape.transform(affine);
        }
    }
    shape
}

fn axis_scale(from: f64, to: f64) -> f64 {
    if from < f64::EPSILON {
        1.0
    } else {
        to.max(MIN_EXTENT) / from
    }
}
