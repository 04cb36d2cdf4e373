//! Rectangle shape. Also used by the highlighter tool (filled, no stroke).

use super::{ShapeStyle, ShapeTrait};
use kurbo::{Affine, BezPath, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Top-left corner position.
    pub position: Point,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
    /// Style properties.
    #[serde(default)]
    pub style: ShapeStyle,
}

impl Rectangle {
    /// Create a new rectangle.
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            position,
            width,
            height,
            style: ShapeStyle::default(),
        }
    }

    /// Create a rectangle from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let mut rect = Self::new(p1, 0.0, 0.0);
        rect.set_corners(p1, p2);
        rect
    }

    /// Stretch to the box spanned by two corners, in any drag direction.
    pub fn set_corners(&mut self, p1: Point, p2: Point) {
        self.position = Point::new(p1.x.min(p2.x), p1.y.min(p2.y));
        self.width = (p2.x - p1.x).abs();
        self.height = (p2.y - p1.y).abs();
    }

    /// Get the rectangle as a kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.position.x + self.width,
            self.position.y + self.height,
        )
    }
}

impl ShapeTrait for Rectangle {
    fn bounds(&self) -> Rect {
        self.as_rect()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let rect = self.as_rect();
        if self.style.fill_color.is_some() {
            // Filled: hit anywhere inside
            rect.inflate(tolerance, tolerance).contains(point)
        } else {
            // Outline only: hit on the border
            let reach = tolerance + self.style.stroke_width / 2.0;
            let outer = rect.inflate(reach, reach);
            let inner = rect.inflate(-reach, -reach);
            outer.contains(point) && !inner.contains(point)
        }
    }

    fn to_path(&self) -> BezPath {
        self.as_rect().to_path(0.1)
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn transform(&mut self, affine: Affine) {
        self.position = affine * self.position;
        let scale = affine.as_coeffs();
        self.width *= scale[0].abs();
        self.height *= scale[3].abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_any_direction() {
        let rect = Rectangle::from_corners(Point::new(100.0, 80.0), Point::new(40.0, 20.0));
        assert!((rect.position.x - 40.0).abs() < f64::EPSILON);
        assert!((rect.position.y - 20.0).abs() < f64::EPSILON);
        assert!((rect.width - 60.0).abs() < f64::EPSILON);
        assert!((rect.height - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outline_hit_test() {
        let rect = Rectangle::new(Point::new(0.0, 0.0), 100.0, 100.0);
        assert!(rect.hit_test(Point::new(0.0, 50.0), 2.0));
        assert!(!rect.hit_test(Point::new(50.0, 50.0), 2.0));
        assert!(!rect.hit_test(Point::new(200.0, 50.0), 2.0));
    }

    #[test]
    fn test_filled_hit_test() {
        let mut rect = Rectangle::new(Point::new(0.0, 0.0), 100.0, 100.0);
        rect.style = ShapeStyle::filled(super::super::SerializableColor::black());
        assert!(rect.hit_test(Point::new(50.0, 50.0), 0.0));
    }

    #[test]
    fn test_transform_scale_and_translate() {
        let mut rect = Rectangle::new(Point::new(10.0, 20.0), 30.0, 40.0);
        rect.transform(Affine::scale(2.0).then_translate(kurbo::Vec2::new(5.0, 5.0)));
        let b = rect.bounds();
        assert!((b.x0 - 25.0).abs() < f64::EPSILON);
        assert!((b.y0 - 45.0).abs() < f64::EPSILON);
        assert!((b.width() - 60.0).abs() < f64::EPSILON);
        assert!((b.height() - 80.0).abs() < f64::EPSILON);
    }
}
