//! Drawing tools and the pointer-gesture state machine.

use crate::shapes::{
    Ellipse, Freehand, Rectangle, SIMPLIFY_TOLERANCE, SerializableColor, Shape, ShapeStyle,
};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Alpha applied to the active color by the highlighter.
pub const HIGHLIGHTER_ALPHA: u8 = 0x80;

/// Color a new session starts with.
pub const DEFAULT_COLOR: SerializableColor = SerializableColor {
    r: 0xe5,
    g: 0x39,
    b: 0x35,
    a: 0xff,
};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Select,
    Pan,
    #[serde(rename = "rect")]
    Rectangle,
    Ellipse,
    Freehand,
    Highlighter,
}

impl ToolKind {
    /// Tools that create annotations.
    pub fn is_drawing(self) -> bool {
        matches!(
            self,
            ToolKind::Rectangle | ToolKind::Ellipse | ToolKind::Freehand | ToolKind::Highlighter
        )
    }
}

/// State of a pointer gesture.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolState {
    /// Waiting for a pointer-down.
    #[default]
    Idle,
    /// Dragging out a rectangle, ellipse or highlight.
    Drawing {
        anchor: Point,
        current: Point,
        shape: Shape,
    },
    /// Capturing freehand ink.
    Capturing { stroke: Freehand },
    /// Dragging the view. `last` is in screen coordinates.
    Panning { last: Point },
}

/// Manages the current tool, the active style and the gesture in progress.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current state of the gesture.
    pub state: ToolState,
    /// Color applied to new shapes.
    pub color: SerializableColor,
    /// Stroke width applied to new outlined shapes.
    pub stroke_width: f64,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: ToolState::default(),
            color: DEFAULT_COLOR,
            stroke_width: crate::config::DEFAULT_STROKE_WIDTH,
        }
    }
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current tool. Any gesture in progress is abandoned.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.is_active() {
            log::debug!("Abandoning {:?} gesture on tool switch", self.current_tool);
        }
        self.current_tool = tool;
        self.state = ToolState::Idle;
    }

    /// Style for a new shape made with the current tool.
    pub fn current_style(&self) -> ShapeStyle {
        match self.current_tool {
            ToolKind::Highlighter => ShapeStyle::filled(self.color.with_alpha(HIGHLIGHTER_ALPHA)),
            _ => ShapeStyle::stroked(self.color, self.stroke_width),
        }
    }

    /// Pointer pressed at `point` (page coordinates) / `screen`.
    ///
    /// Ignored unless idle. Select starts nothing; selection is handled by the
    /// shape layer.
    pub fn begin(&mut self, point: Point, screen: Point) {
        if self.is_active() {
            return;
        }
        let style = self.current_style();
        self.state = match self.current_tool {
            ToolKind::Select => return,
            ToolKind::Pan => ToolState::Panning { last: screen },
            ToolKind::Rectangle | ToolKind::Highlighter => {
                let mut rect = Rectangle::new(point, 0.0, 0.0);
                rect.style = style;
                ToolState::Drawing {
                    anchor: point,
                    current: point,
                    shape: Shape::Rectangle(rect),
                }
            }
            ToolKind::Ellipse => {
                let mut ellipse = Ellipse::new(point, 0.0, 0.0);
                ellipse.style = style;
                ToolState::Drawing {
                    anchor: point,
                    current: point,
                    shape: Shape::Ellipse(ellipse),
                }
            }
            ToolKind::Freehand => {
                let mut stroke = Freehand::from_points(vec![point]);
                stroke.style = style;
                ToolState::Capturing { stroke }
            }
        };
    }

    /// Pointer moved. Returns the scroll delta to apply while panning.
    pub fn update(&mut self, point: Point, screen: Point) -> Option<Vec2> {
        match &mut self.state {
            ToolState::Idle => None,
            ToolState::Drawing {
                anchor,
                current,
                shape,
            } => {
                *current = point;
                match shape {
                    Shape::Rectangle(rect) => rect.set_corners(*anchor, point),
                    Shape::Ellipse(ellipse) => ellipse.set_corners(*anchor, point),
                    Shape::Freehand(_) => {}
                }
                None
            }
            ToolState::Capturing { stroke } => {
                stroke.add_point(point);
                None
            }
            ToolState::Panning { last } => {
                // Content follows the pointer, so the view scrolls the other way.
                let delta = *last - screen;
                *last = screen;
                Some(delta)
            }
        }
    }

    /// Pointer released. Returns the finished shape, if the gesture made one.
    pub fn end(&mut self, point: Point) -> Option<Shape> {
        match std::mem::take(&mut self.state) {
            ToolState::Drawing { anchor, shape, .. } => {
                let mut shape = shape;
                match &mut shape {
                    Shape::Rectangle(rect) => rect.set_corners(anchor, point),
                    Shape::Ellipse(ellipse) => ellipse.set_corners(anchor, point),
                    Shape::Freehand(_) => {}
                }
                Some(shape)
            }
            ToolState::Capturing { mut stroke } => {
                if stroke.points.last() != Some(&point) {
                    stroke.add_point(point);
                }
                stroke.simplify(SIMPLIFY_TOLERANCE);
                Some(Shape::Freehand(stroke))
            }
            ToolState::Idle | ToolState::Panning { .. } => None,
        }
    }

    /// Pointer left the view or the gesture was interrupted.
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, ToolState::Idle)
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.state, ToolState::Panning { .. })
    }

    /// The shape being drawn, for live rendering.
    pub fn preview_shape(&self) -> Option<Shape> {
        match &self.state {
            ToolState::Drawing { shape, .. } => Some(shape.clone()),
            ToolState::Capturing { stroke } => Some(Shape::Freehand(stroke.clone())),
            ToolState::Idle | ToolState::Panning { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;

    #[test]
    fn test_tool_names_on_the_wire() {
        assert_eq!(serde_json::to_string(&ToolKind::Rectangle).unwrap(), "\"rect\"");
        assert_eq!(
            serde_json::from_str::<ToolKind>("\"highlighter\"").unwrap(),
            ToolKind::Highlighter
        );
    }

    #[test]
    fn test_rectangle_drag_any_direction() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Rectangle);
        tm.begin(Point::new(100.0, 100.0), Point::ZERO);
        tm.update(Point::new(60.0, 140.0), Point::ZERO);
        assert_eq!(
            tm.preview_shape().map(|s| s.bounds()),
            Some(Rect::new(60.0, 100.0, 100.0, 140.0))
        );
        let shape = tm.end(Point::new(40.0, 150.0)).unwrap();
        assert_eq!(shape.bounds(), Rect::new(40.0, 100.0, 100.0, 150.0));
        assert!(!tm.is_active());
    }

    #[test]
    fn test_ellipse_radii_are_half_extent() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Ellipse);
        tm.begin(Point::new(0.0, 0.0), Point::ZERO);
        let Some(Shape::Ellipse(ellipse)) = tm.end(Point::new(40.0, 20.0)) else {
            panic!("expected ellipse");
        };
        assert!((ellipse.radius_x - 20.0).abs() < f64::EPSILON);
        assert!((ellipse.radius_y - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_highlighter_is_translucent_fill() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Highlighter);
        tm.begin(Point::new(0.0, 0.0), Point::ZERO);
        let shape = tm.end(Point::new(10.0, 10.0)).unwrap();
        let style = shape.style();
        assert_eq!(style.fill_color, Some(DEFAULT_COLOR.with_alpha(0x80)));
        assert!(!style.has_stroke());
    }

    #[test]
    fn test_freehand_captures_and_simplifies() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Freehand);
        tm.begin(Point::new(0.0, 0.0), Point::ZERO);
        for x in 1..10 {
            tm.update(Point::new(x as f64, 0.0), Point::ZERO);
        }
        let Some(Shape::Freehand(stroke)) = tm.end(Point::new(10.0, 0.0)) else {
            panic!("expected freehand");
        };
        assert_eq!(stroke.points, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert!((stroke.style.stroke_width - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan_scrolls_by_inverse_delta() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Pan);
        tm.begin(Point::ZERO, Point::new(100.0, 100.0));
        assert!(tm.is_panning());
        let delta = tm.update(Point::ZERO, Point::new(120.0, 90.0));
        assert_eq!(delta, Some(Vec2::new(-20.0, 10.0)));
        assert!(tm.end(Point::ZERO).is_none());
        assert!(!tm.is_active());
    }

    #[test]
    fn test_select_starts_nothing() {
        let mut tm = ToolManager::new();
        tm.begin(Point::new(0.0, 0.0), Point::ZERO);
        assert!(!tm.is_active());
        assert!(tm.end(Point::new(100.0, 100.0)).is_none());
    }

    #[test]
    fn test_switching_tools_abandons_shape() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Rectangle);
        tm.begin(Point::new(0.0, 0.0), Point::ZERO);
        tm.set_tool(ToolKind::Ellipse);
        assert!(!tm.is_active());
        assert!(tm.end(Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_only_one_shape_in_progress() {
        let mut tm = ToolManager::new();
        tm.set_tool(ToolKind::Rectangle);
        tm.begin(Point::new(0.0, 0.0), Point::ZERO);
        tm.begin(Point::new(50.0, 50.0), Point::ZERO);
        let shape = tm.end(Point::new(10.0, 10.0)).unwrap();
        assert_eq!(shape.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }
}
