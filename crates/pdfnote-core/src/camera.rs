//! Camera module for the zoom/scroll view transform.
//!
//! Page coordinates are unscaled PDF points with the origin at the top-left of
//! the page. Screen coordinates are relative to the top-left of the viewport.
//! The rendered page is `page_size * zoom` large and scrolls inside the
//! viewport.

use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom level a new session starts at.
pub const INITIAL_ZOOM: f64 = 1.5;
/// Increment applied by a single zoom in/out step.
pub const ZOOM_STEP: f64 = 0.25;
/// Lowest allowed zoom level. There is no upper bound.
pub const MIN_ZOOM: f64 = 0.25;
/// Horizontal space left around the page when fitting to width.
pub const FIT_MARGIN: f64 = 40.0;

/// Zoom change requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomAction {
    In,
    Out,
    Fit,
}

/// Camera manages the view transform shared by the page raster and the
/// shape layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current zoom level.
    pub zoom: f64,
    /// Scroll position of the viewport over the rendered page, in screen pixels.
    pub scroll: Vec2,
    /// Size of the visible area.
    pub viewport: Size,
    /// Unscaled size of the page currently shown.
    pub page_size: Size,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            zoom: INITIAL_ZOOM,
            scroll: Vec2::ZERO,
            viewport: Size::ZERO,
            page_size: Size::ZERO,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform from page coordinates to rendered-page pixels.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.zoom)
    }

    /// Convert a screen point to page coordinates.
    pub fn screen_to_page(&self, screen_point: Point) -> Point {
        Point::new(
            (screen_point.x + self.scroll.x) / self.zoom,
            (screen_point.y + self.scroll.y) / self.zoom,
        )
    }

    /// Convert a page point to screen coordinates.
    pub fn page_to_screen(&self, page_point: Point) -> Point {
        Point::new(
            page_point.x * self.zoom - self.scroll.x,
            page_point.y * self.zoom - self.scroll.y,
        )
    }

    /// Size of the rendered page at the current zoom.
    pub fn content_size(&self) -> Size {
        Size::new(self.page_size.width * self.zoom, self.page_size.height * self.zoom)
    }

    /// Apply a zoom action. Returns whether the zoom level changed.
    ///
    /// `Fit` needs a known page width and viewport; otherwise it is ignored.
    pub fn apply(&mut self, action: ZoomAction) -> bool {
        let target = match action {
            ZoomAction::In => self.zoom + ZOOM_STEP,
            ZoomAction::Out => (self.zoom - ZOOM_STEP).max(MIN_ZOOM),
            ZoomAction::Fit => match self.fit_width_zoom() {
                Some(zoom) => zoom,
                None => return false,
            },
        };
        if (target - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        self.zoom = target;
        self.clamp_scroll();
        true
    }

    /// Zoom that makes the page fill the viewport width minus a margin.
    pub fn fit_width_zoom(&self) -> Option<f64> {
        if self.page_size.width <= 0.0 || self.viewport.width <= 0.0 {
            return None;
        }
        Some(((self.viewport.width - FIT_MARGIN) / self.page_size.width).max(MIN_ZOOM))
    }

    /// Scroll by a delta in screen pixels, clamped to the scrollable range.
    pub fn scroll_by(&mut self, delta: Vec2) {
        self.scroll += delta;
        self.clamp_scroll();
    }

    /// Scroll so that `page_point` sits in the middle of the viewport.
    pub fn center_on(&mut self, page_point: Point) {
        self.scroll = Vec2::new(
            page_point.x * self.zoom - self.viewport.width / 2.0,
            page_point.y * self.zoom - self.viewport.height / 2.0,
        );
        self.clamp_scroll();
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.clamp_scroll();
    }

    pub fn set_page_size(&mut self, page_size: Size) {
        self.page_size = page_size;
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        let content = self.content_size();
        let max_x = (content.width - self.viewport.width).max(0.0);
        let max_y = (content.height - self.viewport.height).max(0.0);
        self.scroll = Vec2::new(self.scroll.x.clamp(0.0, max_x), self.scroll.y.clamp(0.0, max_y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        let mut camera = Camera::new();
        camera.set_viewport(Size::new(800.0, 600.0));
        camera.set_page_size(Size::new(612.0, 792.0));
        camera
    }

    #[test]
    fn test_default_camera() {
        let camera = Camera::new();
        assert_eq!(camera.scroll, Vec2::ZERO);
        assert!((camera.zoom - INITIAL_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut camera = camera();
        camera.scroll_by(Vec2::new(30.0, 20.0));
        let original = Point::new(123.0, 456.0);
        let page = camera.screen_to_page(original);
        let back = camera.page_to_screen(page);
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_out_floor() {
        let mut camera = camera();
        for _ in 0..20 {
            camera.apply(ZoomAction::Out);
        }
        assert!((camera.zoom - MIN_ZOOM).abs() < f64::EPSILON);
        assert!(!camera.apply(ZoomAction::Out));
    }

    #[test]
    fn test_zoom_in_out_restores() {
        let mut camera = camera();
        camera.apply(ZoomAction::In);
        camera.apply(ZoomAction::In);
        camera.apply(ZoomAction::Out);
        camera.apply(ZoomAction::Out);
        assert!((camera.zoom - INITIAL_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_width() {
        let mut camera = camera();
        assert!(camera.apply(ZoomAction::Fit));
        assert!((camera.zoom - 760.0 / 612.0).abs() < 1e-12);

        let mut unknown = Camera::new();
        assert!(!unknown.apply(ZoomAction::Fit));
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut camera = camera();
        camera.scroll_by(Vec2::new(-50.0, -50.0));
        assert_eq!(camera.scroll, Vec2::ZERO);
        camera.scroll_by(Vec2::new(10_000.0, 10_000.0));
        let content = camera.content_size();
        assert!((camera.scroll.x - (content.width - 800.0)).abs() < 1e-9);
        assert!((camera.scroll.y - (content.height - 600.0)).abs() < 1e-9);
    }

    #[test]
    fn test_center_on() {
        let mut camera = camera();
        camera.center_on(Point::new(300.0, 400.0));
        assert!((camera.scroll.x - (300.0 * 1.5 - 400.0)).abs() < 1e-9);
        assert!((camera.scroll.y - (400.0 * 1.5 - 300.0)).abs() < 1e-9);
    }
}
