//! The shape layer: a disposable per-page projection of the annotation store.
//!
//! Every handle on the layer corresponds to exactly one record on the current
//! page, associated by id. The layer is cleared and rebuilt on each page
//! render; between renders the editor keeps it in step with the store.

use crate::projection::project_shape;
use crate::record::{AnnotationId, AnnotationRecord};
use crate::shapes::Shape;
use crate::tools::ToolKind;
use kurbo::{Point, Vec2};

/// Interaction flags for a rendered shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleFlags {
    /// The current user may move and resize the shape.
    pub movable: bool,
    /// The shape can be picked under the active tool.
    pub selectable: bool,
    /// The shape receives pointer events (false under the pan tool).
    pub evented: bool,
}

impl HandleFlags {
    pub fn new(movable: bool, tool: ToolKind) -> Self {
        let mut flags = Self {
            movable,
            selectable: false,
            evented: false,
        };
        flags.apply_tool(tool);
        flags
    }

    pub fn apply_tool(&mut self, tool: ToolKind) {
        self.evented = tool != ToolKind::Pan;
        self.selectable = tool == ToolKind::Select;
    }
}

/// A rendered annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeHandle {
    pub id: AnnotationId,
    pub shape: Shape,
    pub flags: HandleFlags,
}

/// Shapes for the page currently on screen, in paint order.
#[derive(Debug, Default)]
pub struct ShapeLayer {
    page: Option<u32>,
    handles: Vec<ShapeHandle>,
    selected: Option<AnnotationId>,
    hovered: Option<AnnotationId>,
    /// Shape temporarily drawn with an accent outline.
    flashed: Option<AnnotationId>,
}

impl ShapeLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page the layer was last built for.
    pub fn page(&self) -> Option<u32> {
        self.page
    }

    /// Drop every handle and the selection.
    pub fn clear(&mut self) {
        self.handles.clear();
        self.selected = None;
        self.hovered = None;
        self.flashed = None;
    }

    /// Rebuild the layer from the records of `page`.
    ///
    /// `movable` decides per record whether the current user may modify it.
    /// Records whose geometry does not decode are skipped.
    pub fn rebuild<'a>(
        &mut self,
        page: u32,
        records: impl IntoIterator<Item = &'a AnnotationRecord>,
        tool: ToolKind,
        movable: impl Fn(&AnnotationRecord) -> bool,
    ) {
        self.clear();
        self.page = Some(page);
        for record in records {
            debug_assert_eq!(record.page, page);
            match record.shape() {
                Ok(shape) => self.handles.push(ShapeHandle {
                    id: record.id.clone(),
                    shape,
                    flags: HandleFlags::new(movable(record), tool),
                }),
                Err(e) => log::warn!("Skipping annotation {}: bad geometry: {}", record.id, e),
            }
        }
        log::debug!("Shape layer for page {} has {} shapes", page, self.handles.len());
    }

    /// Put a shape on top of the layer.
    pub fn add(&mut self, id: AnnotationId, shape: Shape, flags: HandleFlags) {
        self.remove(&id);
        self.handles.push(ShapeHandle { id, shape, flags });
    }

    /// Remove a shape and any selection or hover state pointing at it.
    pub fn remove(&mut self, id: &AnnotationId) -> Option<ShapeHandle> {
        let index = self.handles.iter().position(|h| &h.id == id)?;
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        if self.hovered.as_ref() == Some(id) {
            self.hovered = None;
        }
        if self.flashed.as_ref() == Some(id) {
            self.flashed = None;
        }
        Some(self.handles.remove(index))
    }

    /// Rename a handle together with the selection, hover and flash state.
    pub fn rename(&mut self, from: &AnnotationId, to: &AnnotationId) -> bool {
        let Some(handle) = self.handles.iter_mut().find(|h| &h.id == from) else {
            return false;
        };
        handle.id = to.clone();
        for slot in [&mut self.selected, &mut self.hovered, &mut self.flashed] {
            if slot.as_ref() == Some(from) {
                *slot = Some(to.clone());
            }
        }
        true
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&ShapeHandle> {
        self.handles.iter().find(|h| &h.id == id)
    }

    /// Replace the geometry of a rendered shape.
    pub fn set_shape(&mut self, id: &AnnotationId, shape: Shape) -> bool {
        match self.handles.iter_mut().find(|h| &h.id == id) {
            Some(handle) => {
                handle.shape = shape;
                true
            }
            None => false,
        }
    }

    /// Update selectable/evented flags after a tool change.
    pub fn apply_tool(&mut self, tool: ToolKind) {
        for handle in &mut self.handles {
            handle.flags.apply_tool(tool);
        }
        if tool != ToolKind::Select {
            self.selected = None;
        }
    }

    pub fn handles(&self) -> &[ShapeHandle] {
        &self.handles
    }

    pub fn ids(&self) -> impl Iterator<Item = &AnnotationId> {
        self.handles.iter().map(|h| &h.id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Topmost evented shape under a page point.
    pub fn shape_at(&self, point: Point, tolerance: f64) -> Option<&ShapeHandle> {
        self.handles
            .iter()
            .rev()
            .filter(|h| h.flags.evented)
            .find(|h| h.shape.hit_test(point, tolerance))
    }

    /// Select a shape. Only selectable shapes can be selected.
    pub fn select(&mut self, id: &AnnotationId) -> bool {
        match self.get(id) {
            Some(handle) if handle.flags.selectable => {
                self.selected = Some(id.clone());
                true
            }
            _ => false,
        }
    }

    /// Clear the selection. Returns the previously selected id.
    pub fn deselect(&mut self) -> Option<AnnotationId> {
        self.selected.take()
    }

    pub fn selected(&self) -> Option<&AnnotationId> {
        self.selected.as_ref()
    }

    pub fn selected_handle(&self) -> Option<&ShapeHandle> {
        self.selected.as_ref().and_then(|id| self.get(id))
    }

    /// Update the hovered shape. Returns true when it changed.
    pub fn set_hovered(&mut self, id: Option<AnnotationId>) -> bool {
        if self.hovered == id {
            return false;
        }
        self.hovered = id;
        true
    }

    pub fn hovered(&self) -> Option<&AnnotationId> {
        self.hovered.as_ref()
    }

    pub fn set_flashed(&mut self, id: Option<AnnotationId>) {
        self.flashed = id;
    }

    pub fn flashed(&self) -> Option<&AnnotationId> {
        self.flashed.as_ref()
    }

    /// Shapes scaled to the rendered page, for painting.
    pub fn projected(&self, zoom: f64) -> Vec<(AnnotationId, Shape)> {
        self.handles
            .iter()
            .map(|h| (h.id.clone(), project_shape(&h.shape, zoom, Vec2::ZERO)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Geometry;
    use crate::shapes::Rectangle;

    fn rect_at(x: f64) -> Shape {
        Shape::Rectangle(Rectangle::new(Point::new(x, 0.0), 10.0, 10.0))
    }

    fn record(id: &str, user: &str, shape: &Shape) -> AnnotationRecord {
        let mut r = AnnotationRecord::new(1, user, shape);
        r.id = AnnotationId::persisted(id);
        r
    }

    #[test]
    fn test_rebuild_sets_permission_flags() {
        let mut layer = ShapeLayer::new();
        let records = [record("a", "alice", &rect_at(0.0)), record("b", "bob", &rect_at(50.0))];
        layer.rebuild(1, &records, ToolKind::Select, |r| r.user == "alice");

        assert_eq!(layer.page(), Some(1));
        assert_eq!(layer.len(), 2);
        let a = layer.get(&AnnotationId::persisted("a")).unwrap();
        let b = layer.get(&AnnotationId::persisted("b")).unwrap();
        assert!(a.flags.movable && a.flags.selectable && a.flags.evented);
        assert!(!b.flags.movable);
    }

    #[test]
    fn test_rebuild_skips_bad_geometry() {
        let mut layer = ShapeLayer::new();
        let mut bad = record("x", "alice", &rect_at(0.0));
        bad.geometry = Geometry(serde_json::json!({ "type": "star" }));
        layer.rebuild(1, [&bad], ToolKind::Select, |_| true);
        assert!(layer.is_empty());
    }

    #[test]
    fn test_pan_tool_disables_events() {
        let mut layer = ShapeLayer::new();
        let records = [record("a", "alice", &rect_at(0.0))];
        layer.rebuild(1, &records, ToolKind::Select, |_| true);
        assert!(layer.select(&AnnotationId::persisted("a")));

        layer.apply_tool(ToolKind::Pan);
        assert!(layer.selected().is_none());
        assert!(layer.shape_at(Point::new(0.0, 5.0), 1.0).is_none());
        assert!(!layer.select(&AnnotationId::persisted("a")));
    }

    #[test]
    fn test_rename_carries_selection() {
        let mut layer = ShapeLayer::new();
        let temp = AnnotationId::Temporary(1);
        layer.add(temp.clone(), rect_at(0.0), HandleFlags::new(true, ToolKind::Select));
        layer.select(&temp);

        let persisted = AnnotationId::persisted("srv");
        assert!(layer.rename(&temp, &persisted));
        assert_eq!(layer.selected(), Some(&persisted));
        assert!(layer.get(&temp).is_none());
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut layer = ShapeLayer::new();
        let id = AnnotationId::Temporary(1);
        layer.add(id.clone(), rect_at(0.0), HandleFlags::new(true, ToolKind::Select));
        layer.select(&id);
        layer.remove(&id);
        assert!(layer.selected().is_none());
        assert!(layer.is_empty());
    }

    #[test]
    fn test_shape_at_prefers_topmost() {
        let mut layer = ShapeLayer::new();
        let flags = HandleFlags::new(true, ToolKind::Select);
        layer.add(AnnotationId::persisted("under"), rect_at(0.0), flags);
        layer.add(AnnotationId::persisted("over"), rect_at(0.0), flags);
        let hit = layer.shape_at(Point::new(0.0, 5.0), 1.0).unwrap();
        assert_eq!(hit.id, AnnotationId::persisted("over"));
    }
}
