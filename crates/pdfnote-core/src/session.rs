//! Per-editor session state. Created at startup, never persisted.

use crate::camera::Camera;
use crate::config::{EditorConfig, Theme};
use crate::page_sync::PageSynchronizer;
use crate::record::AnnotationId;
use crate::shapes::SerializableColor;
use crate::tools::{ToolKind, ToolManager};

/// The annotation whose comment is being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingAnnotation {
    pub id: AnnotationId,
    /// True while a freshly drawn shape waits for its first comment.
    /// Cancelling discards the annotation.
    pub creating: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub pages: PageSynchronizer,
    pub camera: Camera,
    pub tools: ToolManager,
    pub editing: Option<EditingAnnotation>,
    pub theme: Theme,
}

impl Session {
    pub fn new(config: &EditorConfig) -> Self {
        let mut tools = ToolManager::new();
        tools.stroke_width = config.default_stroke_width();
        Self {
            pages: PageSynchronizer::new(),
            camera: Camera::new(),
            tools,
            editing: None,
            theme: config.toolbar.theme,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.pages.current_page()
    }

    pub fn zoom(&self) -> f64 {
        self.camera.zoom
    }

    pub fn active_tool(&self) -> ToolKind {
        self.tools.current_tool
    }

    pub fn active_color(&self) -> SerializableColor {
        self.tools.color
    }

    pub fn active_stroke_width(&self) -> f64 {
        self.tools.stroke_width
    }

    /// Follow a temporary id to its persisted replacement.
    pub fn rename(&mut self, from: &AnnotationId, to: &AnnotationId) {
        if let Some(editing) = &mut self.editing {
            if &editing.id == from {
                editing.id = to.clone();
            }
        }
    }

    /// Forget any reference to a removed annotation.
    pub fn forget(&mut self, id: &AnnotationId) {
        if self.editing.as_ref().is_some_and(|e| &e.id == id) {
            self.editing = None;
        }
    }
}
