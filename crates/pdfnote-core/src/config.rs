//! Editor configuration.
//!
//! Hosts usually hand the editor a JSON object; every field except `pdfPath`
//! is optional.

use crate::record::AnnotationRecord;
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Name given to annotations when no current user is configured.
pub const DEFAULT_USER: &str = "Guest";

/// Stroke width used when fewer than two stroke presets are configured.
pub const DEFAULT_STROKE_WIDTH: f64 = 6.0;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Endpoint URLs for the REST backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoints {
    pub load: String,
    pub create: String,
    /// Prefix; the record id and `/` are appended.
    pub update: String,
    /// Prefix; the record id and `/` are appended.
    pub delete: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    #[serde(default)]
    pub allow_edit: bool,
    #[serde(default)]
    pub allow_delete: bool,
}

/// A drawing tool entry in the toolbar. Accepts either `"rect"` or
/// `{ "tool": "rect", "promptForComment": true }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "DrawingToolEntry")]
pub struct DrawingToolConfig {
    pub tool: ToolKind,
    pub prompt_for_comment: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DrawingToolEntry {
    Bare(ToolKind),
    #[serde(rename_all = "camelCase")]
    Full {
        tool: ToolKind,
        #[serde(default)]
        prompt_for_comment: bool,
    },
}

impl From<DrawingToolEntry> for DrawingToolConfig {
    fn from(entry: DrawingToolEntry) -> Self {
        match entry {
            DrawingToolEntry::Bare(tool) => Self {
                tool,
                prompt_for_comment: false,
            },
            DrawingToolEntry::Full {
                tool,
                prompt_for_comment,
            } => Self {
                tool,
                prompt_for_comment,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSize {
    pub size: f64,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorOptions {
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub enable_picker: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default, rename = "asPDF")]
    pub as_pdf: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolbarConfig {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub navigation: Vec<String>,
    #[serde(default)]
    pub zoom: Vec<String>,
    #[serde(default)]
    pub drawing: Vec<DrawingToolConfig>,
    #[serde(default)]
    pub stroke_sizes: Vec<StrokeSize>,
    #[serde(default)]
    pub colors: ColorOptions,
    #[serde(default)]
    pub export: ExportOptions,
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub enable_comments_panel: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            enable_comments_panel: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Offset in page units added to every shape before export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportOffset {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

/// Top-level editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub pdf_path: String,
    #[serde(default)]
    pub api: Option<ApiEndpoints>,
    /// Takes priority over `api.load` when present.
    #[serde(default)]
    pub initial_data: Option<Vec<AnnotationRecord>>,
    #[serde(default = "default_user")]
    pub current_user: String,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub toolbar: ToolbarConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub export_offset: ExportOffset,
}

impl EditorConfig {
    /// Minimal configuration for a document.
    pub fn new(pdf_path: impl Into<String>) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            api: None,
            initial_data: None,
            current_user: default_user(),
            permissions: Permissions::default(),
            toolbar: ToolbarConfig::default(),
            ui: UiConfig::default(),
            export_offset: ExportOffset::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Initial stroke width: the second stroke preset, or 6.
    pub fn default_stroke_width(&self) -> f64 {
        self.toolbar
            .stroke_sizes
            .get(1)
            .map(|s| s.size)
            .filter(|size| *size > 0.0)
            .unwrap_or(DEFAULT_STROKE_WIDTH)
    }

    /// Whether shapes drawn with `tool` ask for a comment before saving.
    pub fn prompts_for_comment(&self, tool: ToolKind) -> bool {
        self.toolbar
            .drawing
            .iter()
            .any(|d| d.tool == tool && d.prompt_for_comment)
    }

    /// Whether `user` may edit their annotations under these permissions.
    pub fn can_edit(&self, owner: &str) -> bool {
        self.permissions.allow_edit && owner == self.current_user
    }

    pub fn can_delete(&self, owner: &str) -> bool {
        self.permissions.allow_delete && owner == self.current_user
    }
}
