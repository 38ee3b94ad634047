//! Tool system for the whiteboard.

use serde::{Deserialize, Serialize};

use crate::items::{SerializableColor, StampKind};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Select,
    Pen,
    /// Pen whose strokes are recognized and replaced by idealized shapes.
    ShapePen,
    Eraser,
    Text,
    Image,
    StickyNote,
    Stamp,
}

impl ToolKind {
    /// Tools that feed the stroke pipeline.
    pub fn is_drawing(&self) -> bool {
        matches!(self, ToolKind::Pen | ToolKind::ShapePen | ToolKind::Eraser)
    }

    /// Tools that place an object on click.
    pub fn is_placement(&self) -> bool {
        matches!(
            self,
            ToolKind::Text | ToolKind::Image | ToolKind::StickyNote | ToolKind::Stamp
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Pen => "pen",
            ToolKind::ShapePen => "shape_pen",
            ToolKind::Eraser => "eraser",
            ToolKind::Text => "text",
            ToolKind::Image => "image",
            ToolKind::StickyNote => "sticky_note",
            ToolKind::Stamp => "stamp",
        }
    }
}

/// Per-tool settings applied to new items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub color: SerializableColor,
    pub width: f64,
    pub eraser_width: f64,
    pub sticky_fill: SerializableColor,
    pub stamp: StampKind,
    pub font_size: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            color: SerializableColor::black(),
            width: 2.0,
            eraser_width: 20.0,
            sticky_fill: SerializableColor::sticky_yellow(),
            stamp: StampKind::default(),
            font_size: 20.0,
        }
    }
}

/// Current tool and its settings.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    pub current_tool: ToolKind,
    pub settings: ToolSettings,
    /// URL of an uploaded image waiting to be placed, with its natural pixel size.
    pub pending_image: Option<(String, u32, u32)>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool != ToolKind::Image {
            self.pending_image = None;
        }
        self.current_tool = tool;
    }

    /// Arm the image tool with an uploaded image.
    pub fn arm_image(&mut self, url: impl Into<String>, width: u32, height: u32) {
        self.current_tool = ToolKind::Image;
        self.pending_image = Some((url.into(), width, height));
    }

    /// Stroke width for the active tool.
    pub fn stroke_width(&self) -> f64 {
        match self.current_tool {
            ToolKind::Eraser => self.settings.eraser_width,
            _ => self.settings.width,
        }
    }
}
