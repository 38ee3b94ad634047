//! Text payload.

use serde::{Deserialize, Serialize};

use super::SerializableColor;

/// Font family options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    #[default]
    Sans,
    Serif,
    Handwriting,
    Mono,
}

impl FontFamily {
    /// Average advance width as a fraction of the font size.
    ///
    /// Interaction bounds and render layout both measure with this, so they never diverge.
    pub fn advance_ratio(&self) -> f64 {
        match self {
            FontFamily::Sans => 0.55,
            FontFamily::Serif => 0.52,
            FontFamily::Handwriting => 0.5,
            FontFamily::Mono => 0.6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FontFamily::Sans => "Sans",
            FontFamily::Serif => "Serif",
            FontFamily::Handwriting => "Handwriting",
            FontFamily::Mono => "Mono",
        }
    }
}

/// Text string plus font metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextData {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub font_family: FontFamily,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub color: SerializableColor,
    /// Wrap width in local units; `None` wraps only at explicit newlines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
}

fn default_font_size() -> f64 {
    TextData::DEFAULT_FONT_SIZE
}

impl TextData {
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;
    /// Line height as a multiple of the font size.
    pub const LINE_HEIGHT: f64 = 1.25;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: Self::DEFAULT_FONT_SIZE,
            font_family: FontFamily::default(),
            bold: false,
            color: SerializableColor::black(),
            max_width: None,
        }
    }

    pub fn line_height(&self) -> f64 {
        self.font_size * Self::LINE_HEIGHT
    }
}
