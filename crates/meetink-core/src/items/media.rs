//! Raster payloads: uploaded images and stamps.

use serde::{Deserialize, Serialize};

use super::Erasure;

/// An uploaded image placed at its stored pixel dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub url: String,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub erasures: Vec<Erasure>,
}

impl ImageData {
    /// Largest side an image is placed at; bigger uploads are scaled down proportionally.
    pub const MAX_PLACED_SIDE: f64 = 480.0;

    pub fn new(url: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            url: url.into(),
            width,
            height,
            erasures: Vec::new(),
        }
    }

    /// Create from natural pixel dimensions, clamped to [`Self::MAX_PLACED_SIDE`].
    pub fn fitted(url: impl Into<String>, natural_width: u32, natural_height: u32) -> Self {
        let (w, h) = (natural_width.max(1) as f64, natural_height.max(1) as f64);
        let scale = (Self::MAX_PLACED_SIDE / w.max(h)).min(1.0);
        Self::new(url, w * scale, h * scale)
    }
}

/// Built-in stamp set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampKind {
    #[default]
    Star,
    Heart,
    Check,
    Cross,
    ThumbsUp,
    Smile,
    Question,
}

impl StampKind {
    pub fn all() -> &'static [StampKind] {
        &[
            StampKind::Star,
            StampKind::Heart,
            StampKind::Check,
            StampKind::Cross,
            StampKind::ThumbsUp,
            StampKind::Smile,
            StampKind::Question,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StampKind::Star => "star",
            StampKind::Heart => "heart",
            StampKind::Check => "check",
            StampKind::Cross => "cross",
            StampKind::ThumbsUp => "thumbs_up",
            StampKind::Smile => "smile",
            StampKind::Question => "question",
        }
    }

    /// Texture URL for this stamp's artwork.
    pub fn texture_url(&self) -> String {
        format!("/stamps/{}.png", self.name())
    }
}

/// A stamp placed at fixed pixel dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampData {
    pub kind: StampKind,
    #[serde(default = "default_stamp_size")]
    pub width: f64,
    #[serde(default = "default_stamp_size")]
    pub height: f64,
    #[serde(default)]
    pub erasures: Vec<Erasure>,
}

fn default_stamp_size() -> f64 {
    StampData::DEFAULT_SIZE
}

impl StampData {
    pub const DEFAULT_SIZE: f64 = 64.0;

    pub fn new(kind: StampKind) -> Self {
        Self {
            kind,
            width: Self::DEFAULT_SIZE,
            height: Self::DEFAULT_SIZE,
            erasures: Vec::new(),
        }
    }
}
