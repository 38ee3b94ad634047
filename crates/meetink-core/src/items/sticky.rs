//! Sticky-note payload.

use serde::{Deserialize, Serialize};

use super::SerializableColor;

/// A sticky-note: a filled rectangle whose children live in its local content space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNoteData {
    #[serde(default = "SerializableColor::sticky_yellow")]
    pub fill: SerializableColor,
    pub width: f64,
    pub height: f64,
}

impl StickyNoteData {
    pub const DEFAULT_SIZE: f64 = 200.0;
    /// Size of the folded corner decoration.
    pub const FOLD_SIZE: f64 = 24.0;

    pub fn new(fill: SerializableColor, width: f64, height: f64) -> Self {
        Self { fill, width, height }
    }
}

impl Default for StickyNoteData {
    fn default() -> Self {
        Self::new(SerializableColor::sticky_yellow(), Self::DEFAULT_SIZE, Self::DEFAULT_SIZE)
    }
}
