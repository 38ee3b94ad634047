//! Item definitions for the whiteboard.
//!
//! An [`Item`] is the atomic drawable unit. Its payload is a closed tagged union
//! ([`ItemData`]) keyed by the item type; placement is a center-pivot [`Transform`].

mod color;
mod media;
mod path;
mod sticky;
mod text;

pub use color::SerializableColor;
pub use media::{ImageData, StampData, StampKind};
pub use path::{PathData, SMOOTHING_MIN_POINTS, StrokeBlend, points_bounds};
pub use sticky::StickyNoteData;
pub use text::{FontFamily, TextData};

use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for items.
pub type ItemId = Uuid;

/// World-space placement of an item.
///
/// `x`/`y` offset the item's local content; the visual center of the item sits at
/// `(x + center.x, y + center.y)` where `center` is the center of its local bounds.
/// Rotation (radians) and scale are applied about that center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default)]
    pub rotation: f64,
}

fn one() -> f64 {
    1.0
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation: 0.0,
    };

    /// Pure translation.
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, ..Self::IDENTITY }
    }

    /// Translate by a world-space delta.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A subtractive eraser stroke attached to an erasable item, in the item's local space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Erasure {
    pub id: Uuid,
    pub points: Vec<Point>,
    pub size: f64,
}

impl Erasure {
    pub fn new(points: Vec<Point>, size: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            size,
        }
    }
}

/// Append `erasure`, or replace the existing record carrying the same id.
pub fn upsert_erasure(erasures: &mut Vec<Erasure>, erasure: Erasure) {
    match erasures.iter_mut().find(|e| e.id == erasure.id) {
        Some(existing) => *existing = erasure,
        None => erasures.push(erasure),
    }
}

/// The closed set of item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Path,
    Image,
    Text,
    Stamp,
    StickyNote,
}

impl ItemKind {
    /// Paint tier: strokes always sit beneath placed objects.
    pub fn paint_tier(self) -> u8 {
        match self {
            ItemKind::Path => 0,
            _ => 1,
        }
    }

    /// Whether an eraser attaches a subtractive mask rather than deleting the item.
    pub fn supports_erasure(self) -> bool {
        matches!(self, ItemKind::Path | ItemKind::Image | ItemKind::Stamp)
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Path => "path",
            ItemKind::Image => "image",
            ItemKind::Text => "text",
            ItemKind::Stamp => "stamp",
            ItemKind::StickyNote => "sticky-note",
        }
    }
}

/// Type-specific payload, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ItemData {
    Path(PathData),
    Image(ImageData),
    Text(TextData),
    Stamp(StampData),
    StickyNote(StickyNoteData),
}

impl ItemData {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemData::Path(_) => ItemKind::Path,
            ItemData::Image(_) => ItemKind::Image,
            ItemData::Text(_) => ItemKind::Text,
            ItemData::Stamp(_) => ItemKind::Stamp,
            ItemData::StickyNote(_) => ItemKind::StickyNote,
        }
    }

    /// Erasures attached to this payload (empty for non-erasable types).
    pub fn erasures(&self) -> &[Erasure] {
        match self {
            ItemData::Path(p) => &p.erasures,
            ItemData::Image(i) => &i.erasures,
            ItemData::Stamp(s) => &s.erasures,
            ItemData::Text(_) | ItemData::StickyNote(_) => &[],
        }
    }

    /// Mutable erasure list, `None` for types that cannot be partially erased.
    pub fn erasures_mut(&mut self) -> Option<&mut Vec<Erasure>> {
        match self {
            ItemData::Path(p) => Some(&mut p.erasures),
            ItemData::Image(i) => Some(&mut i.erasures),
            ItemData::Stamp(s) => Some(&mut s.erasures),
            ItemData::Text(_) | ItemData::StickyNote(_) => None,
        }
    }

    /// Texture URL for raster payloads.
    pub fn texture_url(&self) -> Option<String> {
        match self {
            ItemData::Image(i) => Some(i.url.clone()),
            ItemData::Stamp(s) => Some(s.kind.texture_url()),
            _ => None,
        }
    }
}

/// The atomic drawable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(flatten)]
    pub data: ItemData,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub z_index: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
}

impl Item {
    /// Create a root item with a fresh id.
    pub fn new(data: ItemData, transform: Transform, z_index: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            transform,
            z_index,
            parent_id: None,
            is_deleted: false,
        }
    }

    /// Nest the item inside a sticky-note.
    pub fn with_parent(mut self, parent_id: Option<ItemId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.data.kind()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Sort key used for painting and topmost-hit resolution.
    pub fn paint_key(&self) -> (u8, f64) {
        (self.kind().paint_tier(), self.z_index)
    }

    pub fn as_path(&self) -> Option<&PathData> {
        match &self.data {
            ItemData::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextData> {
        match &self.data {
            ItemData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_sticky_note(&self) -> Option<&StickyNoteData> {
        match &self.data {
            ItemData::StickyNote(s) => Some(s),
            _ => None,
        }
    }
}

/// Partial update carried by `update_item`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ItemData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<f64>,
}

impl ItemPatch {
    pub fn transform(transform: Transform) -> Self {
        Self {
            transform: Some(transform),
            ..Self::default()
        }
    }

    pub fn data(data: ItemData) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn z_index(z_index: f64) -> Self {
        Self {
            z_index: Some(z_index),
            ..Self::default()
        }
    }

    /// Full-state patch of every mutable field.
    pub fn from_item(item: &Item) -> Self {
        Self {
            transform: Some(item.transform),
            data: Some(item.data.clone()),
            z_index: Some(item.z_index),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transform.is_none() && self.data.is_none() && self.z_index.is_none()
    }

    /// Apply onto an item. A payload of a different type is rejected (type tags are immutable).
    pub fn apply_to(&self, item: &mut Item) -> bool {
        let mut changed = false;
        if let Some(t) = self.transform {
            changed |= item.transform != t;
            item.transform = t;
        }
        if let Some(data) = &self.data {
            if data.kind() == item.kind() {
                changed |= &item.data != data;
                item.data = data.clone();
            } else {
                log::warn!(
                    "Ignoring payload of type {} for {} item {}",
                    data.kind().name(),
                    item.kind().name(),
                    item.id
                );
            }
        }
        if let Some(z) = self.z_index {
            changed |= item.z_index != z;
            item.z_index = z;
        }
        changed
    }
}
