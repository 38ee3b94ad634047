//! Room-scoped wire messages.
//!
//! Every message travels in an [`Envelope`] carrying the room and the sender's session id.
//! The event itself is tagged by `type` with its body under `payload`.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::items::{Item, ItemId, ItemPatch, SerializableColor};
use crate::tools::ToolKind;

/// Partial update of an item, as sent in `update_item`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub id: ItemId,
    pub changes: ItemPatch,
}

/// Remote pointer position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorUpdate {
    pub x: f64,
    pub y: f64,
    pub tool: ToolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A chunk of an in-progress stroke streamed to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub points: Vec<Point>,
    pub color: SerializableColor,
    pub width: f64,
    pub tool: ToolKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_new_stroke: bool,
}

/// Board events exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BoardEvent {
    /// Register with a room on the relay.
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    AddItem(Item),
    UpdateItem(ItemUpdate),
    DeleteItem { id: ItemId },
    Clear {},
    Cursor(CursorUpdate),
    DrawBatch(DrawBatch),
    StrokeEnd {},
    /// Sent by the relay when a connection drops.
    #[serde(rename_all = "camelCase")]
    UserLeft { socket_id: String },
}

impl BoardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BoardEvent::Join { .. } => "join",
            BoardEvent::AddItem(_) => "add_item",
            BoardEvent::UpdateItem(_) => "update_item",
            BoardEvent::DeleteItem { .. } => "delete_item",
            BoardEvent::Clear {} => "clear",
            BoardEvent::Cursor(_) => "cursor",
            BoardEvent::DrawBatch(_) => "draw_batch",
            BoardEvent::StrokeEnd {} => "stroke_end",
            BoardEvent::UserLeft { .. } => "user_left",
        }
    }

    /// Events that change the item collection.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            BoardEvent::AddItem(_)
                | BoardEvent::UpdateItem(_)
                | BoardEvent::DeleteItem { .. }
                | BoardEvent::Clear {}
        )
    }

    pub fn update(id: ItemId, changes: ItemPatch) -> Self {
        BoardEvent::UpdateItem(ItemUpdate { id, changes })
    }

    /// Apply the event to a plain item list, as the relay keeps one per room.
    /// Returns `true` if the list changed.
    ///
    /// Mirrors what peers do with the same event, so a late joiner hydrating from the list
    /// sees the room as everyone else does.
    pub fn apply_to(&self, items: &mut Vec<Item>) -> bool {
        match self {
            BoardEvent::AddItem(item) => {
                match items.iter_mut().find(|i| i.id == item.id) {
                    Some(existing) => *existing = item.clone(),
                    None => items.push(item.clone()),
                }
                true
            }
            BoardEvent::UpdateItem(update) => match items.iter_mut().find(|i| i.id == update.id) {
                Some(existing) => update.changes.apply_to(existing),
                None => false,
            },
            BoardEvent::DeleteItem { id } => {
                let before = items.len();
                items.retain(|i| i.id != *id && i.parent_id != Some(*id));
                items.len() != before
            }
            BoardEvent::Clear {} => {
                let changed = !items.is_empty();
                items.clear();
                changed
            }
            _ => false,
        }
    }
}

/// A board event addressed to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub room_id: String,
    pub sender_id: String,
    #[serde(flatten)]
    pub event: BoardEvent,
}

impl Envelope {
    pub fn new(room_id: impl Into<String>, sender_id: impl Into<String>, event: BoardEvent) -> Self {
        Self {
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            event,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
