//! Real-time collaboration: outbound intents and inbound event application.
//!
//! The board has no merge logic. Every local edit is broadcast as it happens and every
//! remote edit is written straight into the item store, bypassing undo history, so the
//! last writer wins on conflicting updates.

use std::collections::HashMap;

use kurbo::Point;

use crate::config::SyncConfig;
use crate::history::Reconciliation;
use crate::items::{Item, ItemId, ItemPatch, SerializableColor};
use crate::store::ItemStore;
use crate::sync::{
    BoardEvent, ConnectionState, CursorUpdate, DrawBatch, Envelope, ItemUpdate, OfflineTransport,
    Transport,
};
use crate::tools::ToolKind;

/// Cursors closer than this to their target snap onto it.
const CURSOR_SNAP_DISTANCE: f64 = 0.1;

/// A peer's pointer, eased toward the last reported position.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub position: Point,
    pub target: Point,
    pub tool: ToolKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// A stroke a peer is still drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveStroke {
    pub points: Vec<Point>,
    pub color: SerializableColor,
    pub width: f64,
    pub tool: ToolKind,
}

/// What one round of inbound processing changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The item store was mutated.
    pub items_changed: bool,
    /// Cursors or live strokes changed.
    pub presence_changed: bool,
}

impl SyncReport {
    fn merge(&mut self, other: SyncReport) {
        self.items_changed |= other.items_changed;
        self.presence_changed |= other.presence_changed;
    }
}

/// Bridges local edits to the room and room events to the local store.
pub struct SyncController {
    room_id: String,
    sender_id: String,
    transport: Box<dyn Transport>,
    cursors: HashMap<String, RemoteCursor>,
    live_strokes: HashMap<String, Vec<LiveStroke>>,
    cursor_smoothing: f64,
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("room_id", &self.room_id)
            .field("sender_id", &self.sender_id)
            .field("cursors", &self.cursors.len())
            .field("live_strokes", &self.live_strokes.len())
            .finish()
    }
}

impl SyncController {
    pub fn new(
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
        transport: Box<dyn Transport>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            transport,
            cursors: HashMap::new(),
            live_strokes: HashMap::new(),
            cursor_smoothing: config.cursor_smoothing.clamp(0.0, 1.0),
        }
    }

    /// A controller with no peers. Broadcasts report failure.
    pub fn offline(sender_id: impl Into<String>, config: &SyncConfig) -> Self {
        Self::new("local", sender_id, Box::new(OfflineTransport), config)
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Swap the transport, e.g. after reconnecting. Presence from the old session is dropped.
    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.transport = transport;
        self.cursors.clear();
        self.live_strokes.clear();
    }

    // --- Outbound ---

    /// Send an event to the room. Failures are logged, never fatal.
    pub fn broadcast(&mut self, event: BoardEvent) -> bool {
        let name = event.name();
        let envelope = Envelope::new(self.room_id.clone(), self.sender_id.clone(), event);
        let sent = self.transport.send(&envelope);
        if !sent {
            log::warn!("Broadcast of {name} to room {} failed", self.room_id);
        }
        sent
    }

    pub fn add_item(&mut self, item: &Item) -> bool {
        self.broadcast(BoardEvent::AddItem(item.clone()))
    }

    pub fn update_item(&mut self, id: ItemId, changes: ItemPatch) -> bool {
        self.broadcast(BoardEvent::UpdateItem(ItemUpdate { id, changes }))
    }

    pub fn delete_item(&mut self, id: ItemId) -> bool {
        self.broadcast(BoardEvent::DeleteItem { id })
    }

    pub fn clear(&mut self) -> bool {
        self.broadcast(BoardEvent::Clear {})
    }

    pub fn cursor(&mut self, position: Point, tool: ToolKind, name: Option<String>) -> bool {
        self.broadcast(BoardEvent::Cursor(CursorUpdate {
            x: position.x,
            y: position.y,
            tool,
            name,
            avatar: None,
        }))
    }

    pub fn draw_batch(&mut self, mut batch: DrawBatch) -> bool {
        batch.sender_id = Some(self.sender_id.clone());
        self.broadcast(BoardEvent::DrawBatch(batch))
    }

    pub fn stroke_end(&mut self) -> bool {
        self.broadcast(BoardEvent::StrokeEnd {})
    }

    /// Broadcast the adds, updates and deletes that bring peers to the post-undo/redo state.
    /// Returns the number of messages handed to the transport.
    pub fn broadcast_reconciliation(&mut self, diff: &Reconciliation) -> usize {
        let mut sent = 0;
        for id in &diff.deleted {
            sent += usize::from(self.delete_item(*id));
        }
        for item in &diff.added {
            sent += usize::from(self.add_item(item));
        }
        for item in &diff.updated {
            sent += usize::from(self.update_item(item.id, ItemPatch::from_item(item)));
        }
        sent
    }

    // --- Inbound ---

    /// Drain the transport and apply everything that arrived.
    pub fn poll(&mut self, store: &mut ItemStore) -> SyncReport {
        let mut report = SyncReport::default();
        for envelope in self.transport.poll() {
            report.merge(self.apply(envelope, store));
        }
        report
    }

    /// Apply one inbound envelope.
    pub fn apply(&mut self, envelope: Envelope, store: &mut ItemStore) -> SyncReport {
        let mut report = SyncReport::default();
        if envelope.room_id != self.room_id {
            log::debug!("Ignoring {} for room {}", envelope.event.name(), envelope.room_id);
            return report;
        }

        let Envelope {
            sender_id, event, ..
        } = envelope;

        if sender_id == self.sender_id {
            // Our own add echoed back hydrates a store emptied by a reconnect
            if let BoardEvent::AddItem(item) = event {
                report.items_changed = store.insert(item);
            }
            return report;
        }

        match event {
            BoardEvent::AddItem(item) => {
                store.upsert(item);
                report.items_changed = true;
                report.presence_changed = self.live_strokes.remove(&sender_id).is_some();
            }
            BoardEvent::UpdateItem(ItemUpdate { id, changes }) => {
                report.items_changed = store.patch(&id, &changes);
            }
            BoardEvent::DeleteItem { id } => {
                report.items_changed = !store.remove(&id).is_empty();
                report.presence_changed = self.live_strokes.remove(&sender_id).is_some();
            }
            BoardEvent::Clear {} => {
                store.clear();
                report.items_changed = true;
                report.presence_changed = !self.live_strokes.is_empty();
                self.live_strokes.clear();
            }
            BoardEvent::Cursor(update) => {
                self.update_cursor(sender_id, update);
                report.presence_changed = true;
            }
            BoardEvent::DrawBatch(batch) => {
                let owner = batch.sender_id.clone().unwrap_or(sender_id);
                self.append_live(owner, batch);
                report.presence_changed = true;
            }
            BoardEvent::StrokeEnd {} => {
                report.presence_changed = self.live_strokes.remove(&sender_id).is_some();
            }
            BoardEvent::UserLeft { socket_id } => {
                let had_cursor = self.cursors.remove(&socket_id).is_some();
                let had_stroke = self.live_strokes.remove(&socket_id).is_some();
                report.presence_changed = had_cursor || had_stroke;
                log::info!("Peer {socket_id} left room {}", self.room_id);
            }
            BoardEvent::Join { .. } => {
                log::debug!("Peer {sender_id} joined room {}", self.room_id);
            }
        }
        report
    }

    fn update_cursor(&mut self, sender_id: String, update: CursorUpdate) {
        let target = Point::new(update.x, update.y);
        let cursor = self.cursors.entry(sender_id).or_insert(RemoteCursor {
            position: target,
            target,
            tool: update.tool,
            name: None,
            avatar: None,
        });
        cursor.target = target;
        cursor.tool = update.tool;
        if update.name.is_some() {
            cursor.name = update.name;
        }
        if update.avatar.is_some() {
            cursor.avatar = update.avatar;
        }
    }

    fn append_live(&mut self, owner: String, batch: DrawBatch) {
        let strokes = self.live_strokes.entry(owner).or_default();
        let start_new = batch.is_new_stroke || strokes.is_empty();
        if start_new {
            strokes.push(LiveStroke {
                points: Vec::new(),
                color: batch.color,
                width: batch.width,
                tool: batch.tool,
            });
        }
        if let Some(stroke) = strokes.last_mut() {
            stroke.points.extend(batch.points);
        }
    }

    // --- Presence ---

    /// Ease every cursor toward its target. Returns `true` while any cursor is moving.
    pub fn advance_cursors(&mut self) -> bool {
        let mut moving = false;
        for cursor in self.cursors.values_mut() {
            if cursor.position == cursor.target {
                continue;
            }
            let next = cursor.position.lerp(cursor.target, self.cursor_smoothing);
            cursor.position = if next.distance(cursor.target) < CURSOR_SNAP_DISTANCE {
                cursor.target
            } else {
                next
            };
            moving = true;
        }
        moving
    }

    pub fn cursors(&self) -> impl Iterator<Item = (&str, &RemoteCursor)> {
        self.cursors.iter().map(|(id, c)| (id.as_str(), c))
    }

    pub fn cursor_of(&self, sender_id: &str) -> Option<&RemoteCursor> {
        self.cursors.get(sender_id)
    }

    pub fn live_strokes(&self) -> impl Iterator<Item = (&str, &[LiveStroke])> {
        self.live_strokes
            .iter()
            .map(|(id, s)| (id.as_str(), s.as_slice()))
    }

    pub fn live_strokes_of(&self, sender_id: &str) -> &[LiveStroke] {
        self.live_strokes
            .get(sender_id)
            .map_or(&[], |s| s.as_slice())
    }
}
