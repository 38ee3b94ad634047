//! Board-level operations: placement, text editing, ordering, undo/redo, view and hydration.

use kurbo::Point;
use meetink_core::geometry::index_bounds;
use meetink_core::history::Reconciliation;
use meetink_core::input::{Key, Modifiers};
use meetink_core::items::{
    ImageData, Item, ItemData, ItemId, ItemPatch, StampData, StickyNoteData, TextData, Transform,
};
use meetink_core::scene::TextureState;
use meetink_render::{Compositor, RenderError, RenderResult};

use crate::shortcuts::{Command, ShortcutRegistry};
use crate::whiteboard::Whiteboard;

/// Screen pixels kept clear around the content when zooming to fit.
const FIT_MARGIN: f64 = 40.0;

impl<C: Compositor> Whiteboard<C> {
    // --- Placement ---

    /// Add a new root item on top of everything, broadcast it and select it.
    fn place(&mut self, data: ItemData, transform: Transform) -> ItemId {
        let s = &mut self.state;
        let item = Item::new(data, transform, s.z_alloc.next());
        let id = item.id;
        log::debug!("Placing {} {id}", item.kind().name());
        s.history.push(&s.store);
        self.sync.add_item(&item);
        s.store.upsert(item);
        s.selection.select(id);
        self.overlay_dirty = true;
        id
    }

    /// Create an empty text item at `position` and start editing it.
    pub fn place_text(&mut self, position: Point) -> ItemId {
        let settings = &self.state.tools.settings;
        let mut text = TextData::new("");
        text.font_size = settings.font_size;
        text.color = settings.color;
        let id = self.place(ItemData::Text(text), Transform::at(position.x, position.y));
        self.enter_text_edit(id);
        self.fresh_text = Some(id);
        id
    }

    /// Sticky-note centered on `center`.
    pub fn place_sticky_note(&mut self, center: Point) -> ItemId {
        let note = StickyNoteData {
            fill: self.state.tools.settings.sticky_fill,
            ..StickyNoteData::default()
        };
        let transform = centered(center, note.width, note.height);
        self.place(ItemData::StickyNote(note), transform)
    }

    /// Stamp of the selected kind centered on `center`.
    pub fn place_stamp(&mut self, center: Point) -> ItemId {
        let stamp = StampData::new(self.state.tools.settings.stamp);
        let transform = centered(center, stamp.width, stamp.height);
        self.place(ItemData::Stamp(stamp), transform)
    }

    /// Image centered on `center`, scaled down from its natural size if too large.
    pub fn place_image(&mut self, center: Point, url: impl Into<String>, width: u32, height: u32) -> ItemId {
        let image = ImageData::fitted(url, width, height);
        let transform = centered(center, image.width, image.height);
        self.place(ItemData::Image(image), transform)
    }

    /// Place the image armed with [`arm_image`](Self::arm_image), if any.
    pub fn place_pending_image(&mut self, center: Point) -> Option<ItemId> {
        let (url, width, height) = self.state.tools.pending_image.take()?;
        Some(self.place_image(center, url, width, height))
    }

    // --- Text editing ---

    /// Hide a text item's rendering while the host overlays its editor.
    pub fn enter_text_edit(&mut self, id: ItemId) -> bool {
        if self.state.store.get(&id).and_then(Item::as_text).is_none() {
            return false;
        }
        if self.state.selection.editing() == Some(id) {
            return true;
        }
        if self.state.selection.editing().is_some() {
            self.finish_text_edit();
        }
        self.abort_gestures();
        self.state.selection.select(id);
        self.state.selection.enter_editing(id);
        self.state.mark_content_dirty();
        self.overlay_dirty = true;
        true
    }

    /// Write the editor's contents back to the item being edited and stop editing.
    /// Empty text deletes the item. Returns `true` if the board changed.
    pub fn commit_text(&mut self, text: &str) -> bool {
        let Some(id) = self.state.selection.exit_editing() else {
            return false;
        };
        let fresh = self.fresh_text.take() == Some(id);
        self.state.mark_content_dirty();
        self.overlay_dirty = true;

        let s = &mut self.state;
        let Some(current) = s.store.get(&id).and_then(Item::as_text) else {
            return false;
        };
        if text.trim().is_empty() {
            // Placed and abandoned in one edit: drop the placement step instead of adding one
            let placed_last = s
                .history
                .last_snapshot()
                .is_some_and(|snapshot| snapshot.iter().all(|i| i.id != id));
            if fresh && placed_last {
                s.history.discard_last();
            } else {
                s.history.push(&s.store);
            }
            s.store.remove(&id);
            s.selection.deselect(&id);
            self.sync.delete_item(id);
            return true;
        }
        if current.text == text {
            return false;
        }
        let data = ItemData::Text(TextData {
            text: text.to_string(),
            ..current.clone()
        });
        s.history.push(&s.store);
        let patch = ItemPatch::data(data);
        s.store.patch(&id, &patch);
        self.sync.update_item(id, patch);
        true
    }

    /// Stop editing, keeping the item's current text. An item left empty is deleted.
    pub fn finish_text_edit(&mut self) -> bool {
        let Some(id) = self.state.selection.editing() else {
            return false;
        };
        let text = self
            .state
            .store
            .get(&id)
            .and_then(Item::as_text)
            .map(|t| t.text.clone())
            .unwrap_or_default();
        self.commit_text(&text)
    }

    // --- Selection commands ---

    pub fn delete_selection(&mut self) -> bool {
        let s = &mut self.state;
        let ids: Vec<ItemId> = s
            .selection
            .selected()
            .iter()
            .copied()
            .filter(|id| s.store.contains(id))
            .collect();
        if ids.is_empty() {
            return false;
        }
        s.history.push(&s.store);
        for id in ids {
            // Children of an already deleted note are gone by now
            if !s.store.remove(&id).is_empty() {
                self.sync.delete_item(id);
            }
        }
        s.selection.clear();
        self.overlay_dirty = true;
        true
    }

    /// Select every root item.
    pub fn select_all(&mut self) {
        let s = &mut self.state;
        s.selection
            .set(s.store.iter().filter(|i| i.is_root()).map(|i| i.id).collect::<Vec<_>>());
        self.overlay_dirty = true;
    }

    pub fn bring_to_front(&mut self) -> bool {
        let mut items = self.selected_items();
        if items.is_empty() {
            return false;
        }
        items.sort_by(|a, b| a.1.total_cmp(&b.1));
        let s = &mut self.state;
        s.history.push(&s.store);
        for (id, _, _) in items {
            let patch = ItemPatch::z_index(s.z_alloc.next());
            s.store.patch(&id, &patch);
            self.sync.update_item(id, patch);
        }
        true
    }

    pub fn send_to_back(&mut self) -> bool {
        let mut items = self.selected_items();
        if items.is_empty() {
            return false;
        }
        // Highest first, so the lowest selected item ends up at the very bottom
        items.sort_by(|a, b| b.1.total_cmp(&a.1));
        let s = &mut self.state;
        s.history.push(&s.store);
        for (id, z, parent) in items {
            let min = s.store.min_z(parent).unwrap_or(z);
            let patch = ItemPatch::z_index(meetink_core::clock::ZIndexAllocator::below(min));
            s.store.patch(&id, &patch);
            self.sync.update_item(id, patch);
        }
        true
    }

    /// Move the selection by `dx`, `dy` nudge steps.
    pub fn nudge(&mut self, dx: f64, dy: f64) -> bool {
        let items = self.selected_items();
        if items.is_empty() {
            return false;
        }
        let step = self.config.selection.nudge_step;
        let s = &mut self.state;
        s.history.push(&s.store);
        for (id, _, _) in items {
            let Some(item) = s.store.get(&id) else {
                continue;
            };
            let patch = ItemPatch::transform(item.transform.translated(dx * step, dy * step));
            s.store.patch(&id, &patch);
            self.sync.update_item(id, patch);
        }
        self.overlay_dirty = true;
        true
    }

    fn selected_items(&self) -> Vec<(ItemId, f64, Option<ItemId>)> {
        let s = &self.state;
        s.selection
            .selected()
            .iter()
            .filter_map(|id| s.store.get(id))
            .map(|item| (item.id, item.z_index, item.parent_id))
            .collect()
    }

    // --- Board commands ---

    /// Remove every item, locally and for peers.
    pub fn clear_board(&mut self) -> bool {
        self.abort_gestures();
        let s = &mut self.state;
        if s.store.is_empty() {
            return false;
        }
        s.history.push(&s.store);
        s.selection.exit_editing();
        s.selection.clear();
        s.store.clear();
        self.sync.clear();
        self.overlay_dirty = true;
        true
    }

    pub fn undo(&mut self) -> bool {
        self.abort_gestures();
        let s = &mut self.state;
        let diff = s.history.undo(&mut s.store);
        self.reconcile(diff)
    }

    pub fn redo(&mut self) -> bool {
        self.abort_gestures();
        let s = &mut self.state;
        let diff = s.history.redo(&mut s.store);
        self.reconcile(diff)
    }

    fn reconcile(&mut self, diff: Option<Reconciliation>) -> bool {
        let Some(diff) = diff else {
            return false;
        };
        let sent = self.sync.broadcast_reconciliation(&diff);
        log::debug!(
            "Reconciled {} added, {} updated, {} deleted ({sent} messages)",
            diff.added.len(),
            diff.updated.len(),
            diff.deleted.len()
        );
        self.prune_selection();
        true
    }

    /// Abort whatever gesture is in flight, leave text editing and drop the selection.
    pub fn cancel(&mut self) {
        self.abort_gestures();
        self.finish_text_edit();
        self.state.selection.clear();
        self.overlay_dirty = true;
    }

    // --- Keyboard ---

    /// Handle a key press. While a text item is being edited the host's editor owns the
    /// keyboard and only Escape is handled here.
    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> bool {
        if self.state.selection.editing().is_some() {
            if key == Key::Escape {
                self.finish_text_edit();
                return true;
            }
            return false;
        }
        match ShortcutRegistry::resolve(&key, modifiers) {
            Some(command) => {
                self.execute(command);
                true
            }
            None => false,
        }
    }

    pub fn execute(&mut self, command: Command) -> bool {
        log::debug!("Command {command:?}");
        match command {
            Command::SelectAll => {
                self.select_all();
                true
            }
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::Delete => self.delete_selection(),
            Command::BringToFront => self.bring_to_front(),
            Command::SendToBack => self.send_to_back(),
            Command::Cancel => {
                self.cancel();
                true
            }
            Command::Nudge { dx, dy } => self.nudge(dx, dy),
            Command::ZoomToContent => self.zoom_to_content(),
            Command::ResetView => {
                self.state.camera.reset();
                true
            }
        }
    }

    // --- View ---

    /// Pan and zoom so every item fits in the viewport. Returns `false` on an empty board.
    pub fn zoom_to_content(&mut self) -> bool {
        let s = &mut self.state;
        let Some(bounds) = s
            .store
            .iter()
            .filter(|i| i.is_root())
            .map(index_bounds)
            .reduce(|a, b| a.union(b))
        else {
            return false;
        };
        let viewport = s.scene.viewport;
        s.camera.fit_to_bounds(bounds, viewport, FIT_MARGIN);
        log::debug!("Zoomed to content {bounds:?} at {:.2}x", s.camera.zoom);
        true
    }

    // --- Hydration ---

    /// Replace the board with a persisted item list. Nothing is broadcast and history
    /// starts over.
    pub fn load_items(&mut self, items: Vec<Item>) {
        self.abort_gestures();
        let s = &mut self.state;
        log::info!("Hydrating board with {} items", items.len());
        for item in &items {
            s.z_alloc.observe(item.z_index);
        }
        s.store.replace_all(items);
        s.history.clear();
        self.prune_selection();
    }

    // --- Textures and export ---

    /// URLs the host should fetch, drained.
    pub fn take_texture_requests(&mut self) -> Vec<String> {
        self.textures.take_requests()
    }

    /// Deliver fetched bytes (or the fetch error) for a requested URL.
    pub fn complete_texture_load(&mut self, url: &str, result: Result<Vec<u8>, String>) -> RenderResult<TextureState> {
        match self.textures.complete(url, result) {
            Ok(state) => {
                let nodes = self.state.scene.set_texture_state(url, state);
                log::trace!("{url} is {state:?} in {nodes} nodes");
                Ok(state)
            }
            Err(e) => {
                self.state.scene.set_texture_state(url, TextureState::Failed);
                Err(e)
            }
        }
    }

    /// PNG of the current board contents as seen through the viewport.
    pub fn export_png(&mut self) -> RenderResult<Vec<u8>> {
        self.refresh();
        if self.state.store.is_empty() {
            return Err(RenderError::Empty);
        }
        meetink_render::export_png(&self.state.scene, &self.textures)
    }
}

/// Transform placing a `width` x `height` box centered on `center`.
fn centered(center: Point, width: f64, height: f64) -> Transform {
    Transform::at(center.x - width / 2.0, center.y - height / 2.0)
}

#[cfg(test)]
mod tests {
    use kurbo::Size;
    use meetink_core::config::EngineConfig;
    use meetink_core::items::{ItemKind, SerializableColor, StampKind};
    use meetink_core::scene::LayerKind;
    use meetink_core::tools::ToolKind;

    use super::*;

    fn board() -> Whiteboard {
        Whiteboard::offline(EngineConfig::default(), Size::new(400.0, 300.0))
    }

    fn ctrl() -> Modifiers {
        Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        }
    }

    #[test]
    fn test_place_sticky_note_is_centered_and_selected() {
        let mut board = board();
        let id = board.place_sticky_note(Point::new(300.0, 300.0));
        let note = board.store().get(&id).unwrap();
        assert_eq!(note.transform, Transform::at(200.0, 200.0));
        assert_eq!(note.as_sticky_note().unwrap().fill, SerializableColor::sticky_yellow());
        assert_eq!(board.selection().selected(), &[id]);
        assert!(board.state().history.can_undo());
    }

    #[test]
    fn test_placed_items_stack_upwards() {
        let mut board = board();
        let a = board.place_stamp(Point::new(0.0, 0.0));
        let b = board.place_stamp(Point::new(10.0, 10.0));
        let za = board.store().get(&a).unwrap().z_index;
        let zb = board.store().get(&b).unwrap().z_index;
        assert!(zb > za);
    }

    #[test]
    fn test_place_stamp_uses_selected_kind() {
        let mut board = board();
        board.tools_mut().settings.stamp = StampKind::Heart;
        let id = board.place_stamp(Point::new(100.0, 100.0));
        match &board.store().get(&id).unwrap().data {
            ItemData::Stamp(stamp) => assert_eq!(stamp.kind, StampKind::Heart),
            other => panic!("expected a stamp, got {other:?}"),
        }
    }

    #[test]
    fn test_pending_image_is_fitted_and_consumed() {
        let mut board = board();
        board.arm_image("/uploads/big.png", 1920, 1080);
        let id = board.place_pending_image(Point::new(0.0, 0.0)).unwrap();
        match &board.store().get(&id).unwrap().data {
            ItemData::Image(image) => {
                assert_eq!(image.width, ImageData::MAX_PLACED_SIDE);
                assert_eq!(image.height, 270.0);
            }
            other => panic!("expected an image, got {other:?}"),
        }
        assert!(board.place_pending_image(Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_text_edit_commit() {
        let mut board = board();
        let id = board.place_text(Point::new(20.0, 20.0));
        assert_eq!(board.selection().editing(), Some(id));

        assert!(board.commit_text("hello"));
        assert_eq!(board.selection().editing(), None);
        assert_eq!(board.store().get(&id).unwrap().as_text().unwrap().text, "hello");

        assert!(board.enter_text_edit(id));
        assert!(!board.commit_text("hello"));
    }

    #[test]
    fn test_empty_text_commit_deletes_item() {
        let mut board = board();
        let id = board.place_text(Point::new(20.0, 20.0));
        assert!(board.commit_text("   "));
        assert!(!board.store().contains(&id));
        assert!(board.selection().is_empty());
    }

    #[test]
    fn test_abandoned_new_text_leaves_no_undo_step() {
        let mut board = board();
        let stamp = board.place_stamp(Point::new(200.0, 200.0));
        assert_eq!(board.state().history.undo_depth(), 1);

        let text = board.place_text(Point::new(20.0, 20.0));
        assert!(board.finish_text_edit());
        assert!(!board.store().contains(&text));
        assert_eq!(board.state().history.undo_depth(), 1);

        // The only step left is the stamp; no empty text comes back
        assert!(board.undo());
        assert!(board.store().is_empty());
        assert!(!board.store().contains(&stamp));
        assert!(!board.undo());
    }

    #[test]
    fn test_clearing_existing_text_is_undoable() {
        let mut board = board();
        let id = board.place_text(Point::new(20.0, 20.0));
        assert!(board.commit_text("note"));
        assert!(board.enter_text_edit(id));
        assert!(board.commit_text(""));
        assert!(!board.store().contains(&id));

        assert!(board.undo());
        assert_eq!(board.store().get(&id).unwrap().as_text().unwrap().text, "note");
    }

    #[test]
    fn test_editing_text_is_hidden_from_static_layer() {
        let mut board = board();
        let id = board.place_text(Point::new(20.0, 20.0));
        board.commit_text("visible");
        board.refresh();
        assert!(!board.scene().find_item_node(id).unwrap().hidden);

        board.enter_text_edit(id);
        board.refresh();
        assert!(board.scene().find_item_node(id).unwrap().hidden);
    }

    #[test]
    fn test_text_tool_click_on_existing_text_edits_it() {
        let mut board = board();
        let id = board.place_text(Point::new(20.0, 20.0));
        board.commit_text("existing");
        board.set_tool(ToolKind::Text);
        board.pointer_down(
            Point::new(25.0, 30.0),
            meetink_core::input::PointerButton::Primary,
            Modifiers::NONE,
            0.0,
        );
        assert_eq!(board.selection().editing(), Some(id));
        assert_eq!(board.store().len(), 1);
    }

    #[test]
    fn test_escape_while_editing_finishes_edit() {
        let mut board = board();
        let id = board.place_text(Point::new(20.0, 20.0));
        board.commit_text("keep");
        board.enter_text_edit(id);
        assert!(!board.key_down(Key::Character("a".into()), Modifiers::NONE));
        assert!(board.key_down(Key::Escape, Modifiers::NONE));
        assert_eq!(board.selection().editing(), None);
        assert!(board.store().contains(&id));
    }

    #[test]
    fn test_delete_selection_removes_note_children() {
        let mut board = board();
        let note = board.place_sticky_note(Point::new(100.0, 100.0));
        let child = Item::new(
            ItemData::Text(TextData::new("inside")),
            Transform::at(10.0, 10.0),
            1.0,
        )
        .with_parent(Some(note));
        board.state.store.upsert(child);
        board.state.selection.select(note);

        assert!(board.delete_selection());
        assert!(board.store().is_empty());
        assert!(!board.delete_selection());
    }

    #[test]
    fn test_select_all_skips_children() {
        let mut board = board();
        let note = board.place_sticky_note(Point::new(100.0, 100.0));
        let stamp = board.place_stamp(Point::new(400.0, 100.0));
        let child = Item::new(ItemData::Text(TextData::new("x")), Transform::IDENTITY, 1.0)
            .with_parent(Some(note));
        board.state.store.upsert(child);

        board.key_down(Key::Character("a".into()), ctrl());
        let mut selected = board.selection().selected().to_vec();
        selected.sort();
        let mut expected = vec![note, stamp];
        expected.sort();
        assert_eq!(selected, expected);
    }

    #[test]
    fn test_z_order_commands() {
        let mut board = board();
        let a = board.place_stamp(Point::new(0.0, 0.0));
        let b = board.place_stamp(Point::new(0.0, 0.0));
        let c = board.place_stamp(Point::new(0.0, 0.0));
        let z = |board: &Whiteboard, id: ItemId| board.store().get(&id).unwrap().z_index;

        board.state.selection.select(a);
        assert!(board.bring_to_front());
        assert!(z(&board, a) > z(&board, c));

        board.state.selection.select(c);
        assert!(board.send_to_back());
        assert!(z(&board, c) < z(&board, b));
        assert!(z(&board, c) < z(&board, a));
    }

    #[test]
    fn test_nudge_moves_selection() {
        let mut board = board();
        let id = board.place_stamp(Point::new(100.0, 100.0));
        let before = board.store().get(&id).unwrap().transform;
        board.key_down(Key::ArrowRight, Modifiers::shift());
        let after = board.store().get(&id).unwrap().transform;
        assert_eq!(after, before.translated(10.0, 0.0));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut board = board();
        let id = board.place_stamp(Point::new(100.0, 100.0));
        assert!(board.key_down(Key::Character("z".into()), ctrl()));
        assert!(board.store().is_empty());
        assert!(board.selection().is_empty());

        assert!(board.redo());
        assert!(board.store().contains(&id));
        assert!(!board.redo());
    }

    #[test]
    fn test_clear_board_is_undoable() {
        let mut board = board();
        board.place_stamp(Point::new(0.0, 0.0));
        board.place_sticky_note(Point::new(300.0, 0.0));
        assert!(board.clear_board());
        assert!(board.store().is_empty());
        assert!(!board.clear_board());
        assert!(board.undo());
        assert_eq!(board.store().len(), 2);
    }

    #[test]
    fn test_load_items_resets_history() {
        let mut board = board();
        board.place_stamp(Point::new(0.0, 0.0));
        let item = Item::new(ItemData::Stamp(StampData::new(StampKind::Check)), Transform::IDENTITY, 5e12);
        let id = item.id;
        board.load_items(vec![item]);
        assert_eq!(board.store().len(), 1);
        assert!(!board.state().history.can_undo());
        assert!(board.selection().is_empty());

        let placed = board.place_stamp(Point::new(0.0, 0.0));
        assert!(board.store().get(&placed).unwrap().z_index > board.store().get(&id).unwrap().z_index);
    }

    #[test]
    fn test_texture_load_marks_nodes() {
        let mut board = board();
        let id = board.place_image(Point::new(100.0, 100.0), "/uploads/a.png", 4, 4);
        board.refresh();
        assert_eq!(board.take_texture_requests(), vec!["/uploads/a.png".to_string()]);

        let err = board.complete_texture_load("/uploads/a.png", Err("404".into()));
        assert!(err.is_err());
        let node = board.scene().find_item_node(id).unwrap();
        let mut failed = false;
        node.walk(&mut |n| {
            if let meetink_core::scene::NodeKind::Image { state, .. } = &n.kind {
                failed |= *state == TextureState::Failed;
            }
        });
        assert!(failed);
    }

    #[test]
    fn test_export_png_of_empty_board_fails() {
        let mut board = board();
        assert!(matches!(board.export_png(), Err(RenderError::Empty)));
        board.place_sticky_note(Point::new(200.0, 150.0));
        let png = board.export_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert!(!board.scene().layer(LayerKind::Static).is_empty());
        assert_eq!(board.store().iter().next().unwrap().kind(), ItemKind::StickyNote);
    }

    #[test]
    fn test_zoom_to_content_frames_every_item() {
        let mut board = board();
        assert!(!board.zoom_to_content());

        board.place_stamp(Point::new(1000.0, 1000.0));
        board.place_sticky_note(Point::new(1400.0, 1100.0));
        assert!(board.execute(Command::ZoomToContent));

        let camera = &board.state().camera;
        for item in board.store().iter() {
            let b = meetink_core::geometry::index_bounds(item);
            let tl = camera.world_to_screen(Point::new(b.x0, b.y0));
            let br = camera.world_to_screen(Point::new(b.x1, b.y1));
            assert!(tl.x >= 39.9 && tl.y >= 39.9, "{tl:?}");
            assert!(br.x <= 360.1 && br.y <= 260.1, "{br:?}");
        }

        board.render();
        assert!(!board.scene().layer(LayerKind::Static).is_empty());
        assert!(board.execute(Command::ResetView));
        assert!((board.state().zoom() - 1.0).abs() < f64::EPSILON);
    }
}
