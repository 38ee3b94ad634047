//! The embeddable whiteboard engine.
//!
//! [`Whiteboard`] owns the [`BoardState`] and every subsystem that acts on it. The host
//! feeds it pointer and keyboard events in screen coordinates and calls [`Whiteboard::tick`]
//! once per frame; everything else (stroke batching, inbound sync, cursor easing, particles,
//! re-rendering) happens from there.

use kurbo::{Point, Size, Vec2};
use meetink_core::collaboration::SyncController;
use meetink_core::config::EngineConfig;
use meetink_core::input::{Modifiers, PointerButton, PointerEvent};
use meetink_core::interaction::{InteractionController, item_at};
use meetink_core::items::{ImageData, ItemId, ItemKind, ItemPatch, StampData};
use meetink_core::scene::{LayerKind, SceneGraph, SceneNode};
use meetink_core::selection::SelectionManager;
use meetink_core::store::ItemStore;
use meetink_core::stroke::{EraseOutcome, StrokeInput, StrokeOutcome};
use meetink_core::tools::{ToolKind, ToolManager};
use meetink_render::overlay;
use meetink_render::{Compositor, ItemRenderer, ParticleSystem, SoftwareCompositor, TextureCache};
use uuid::Uuid;

use crate::state::BoardState;

/// Zoom factor per wheel delta unit.
const WHEEL_ZOOM_RATE: f64 = 0.002;

pub struct Whiteboard<C: Compositor = SoftwareCompositor> {
    pub(crate) config: EngineConfig,
    pub(crate) state: BoardState,
    pub(crate) sync: SyncController,
    pub(crate) stroke: StrokeInput,
    pub(crate) interaction: InteractionController,
    renderer: ItemRenderer,
    pub(crate) textures: TextureCache,
    compositor: C,
    pub(crate) particles: ParticleSystem,
    user_name: Option<String>,
    /// History was snapshotted when the current drag started.
    pub(crate) drag_snapshot: bool,
    /// Text item placed by `place_text` and not yet committed.
    pub(crate) fresh_text: Option<ItemId>,
    pub(crate) overlay_dirty: bool,
    presence_dirty: bool,
    particles_dirty: bool,
    pending_cursor: Option<Point>,
    last_cursor_ms: f64,
    last_tick_ms: Option<f64>,
}

impl<C: Compositor> std::fmt::Debug for Whiteboard<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Whiteboard")
            .field("room", &self.sync.room_id())
            .field("sender", &self.sync.sender_id())
            .field("items", &self.state.store.len())
            .field("selected", &self.state.selection.len())
            .finish()
    }
}

impl Whiteboard<SoftwareCompositor> {
    pub fn new(config: EngineConfig, viewport: Size, sync: SyncController) -> Self {
        Self::with_compositor(config, viewport, sync, SoftwareCompositor::new())
    }

    /// A board with no peers, under a fresh session id.
    pub fn offline(config: EngineConfig, viewport: Size) -> Self {
        let sync = SyncController::offline(Uuid::new_v4().to_string(), &config.sync);
        Self::new(config, viewport, sync)
    }
}

impl<C: Compositor> Whiteboard<C> {
    pub fn with_compositor(config: EngineConfig, viewport: Size, sync: SyncController, compositor: C) -> Self {
        log::info!(
            "Whiteboard for room {} as {} ({}x{})",
            sync.room_id(),
            sync.sender_id(),
            viewport.width,
            viewport.height
        );
        Self {
            state: BoardState::new(&config, viewport),
            stroke: StrokeInput::new(config.stroke.clone(), config.filter.clone(), config.sync.batch_interval_ms),
            interaction: InteractionController::new(config.selection.clone()),
            renderer: ItemRenderer::new(),
            textures: TextureCache::new(),
            compositor,
            particles: ParticleSystem::default(),
            user_name: None,
            drag_snapshot: false,
            fresh_text: None,
            overlay_dirty: true,
            presence_dirty: true,
            particles_dirty: true,
            pending_cursor: None,
            last_cursor_ms: f64::NEG_INFINITY,
            last_tick_ms: None,
            sync,
            config,
        }
    }

    // --- Accessors ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn store(&self) -> &ItemStore {
        &self.state.store
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.state.selection
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.state.scene
    }

    pub fn sync(&self) -> &SyncController {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncController {
        &mut self.sync
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn tools(&self) -> &ToolManager {
        &self.state.tools
    }

    /// Tool settings for new items. Changes apply to the next item created.
    pub fn tools_mut(&mut self) -> &mut ToolManager {
        self.overlay_dirty = true;
        &mut self.state.tools
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        if self.state.selection.editing().is_some() {
            self.finish_text_edit();
        }
        self.state.tools.set_tool(tool);
        self.overlay_dirty = true;
    }

    /// Arm the image tool with an uploaded image; the next click places it.
    pub fn arm_image(&mut self, url: impl Into<String>, width: u32, height: u32) {
        self.state.tools.arm_image(url, width, height);
        self.overlay_dirty = true;
    }

    /// Name shown next to this user's cursor on other peers.
    pub fn set_user_name(&mut self, name: impl Into<String>) {
        self.user_name = Some(name.into());
    }

    // --- Camera ---

    pub fn set_viewport(&mut self, viewport: Size) {
        let view = self.state.camera.transform();
        self.state.scene.set_view(view, viewport);
    }

    /// Pan by a screen-space delta.
    pub fn pan(&mut self, delta: Vec2) {
        self.state.camera.pan(delta);
    }

    /// Zoom about a screen point.
    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        self.state.camera.zoom_at(screen, factor);
    }

    // --- Pointer input ---

    pub fn handle_pointer(&mut self, event: PointerEvent, now_ms: f64) {
        match event {
            PointerEvent::Down {
                position,
                button,
                modifiers,
            } => self.pointer_down(position, button, modifiers, now_ms),
            PointerEvent::Move {
                position,
                modifiers,
            } => self.pointer_move(position, modifiers, now_ms),
            PointerEvent::Up {
                position,
                button,
                modifiers,
            } => self.pointer_up(position, button, modifiers, now_ms),
            PointerEvent::Scroll {
                position,
                delta,
                modifiers,
            } => self.scroll(position, delta, modifiers),
        }
    }

    pub fn pointer_down(&mut self, screen: Point, button: PointerButton, modifiers: Modifiers, now_ms: f64) {
        if button != PointerButton::Primary {
            return;
        }
        // Hit-testing needs an index that reflects every change so far
        self.refresh_content();

        let world = self.state.camera.screen_to_world(screen);
        let double_click = self.state.input.press(screen, modifiers, now_ms);
        self.state.pointer = Some(world);

        if let Some(editing) = self.state.selection.editing() {
            if self.text_at(world) == Some(editing) {
                return;
            }
            self.finish_text_edit();
        }

        let tool = self.state.tools.current_tool;
        match tool {
            ToolKind::Select => {
                if double_click {
                    if let Some(id) = self.text_at(world) {
                        self.enter_text_edit(id);
                        return;
                    }
                }
                let s = &mut self.state;
                let outcome = self.interaction.pointer_down(
                    &s.store,
                    &s.index,
                    &mut s.selection,
                    world,
                    modifiers,
                    s.camera.zoom,
                );
                if outcome.mutates() {
                    s.history.push(&s.store);
                    self.drag_snapshot = true;
                }
                log::trace!("Press at {world:?}: {outcome:?}");
                self.overlay_dirty = true;
            }
            ToolKind::Pen | ToolKind::ShapePen | ToolKind::Eraser => {
                let s = &mut self.state;
                let settings = &s.tools.settings;
                let width = match tool {
                    // Eraser size is constant on screen
                    ToolKind::Eraser => settings.eraser_width / s.camera.zoom.max(f64::EPSILON),
                    _ => settings.width,
                };
                self.stroke
                    .begin(&s.store, &mut s.scene, tool, settings.color, width, world, now_ms);
            }
            ToolKind::Text => match self.text_at(world) {
                Some(id) => {
                    self.enter_text_edit(id);
                }
                None => {
                    self.place_text(world);
                }
            },
            ToolKind::StickyNote => {
                self.place_sticky_note(world);
                self.state.tools.set_tool(ToolKind::Select);
            }
            ToolKind::Stamp => {
                self.place_stamp(world);
            }
            ToolKind::Image => {
                if self.place_pending_image(world).is_some() {
                    self.state.tools.set_tool(ToolKind::Select);
                }
            }
        }
    }

    pub fn pointer_move(&mut self, screen: Point, modifiers: Modifiers, now_ms: f64) {
        let world = self.state.camera.screen_to_world(screen);
        self.state.input.moved(screen, modifiers);
        self.state.pointer = Some(world);
        self.pending_cursor = Some(world);
        self.flush_cursor(now_ms, false);

        if self.stroke.is_active() {
            self.stroke
                .extend(&mut self.state.scene, world, modifiers.shift, now_ms);
            self.flush_batch(now_ms, false);
        } else if !self.interaction.is_idle() {
            let s = &mut self.state;
            if self
                .interaction
                .pointer_move(&mut s.store, &s.index, &mut s.selection, world, modifiers)
            {
                self.overlay_dirty = true;
            }
        } else if self.state.tools.current_tool.is_placement() {
            // Ghost follows the pointer
            self.overlay_dirty = true;
        }
    }

    pub fn pointer_up(&mut self, screen: Point, button: PointerButton, modifiers: Modifiers, now_ms: f64) {
        if button != PointerButton::Primary {
            return;
        }
        self.state.input.release(screen, modifiers);

        if self.stroke.is_active() {
            let world = self.state.camera.screen_to_world(screen);
            if self.state.pointer != Some(world) {
                self.stroke
                    .extend(&mut self.state.scene, world, modifiers.shift, now_ms);
            }
            self.flush_batch(now_ms, true);
            self.finish_stroke();
        } else if !self.interaction.is_idle() {
            let s = &mut self.state;
            let changed = self.interaction.pointer_up(&s.store, &mut s.selection);
            if self.drag_snapshot && changed.is_empty() {
                s.history.discard_last();
            }
            self.drag_snapshot = false;
            for id in changed {
                if let Some(item) = s.store.get(&id) {
                    self.sync.update_item(id, ItemPatch::transform(item.transform));
                }
            }
            self.overlay_dirty = true;
        }
    }

    /// Wheel: zoom with the command modifier, pan otherwise.
    pub fn scroll(&mut self, screen: Point, delta: Vec2, modifiers: Modifiers) {
        if modifiers.command() {
            self.zoom_at(screen, (-delta.y * WHEEL_ZOOM_RATE).exp());
        } else {
            self.pan(-delta);
        }
    }

    /// Topmost text item under a world point.
    pub(crate) fn text_at(&self, world: Point) -> Option<ItemId> {
        let s = &self.state;
        let padding = self.config.selection.hit_padding / s.camera.zoom.max(f64::EPSILON);
        item_at(&s.store, &s.index, world, padding)
            .filter(|id| s.store.get(id).is_some_and(|i| i.kind() == ItemKind::Text))
    }

    // --- Strokes ---

    fn flush_batch(&mut self, now_ms: f64, force: bool) {
        if let Some(batch) = self.stroke.take_batch(now_ms, force) {
            self.sync.draw_batch(batch);
        }
    }

    fn finish_stroke(&mut self) {
        let s = &mut self.state;
        let outcome = self
            .stroke
            .end(&s.store, &s.index, &mut s.scene, s.camera.zoom, &mut s.z_alloc);
        match outcome {
            StrokeOutcome::Created(item) => {
                s.history.push(&s.store);
                self.sync.add_item(&item);
                s.store.upsert(item);
            }
            StrokeOutcome::Erased(erase) => self.apply_erase(erase),
            StrokeOutcome::Discarded => {}
        }
        self.sync.stroke_end();
    }

    fn apply_erase(&mut self, erase: EraseOutcome) {
        if erase.is_empty() {
            log::debug!("Eraser stroke touched nothing");
            return;
        }
        let s = &mut self.state;
        s.history.push(&s.store);
        for item in erase.updated {
            let id = item.id;
            let patch = ItemPatch::data(item.data.clone());
            s.store.upsert(item);
            self.sync.update_item(id, patch);
        }
        for id in erase.deleted {
            if !s.store.remove(&id).is_empty() {
                self.sync.delete_item(id);
            }
            s.selection.deselect(&id);
        }
        for center in erase.bursts {
            self.particles.burst(center);
        }
        self.particles_dirty = true;
    }

    /// Drop any in-flight stroke or drag without committing it.
    pub(crate) fn abort_gestures(&mut self) {
        if self.stroke.is_active() {
            self.stroke.cancel(&mut self.state.scene);
            self.sync.stroke_end();
        }
        if !self.interaction.is_idle() {
            let s = &mut self.state;
            self.interaction.cancel(&mut s.store, &mut s.selection);
            if self.drag_snapshot {
                s.history.discard_last();
            }
            self.drag_snapshot = false;
            self.overlay_dirty = true;
        }
    }

    // --- Frame loop ---

    fn flush_cursor(&mut self, now_ms: f64, force: bool) {
        let Some(position) = self.pending_cursor else {
            return;
        };
        if !force && now_ms - self.last_cursor_ms < self.config.sync.batch_interval_ms {
            return;
        }
        self.pending_cursor = None;
        self.last_cursor_ms = now_ms;
        let tool = self.state.tools.current_tool;
        self.sync.cursor(position, tool, self.user_name.clone());
    }

    /// Advance timers, apply inbound events and bring the frame up to date.
    /// Returns `true` when the composited frame changed.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        let dt = self.last_tick_ms.map_or(0.0, |last| (now_ms - last).max(0.0));
        self.last_tick_ms = Some(now_ms);

        if self.stroke.is_active() {
            self.flush_batch(now_ms, false);
        }
        self.flush_cursor(now_ms, false);

        let report = self.sync.poll(&mut self.state.store);
        if report.items_changed {
            self.after_remote_change();
        }
        if report.presence_changed || self.sync.advance_cursors() {
            self.presence_dirty = true;
        }
        if !self.particles.is_empty() {
            self.particles.advance(dt);
            self.particles_dirty = true;
        }
        self.render()
    }

    fn after_remote_change(&mut self) {
        let s = &mut self.state;
        for item in s.store.iter() {
            s.z_alloc.observe(item.z_index);
        }
        self.prune_selection();
    }

    /// Drop selection and edit state that point at items which no longer exist.
    pub(crate) fn prune_selection(&mut self) {
        let s = &mut self.state;
        s.selection.retain_existing(&s.store);
        if let Some(id) = s.selection.editing() {
            if !s.store.contains(&id) {
                s.selection.exit_editing();
            }
        }
        self.overlay_dirty = true;
    }

    /// Rebuild whatever layers are out of date and composite.
    pub fn render(&mut self) -> bool {
        self.refresh();
        self.compositor
            .composite(&mut self.state.scene, &self.textures)
    }

    /// Bring every layer of the scene up to date without compositing.
    pub fn refresh(&mut self) {
        let view = self.state.camera.transform();
        if self.state.scene.view != view {
            let viewport = self.state.scene.viewport;
            self.state.scene.set_view(view, viewport);
            self.overlay_dirty = true;
            self.presence_dirty = true;
        }
        self.refresh_content();

        let zoom = self.state.camera.zoom;
        if self.overlay_dirty {
            self.rebuild_overlays(zoom);
        }
        if self.presence_dirty {
            let nodes = overlay::presence_nodes(&self.sync, zoom);
            self.state.scene.layer_mut(LayerKind::Cursors).set_nodes(nodes);
            self.presence_dirty = false;
        }
        if self.particles_dirty {
            let nodes = self.particles.nodes();
            self.state.scene.layer_mut(LayerKind::Particles).set_nodes(nodes);
            self.particles_dirty = false;
        }
    }

    /// Full re-render of the static layer when the store changed.
    fn refresh_content(&mut self) {
        let s = &mut self.state;
        if !s.take_content_dirty() {
            return;
        }
        self.renderer.rebuild(
            &s.store,
            s.selection.editing(),
            &mut self.textures,
            &mut s.scene,
            &mut s.index,
        );
        self.overlay_dirty = true;
    }

    fn rebuild_overlays(&mut self, zoom: f64) {
        let selection_nodes = self
            .state
            .selection
            .overlay_nodes(&self.state.store, zoom, &self.config.selection);
        let drag: Vec<SceneNode> = self
            .interaction
            .marquee()
            .map(|rect| overlay::marquee_node(rect, zoom))
            .into_iter()
            .collect();
        let ghost: Vec<SceneNode> = self.ghost_node(zoom).into_iter().collect();

        let scene = &mut self.state.scene;
        scene.layer_mut(LayerKind::Selection).set_nodes(selection_nodes);
        scene.layer_mut(LayerKind::Drag).set_nodes(drag);
        scene.layer_mut(LayerKind::Ghost).set_nodes(ghost);
        self.overlay_dirty = false;
    }

    /// Placement preview under the pointer for the active tool.
    fn ghost_node(&self, zoom: f64) -> Option<SceneNode> {
        if self.stroke.is_active() || !self.interaction.is_idle() {
            return None;
        }
        let pointer = self.state.pointer?;
        let tools = &self.state.tools;
        match tools.current_tool {
            ToolKind::StickyNote => Some(overlay::sticky_ghost(pointer, tools.settings.sticky_fill)),
            ToolKind::Stamp => Some(overlay::outline_ghost(
                pointer,
                StampData::DEFAULT_SIZE,
                StampData::DEFAULT_SIZE,
                zoom,
            )),
            ToolKind::Image => {
                let (url, w, h) = tools.pending_image.as_ref()?;
                let fitted = ImageData::fitted(url.as_str(), *w, *h);
                Some(overlay::outline_ghost(pointer, fitted.width, fitted.height, zoom))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetink_core::items::{Item, ItemData, PathData, SerializableColor, Transform};
    use meetink_core::scene::NodeKind;

    fn board() -> Whiteboard {
        Whiteboard::offline(EngineConfig::default(), Size::new(400.0, 300.0))
    }

    fn down(board: &mut Whiteboard, x: f64, y: f64, t: f64) {
        board.pointer_down(Point::new(x, y), PointerButton::Primary, Modifiers::NONE, t);
    }

    fn drag(board: &mut Whiteboard, from: Point, to: Point, steps: usize, t0: f64) {
        board.pointer_down(from, PointerButton::Primary, Modifiers::NONE, t0);
        for i in 1..=steps {
            let p = from.lerp(to, i as f64 / steps as f64);
            board.pointer_move(p, Modifiers::NONE, t0 + i as f64 * 16.0);
        }
        board.pointer_up(to, PointerButton::Primary, Modifiers::NONE, t0 + (steps + 1) as f64 * 16.0);
    }

    fn stroke(points: Vec<Point>) -> Item {
        Item::new(
            ItemData::Path(PathData::new(points, SerializableColor::black(), 2.0)),
            Transform::IDENTITY,
            1.0,
        )
    }

    #[test]
    fn test_pen_stroke_creates_path() {
        let mut board = board();
        board.set_tool(ToolKind::Pen);
        drag(&mut board, Point::new(10.0, 10.0), Point::new(200.0, 120.0), 30, 0.0);

        assert_eq!(board.store().len(), 1);
        let item = board.store().iter().next().unwrap();
        assert_eq!(item.kind(), ItemKind::Path);
        assert!(board.state().history.can_undo());
        assert!(board.scene().layer(LayerKind::Dynamic).is_empty());
    }

    #[test]
    fn test_store_change_rerenders_static_layer() {
        let mut board = board();
        board.tick(0.0);
        assert!(board.scene().layer(LayerKind::Static).is_empty());

        let item = stroke(vec![Point::new(0.0, 0.0), Point::new(50.0, 50.0)]);
        let id = item.id;
        board.load_items(vec![item]);
        assert!(board.tick(16.0));
        assert_eq!(board.scene().rendered_items(), vec![id]);
    }

    #[test]
    fn test_click_without_move_leaves_no_history() {
        let mut board = board();
        board.load_items(vec![stroke(vec![Point::new(0.0, 0.0), Point::new(100.0, 100.0)])]);
        down(&mut board, 50.0, 50.0, 0.0);
        board.pointer_up(Point::new(50.0, 50.0), PointerButton::Primary, Modifiers::NONE, 10.0);
        assert_eq!(board.selection().len(), 1);
        assert!(!board.state().history.can_undo());
    }

    #[test]
    fn test_drag_moves_item_and_records_history() {
        let mut board = board();
        let item = stroke(vec![Point::new(0.0, 0.0), Point::new(100.0, 100.0)]);
        let id = item.id;
        board.load_items(vec![item]);
        drag(&mut board, Point::new(50.0, 50.0), Point::new(80.0, 60.0), 5, 0.0);

        let moved = board.store().get(&id).unwrap();
        assert!((moved.transform.x - 30.0).abs() < 1e-9);
        assert!((moved.transform.y - 10.0).abs() < 1e-9);
        assert_eq!(board.state().history.undo_depth(), 1);
    }

    #[test]
    fn test_box_select_shows_marquee() {
        let mut board = board();
        board.load_items(vec![stroke(vec![Point::new(100.0, 100.0), Point::new(120.0, 120.0)])]);
        board.pointer_down(Point::new(300.0, 250.0), PointerButton::Primary, Modifiers::NONE, 0.0);
        board.pointer_move(Point::new(50.0, 50.0), Modifiers::NONE, 16.0);
        board.refresh();
        assert_eq!(board.scene().layer(LayerKind::Drag).nodes().len(), 1);
        assert_eq!(board.selection().len(), 1);

        board.pointer_up(Point::new(50.0, 50.0), PointerButton::Primary, Modifiers::NONE, 32.0);
        board.refresh();
        assert!(board.scene().layer(LayerKind::Drag).is_empty());
        assert_eq!(board.selection().len(), 1);
    }

    #[test]
    fn test_sticky_tool_shows_ghost_then_places() {
        let mut board = board();
        board.set_tool(ToolKind::StickyNote);
        board.pointer_move(Point::new(150.0, 150.0), Modifiers::NONE, 0.0);
        board.refresh();
        assert_eq!(board.scene().layer(LayerKind::Ghost).nodes().len(), 1);

        down(&mut board, 150.0, 150.0, 16.0);
        assert_eq!(board.store().len(), 1);
        let note = board.store().iter().next().unwrap();
        assert_eq!(note.transform.x, 50.0);
        assert_eq!(board.tools().current_tool, ToolKind::Select);
        board.refresh();
        assert!(board.scene().layer(LayerKind::Ghost).is_empty());
    }

    #[test]
    fn test_eraser_deletes_text_with_particles() {
        let mut board = board();
        let text = Item::new(
            ItemData::Text(meetink_core::items::TextData::new("erase me")),
            Transform::at(100.0, 100.0),
            1.0,
        );
        board.load_items(vec![text]);
        board.set_tool(ToolKind::Eraser);
        drag(&mut board, Point::new(90.0, 110.0), Point::new(200.0, 110.0), 12, 0.0);

        assert!(board.store().is_empty());
        assert!(!board.particles().is_empty());
        board.refresh();
        assert!(!board.scene().layer(LayerKind::Particles).is_empty());
        board.tick(0.0);
        board.tick(2000.0);
        assert!(board.particles().is_empty());
    }

    #[test]
    fn test_eraser_on_empty_board_changes_nothing() {
        let mut board = board();
        board.set_tool(ToolKind::Eraser);
        drag(&mut board, Point::new(10.0, 10.0), Point::new(60.0, 10.0), 6, 0.0);
        assert!(board.store().is_empty());
        assert!(!board.state().history.can_undo());
    }

    #[test]
    fn test_scroll_pans_and_zooms() {
        let mut board = board();
        board.scroll(Point::ZERO, Vec2::new(0.0, 20.0), Modifiers::NONE);
        assert_eq!(board.state().camera.offset, Vec2::new(0.0, -20.0));

        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        board.scroll(Point::new(200.0, 150.0), Vec2::new(0.0, -100.0), ctrl);
        assert!(board.state().zoom() > 1.0);
    }

    #[test]
    fn test_render_composites_frame() {
        let mut board = board();
        board.load_items(vec![stroke(vec![Point::new(10.0, 10.0), Point::new(10.0, 60.0)])]);
        assert!(board.render());
        let frame = board.compositor().frame();
        assert_eq!((frame.width(), frame.height()), (400, 300));
        assert!(frame.color_at(10, 30).r < 128);
        assert_eq!(frame.color_at(200, 200), SerializableColor::white());
        assert!(!board.render());
    }

    #[test]
    fn test_selection_overlay_follows_selection() {
        let mut board = board();
        board.load_items(vec![stroke(vec![Point::new(0.0, 0.0), Point::new(100.0, 100.0)])]);
        board.refresh();
        assert!(board.scene().layer(LayerKind::Selection).is_empty());
        down(&mut board, 50.0, 50.0, 0.0);
        board.refresh();
        let nodes = board.scene().layer(LayerKind::Selection).nodes();
        assert!(nodes.iter().any(|n| matches!(n.kind, NodeKind::Circle { .. })));
    }
}
