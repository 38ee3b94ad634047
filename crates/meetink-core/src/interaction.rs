//! Pointer interaction with existing items: select, move, resize, rotate and box-select.
//!
//! Drags always work from the transforms captured at pointer-down, so every move event
//! recomputes the result from scratch instead of accumulating deltas.

use std::collections::HashMap;

use kurbo::{Point, Rect, Vec2};

use crate::config::SelectionConfig;
use crate::geometry::{self, Obb, angle_diff, local_center, pivot, rotate_about, snap_angle};
use crate::input::Modifiers;
use crate::items::{Item, ItemId, Transform};
use crate::selection::{HandleKind, SelectionManager};
use crate::spatial::SpatialIndex;
use crate::store::{ItemStore, sort_for_paint};

/// Within this of a right angle an item counts as aligned with the frame.
const ALIGNMENT_TOLERANCE: f64 = 0.1;

/// Transform and pivot of an item when the drag started.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Origin {
    transform: Transform,
    center: Point,
    pivot: Point,
}

impl Origin {
    fn of(item: &Item) -> Self {
        Self {
            transform: item.transform,
            center: local_center(item),
            pivot: pivot(item),
        }
    }

    /// Transform that puts the item's pivot at `pivot`.
    fn placed_at(&self, pivot: Point) -> Transform {
        Transform {
            x: pivot.x - self.center.x,
            y: pivot.y - self.center.y,
            ..self.transform
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveDrag {
    start: Point,
    origins: HashMap<ItemId, Origin>,
    frame: Option<Obb>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandleDrag {
    handle: HandleKind,
    origins: HashMap<ItemId, Origin>,
    frame: Obb,
    start_angle: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxSelect {
    start: Point,
    current: Point,
    base: Vec<ItemId>,
}

impl BoxSelect {
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.start, self.current)
    }
}

/// Interaction state machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingMove(MoveDrag),
    DraggingHandle(HandleDrag),
    BoxSelect(BoxSelect),
}

/// What a pointer-down started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Handle(HandleKind),
    Move,
    BoxSelect,
}

impl PressOutcome {
    /// Whether the press begins an edit that needs a history snapshot.
    pub fn mutates(&self) -> bool {
        !matches!(self, PressOutcome::BoxSelect)
    }
}

/// Topmost root item under `point`, testing oriented bounds grown by `padding`.
pub fn item_at(store: &ItemStore, index: &SpatialIndex, point: Point, padding: f64) -> Option<ItemId> {
    let hits = index.query_point(point, padding);
    let mut candidates: Vec<&Item> = hits
        .iter()
        .filter_map(|id| store.get(id))
        .filter(|item| item.is_root())
        .collect();
    sort_for_paint(&mut candidates);
    candidates
        .into_iter()
        .rev()
        .find(|item| geometry::hit_test(item, point, padding))
        .map(|item| item.id)
}

/// Root items whose bounds intersect `rect`, in paint order.
pub fn items_in_rect(store: &ItemStore, index: &SpatialIndex, rect: Rect) -> Vec<ItemId> {
    let hits = index.query_rect(rect);
    let mut items: Vec<&Item> = hits
        .iter()
        .filter_map(|id| store.get(id))
        .filter(|item| item.is_root())
        .collect();
    sort_for_paint(&mut items);
    items.into_iter().map(|item| item.id).collect()
}

#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: InteractionState,
    config: SelectionConfig,
}

impl InteractionController {
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            state: InteractionState::Idle,
            config,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == InteractionState::Idle
    }

    /// The marquee rectangle while box-selecting.
    pub fn marquee(&self) -> Option<Rect> {
        match &self.state {
            InteractionState::BoxSelect(b) => Some(b.rect()),
            _ => None,
        }
    }

    pub fn pointer_down(
        &mut self,
        store: &ItemStore,
        index: &SpatialIndex,
        selection: &mut SelectionManager,
        point: Point,
        modifiers: Modifiers,
        zoom: f64,
    ) -> PressOutcome {
        let zoom = zoom.max(f64::EPSILON);
        selection.retain_existing(store);

        if !selection.is_empty() {
            let handle = selection.hit_handle(store, point, zoom, &self.config);
            let frame = selection.frame(store, &self.config);
            if let (Some(handle), Some(frame)) = (handle, frame) {
                let center = frame.obb.center;
                self.state = InteractionState::DraggingHandle(HandleDrag {
                    handle,
                    origins: origins(store, selection.selected()),
                    frame: frame.obb,
                    start_angle: (point - center).atan2(),
                });
                return PressOutcome::Handle(handle);
            }
            if !modifiers.extends_selection() && selection.frame_contains(store, point, &self.config) {
                self.begin_move(store, selection, point);
                return PressOutcome::Move;
            }
        }

        let padding = self.config.hit_padding / zoom;
        if let Some(id) = item_at(store, index, point, padding) {
            if modifiers.extends_selection() {
                selection.add(id);
            } else if !selection.is_selected(&id) {
                selection.select(id);
            }
            self.begin_move(store, selection, point);
            return PressOutcome::Move;
        }

        if !modifiers.extends_selection() {
            selection.clear();
        }
        self.state = InteractionState::BoxSelect(BoxSelect {
            start: point,
            current: point,
            base: selection.selected().to_vec(),
        });
        PressOutcome::BoxSelect
    }

    fn begin_move(&mut self, store: &ItemStore, selection: &SelectionManager, point: Point) {
        self.state = InteractionState::DraggingMove(MoveDrag {
            start: point,
            origins: origins(store, selection.selected()),
            frame: selection.frame(store, &self.config).map(|f| f.obb),
        });
    }

    /// Advance the active drag. Returns `true` if items or the selection changed.
    pub fn pointer_move(
        &mut self,
        store: &mut ItemStore,
        index: &SpatialIndex,
        selection: &mut SelectionManager,
        point: Point,
        modifiers: Modifiers,
    ) -> bool {
        match &mut self.state {
            InteractionState::Idle => false,
            InteractionState::DraggingMove(drag) => {
                let delta = point - drag.start;
                let mut changed = false;
                for (id, origin) in &drag.origins {
                    let target = origin.transform.translated(delta.x, delta.y);
                    changed |= store.update_with(id, |item| item.transform = target);
                }
                if let Some(frame) = drag.frame {
                    selection.set_override(Obb {
                        center: frame.center + delta,
                        ..frame
                    });
                }
                changed
            }
            InteractionState::DraggingHandle(drag) => {
                let (targets, frame) = match drag.handle {
                    HandleKind::Rotate => rotate_targets(drag, point, modifiers.shift, &self.config),
                    _ => resize_targets(drag, point, modifiers.shift, &self.config),
                };
                let mut changed = false;
                for (id, target) in targets {
                    changed |= store.update_with(&id, |item| item.transform = target);
                }
                selection.set_override(frame);
                changed
            }
            InteractionState::BoxSelect(b) => {
                b.current = point;
                let mut ids = b.base.clone();
                for id in items_in_rect(store, index, b.rect()) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                if ids.as_slice() == selection.selected() {
                    return false;
                }
                selection.set(ids);
                true
            }
        }
    }

    /// Finish the interaction. Returns the ids whose transform differs from pointer-down.
    pub fn pointer_up(&mut self, store: &ItemStore, selection: &mut SelectionManager) -> Vec<ItemId> {
        selection.clear_override();
        let origins = match std::mem::take(&mut self.state) {
            InteractionState::DraggingMove(drag) => drag.origins,
            InteractionState::DraggingHandle(drag) => drag.origins,
            InteractionState::BoxSelect(_) | InteractionState::Idle => return Vec::new(),
        };
        let mut changed: Vec<ItemId> = origins
            .into_iter()
            .filter(|(id, origin)| {
                store
                    .get(id)
                    .is_some_and(|item| item.transform != origin.transform)
            })
            .map(|(id, _)| id)
            .collect();
        // Stable broadcast order
        changed.sort_by_key(|id| selection.selected().iter().position(|s| s == id));
        changed
    }

    /// Abandon the interaction, restoring every item to its pointer-down transform.
    pub fn cancel(&mut self, store: &mut ItemStore, selection: &mut SelectionManager) {
        selection.clear_override();
        let origins = match std::mem::take(&mut self.state) {
            InteractionState::DraggingMove(drag) => drag.origins,
            InteractionState::DraggingHandle(drag) => drag.origins,
            _ => return,
        };
        for (id, origin) in origins {
            store.update_with(&id, |item| item.transform = origin.transform);
        }
    }
}

fn origins(store: &ItemStore, ids: &[ItemId]) -> HashMap<ItemId, Origin> {
    ids.iter()
        .filter_map(|id| store.get(id))
        .map(|item| (item.id, Origin::of(item)))
        .collect()
}

/// New transforms and frame for a rotate drag.
fn rotate_targets(
    drag: &HandleDrag,
    point: Point,
    snap: bool,
    config: &SelectionConfig,
) -> (Vec<(ItemId, Transform)>, Obb) {
    let center = drag.frame.center;
    let angle = (point - center).atan2();
    let mut delta = angle_diff(angle, drag.start_angle);
    if snap {
        let target = snap_angle(drag.frame.rotation + delta, config.snap_angle_deg.to_radians());
        delta = target - drag.frame.rotation;
    }

    let group = drag.origins.len() > 1;
    let targets = drag
        .origins
        .iter()
        .map(|(id, origin)| {
            let mut t = if group {
                origin.placed_at(rotate_about(origin.pivot, center, delta))
            } else {
                origin.transform
            };
            t.rotation = origin.transform.rotation + delta;
            (*id, t)
        })
        .collect();
    let frame = Obb {
        rotation: drag.frame.rotation + delta,
        ..drag.frame
    };
    (targets, frame)
}

/// New transforms and frame for a resize drag, anchored on the opposite edge or corner.
fn resize_targets(
    drag: &HandleDrag,
    point: Point,
    keep_aspect: bool,
    config: &SelectionConfig,
) -> (Vec<(ItemId, Transform)>, Obb) {
    let frame = drag.frame;
    let dir = drag.handle.direction();
    let anchor = Vec2::new(-dir.x * frame.half.x, -dir.y * frame.half.y);
    let pointer = frame.to_box(point);

    let axis_scale = |d: f64, p: f64, a: f64, half: f64| -> f64 {
        if d == 0.0 || half <= f64::EPSILON {
            1.0
        } else {
            ((p - a) * d / (half * 2.0)).max(config.min_scale)
        }
    };
    let mut sx = axis_scale(dir.x, pointer.x, anchor.x, frame.half.x);
    let mut sy = axis_scale(dir.y, pointer.y, anchor.y, frame.half.y);
    if keep_aspect {
        let s = match (dir.x == 0.0, dir.y == 0.0) {
            (true, _) => sy,
            (_, true) => sx,
            _ => sx.max(sy),
        };
        sx = s;
        sy = s;
    }

    let remap = |p: Vec2| Vec2::new(anchor.x + (p.x - anchor.x) * sx, anchor.y + (p.y - anchor.y) * sy);

    let targets = drag
        .origins
        .iter()
        .map(|(id, origin)| {
            let new_pivot = frame.from_box(remap(frame.to_box(origin.pivot)));
            let (fx, fy) = item_scale_factors(origin.transform.rotation - frame.rotation, sx, sy);
            let mut t = origin.placed_at(new_pivot);
            t.scale_x = origin.transform.scale_x * fx;
            t.scale_y = origin.transform.scale_y * fy;
            (*id, t)
        })
        .collect();

    let new_frame = Obb::new(
        frame.from_box(remap(Vec2::ZERO)),
        Vec2::new(frame.half.x * sx, frame.half.y * sy),
        frame.rotation,
    );
    (targets, new_frame)
}

/// Split a frame-space scale into an item's own axes. Items at a quarter turn swap axes;
/// items at any other angle scale uniformly.
fn item_scale_factors(relative_rotation: f64, sx: f64, sy: f64) -> (f64, f64) {
    let (s, c) = relative_rotation.sin_cos();
    if s.abs() < ALIGNMENT_TOLERANCE {
        (sx, sy)
    } else if c.abs() < ALIGNMENT_TOLERANCE {
        (sy, sx)
    } else {
        let g = (sx * sy).sqrt();
        (g, g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuadtreeConfig;
    use crate::items::{ImageData, ItemData};
    use crate::selection::{Corner, Edge};
    use std::f64::consts::FRAC_PI_2;

    struct Board {
        store: ItemStore,
        index: SpatialIndex,
        selection: SelectionManager,
        controller: InteractionController,
    }

    impl Board {
        fn new(items: Vec<Item>) -> Self {
            let mut store = ItemStore::new();
            for item in items {
                store.upsert(item);
            }
            let mut board = Self {
                store,
                index: SpatialIndex::new(QuadtreeConfig::default()),
                selection: SelectionManager::new(),
                controller: InteractionController::default(),
            };
            board.reindex();
            board
        }

        fn reindex(&mut self) {
            self.index.rebuild(self.store.render_order());
        }

        fn down(&mut self, p: Point, modifiers: Modifiers) -> PressOutcome {
            self.controller.pointer_down(
                &self.store,
                &self.index,
                &mut self.selection,
                p,
                modifiers,
                1.0,
            )
        }

        fn drag(&mut self, p: Point, modifiers: Modifiers) -> bool {
            self.controller
                .pointer_move(&mut self.store, &self.index, &mut self.selection, p, modifiers)
        }

        fn up(&mut self) -> Vec<ItemId> {
            self.controller.pointer_up(&self.store, &mut self.selection)
        }

        fn transform(&self, id: &ItemId) -> Transform {
            self.store.get(id).unwrap().transform
        }
    }

    fn image_at(x: f64, y: f64, w: f64, h: f64) -> Item {
        Item::new(
            ItemData::Image(ImageData::new("u", w, h)),
            Transform::at(x, y),
            x,
        )
    }

    #[test]
    fn test_click_selects_and_moves() {
        let item = image_at(0.0, 0.0, 100.0, 100.0);
        let id = item.id;
        let mut board = Board::new(vec![item]);

        assert_eq!(board.down(Point::new(50.0, 50.0), Modifiers::NONE), PressOutcome::Move);
        assert_eq!(board.selection.selected(), &[id]);
        assert!(board.drag(Point::new(80.0, 60.0), Modifiers::NONE));
        assert!(board.selection.override_frame().is_some());

        let changed = board.up();
        assert_eq!(changed, vec![id]);
        let t = board.transform(&id);
        assert_eq!((t.x, t.y), (30.0, 10.0));
        assert!(board.selection.override_frame().is_none());
        assert!(board.controller.is_idle());
    }

    #[test]
    fn test_click_without_motion_reports_nothing() {
        let item = image_at(0.0, 0.0, 100.0, 100.0);
        let mut board = Board::new(vec![item]);
        board.down(Point::new(50.0, 50.0), Modifiers::NONE);
        assert!(board.up().is_empty());
    }

    #[test]
    fn test_empty_click_clears_and_box_selects() {
        let a = image_at(0.0, 0.0, 50.0, 50.0);
        let b = image_at(200.0, 0.0, 50.0, 50.0);
        let c = image_at(0.0, 300.0, 50.0, 50.0);
        let (a_id, b_id) = (a.id, b.id);
        let mut board = Board::new(vec![a, b, c]);

        board.selection.select(a_id);
        assert_eq!(
            board.down(Point::new(-20.0, -20.0), Modifiers::NONE),
            PressOutcome::BoxSelect
        );
        assert!(board.selection.is_empty());

        board.drag(Point::new(260.0, 60.0), Modifiers::NONE);
        assert_eq!(board.controller.marquee(), Some(Rect::new(-20.0, -20.0, 260.0, 60.0)));
        assert_eq!(board.selection.selected(), &[a_id, b_id]);
        assert!(board.up().is_empty());
        assert_eq!(board.selection.len(), 2);
    }

    #[test]
    fn test_shift_click_extends_selection() {
        let a = image_at(0.0, 0.0, 50.0, 50.0);
        let b = image_at(200.0, 0.0, 50.0, 50.0);
        let (a_id, b_id) = (a.id, b.id);
        let mut board = Board::new(vec![a, b]);
        board.down(Point::new(25.0, 25.0), Modifiers::NONE);
        board.up();
        board.down(Point::new(225.0, 25.0), Modifiers::shift());
        board.up();
        assert_eq!(board.selection.selected(), &[a_id, b_id]);
    }

    #[test]
    fn test_group_move_applies_same_delta() {
        let a = image_at(0.0, 0.0, 50.0, 50.0);
        let b = image_at(200.0, 0.0, 50.0, 50.0);
        let (a_id, b_id) = (a.id, b.id);
        let mut board = Board::new(vec![a, b]);
        board.selection.set([a_id, b_id]);

        // Inside the group frame but over empty space
        assert_eq!(board.down(Point::new(125.0, 25.0), Modifiers::NONE), PressOutcome::Move);
        board.drag(Point::new(125.0, 125.0), Modifiers::NONE);
        let mut changed = board.up();
        changed.sort();
        let mut expected = vec![a_id, b_id];
        expected.sort();
        assert_eq!(changed, expected);
        assert_eq!(board.transform(&a_id).y, 100.0);
        assert_eq!(board.transform(&b_id).y, 100.0);
    }

    #[test]
    fn test_rotate_single_item_with_snap() {
        let item = image_at(0.0, 0.0, 100.0, 100.0);
        let id = item.id;
        let mut board = Board::new(vec![item]);
        board.selection.select(id);

        // Rotate handle sits 24px above the top edge
        let outcome = board.down(Point::new(50.0, -24.0), Modifiers::NONE);
        assert_eq!(outcome, PressOutcome::Handle(HandleKind::Rotate));

        // Quarter turn clockwise: handle moves to the right of center
        board.drag(Point::new(150.0, 52.0), Modifiers::shift());
        let t = board.transform(&id);
        assert!((t.rotation - FRAC_PI_2).abs() < 1e-9, "rotation {}", t.rotation);
        assert_eq!((t.x, t.y), (0.0, 0.0));
        assert_eq!(board.up(), vec![id]);
    }

    #[test]
    fn test_rotate_group_revolves_centers() {
        let a = image_at(0.0, 0.0, 20.0, 20.0);
        let b = image_at(80.0, 0.0, 20.0, 20.0);
        let (a_id, b_id) = (a.id, b.id);
        let mut board = Board::new(vec![a, b]);
        board.selection.set([a_id, b_id]);

        let frame = board
            .selection
            .frame(&board.store, &SelectionConfig::default())
            .unwrap()
            .obb;
        assert_eq!(frame.center, Point::new(50.0, 10.0));
        let handle = Point::new(50.0, 0.0 - 24.0);
        assert_eq!(
            board.down(handle, Modifiers::NONE),
            PressOutcome::Handle(HandleKind::Rotate)
        );
        // Half turn
        board.drag(Point::new(50.0, 44.0), Modifiers::NONE);

        let pa = pivot(board.store.get(&a_id).unwrap());
        let pb = pivot(board.store.get(&b_id).unwrap());
        assert!((pa.x - 90.0).abs() < 1e-9 && (pa.y - 10.0).abs() < 1e-9, "{pa:?}");
        assert!((pb.x - 10.0).abs() < 1e-9 && (pb.y - 10.0).abs() < 1e-9, "{pb:?}");
    }

    #[test]
    fn test_resize_corner_keeps_opposite_corner() {
        let item = image_at(0.0, 0.0, 100.0, 50.0);
        let id = item.id;
        let mut board = Board::new(vec![item]);
        board.selection.select(id);

        assert_eq!(
            board.down(Point::new(100.0, 50.0), Modifiers::NONE),
            PressOutcome::Handle(HandleKind::Corner(Corner::BottomRight))
        );
        board.drag(Point::new(200.0, 75.0), Modifiers::NONE);
        let item = board.store.get(&id).unwrap();
        let obb = geometry::item_obb(item);
        let [tl, _, br, _] = obb.corners();
        assert!((tl - Point::new(0.0, 0.0)).hypot() < 1e-9, "{tl:?}");
        assert!((br - Point::new(200.0, 75.0)).hypot() < 1e-9, "{br:?}");
        assert!((item.transform.scale_x - 2.0).abs() < 1e-9);
        assert!((item.transform.scale_y - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_resize_edge_with_aspect_lock() {
        let item = image_at(0.0, 0.0, 100.0, 100.0);
        let id = item.id;
        let mut board = Board::new(vec![item]);
        board.selection.select(id);

        assert_eq!(
            board.down(Point::new(100.0, 50.0), Modifiers::NONE),
            PressOutcome::Handle(HandleKind::Edge(Edge::Right))
        );
        board.drag(Point::new(150.0, 50.0), Modifiers::shift());
        let t = board.transform(&id);
        assert!((t.scale_x - 1.5).abs() < 1e-9);
        assert!((t.scale_y - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_resize_clamps_to_min_scale() {
        let item = image_at(0.0, 0.0, 100.0, 100.0);
        let id = item.id;
        let mut board = Board::new(vec![item]);
        board.selection.select(id);
        board.down(Point::new(100.0, 100.0), Modifiers::NONE);
        board.drag(Point::new(-300.0, -300.0), Modifiers::NONE);
        let t = board.transform(&id);
        assert!((t.scale_x - SelectionConfig::default().min_scale).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_restores_transforms() {
        let item = image_at(0.0, 0.0, 100.0, 100.0);
        let id = item.id;
        let mut board = Board::new(vec![item]);
        board.down(Point::new(50.0, 50.0), Modifiers::NONE);
        board.drag(Point::new(90.0, 90.0), Modifiers::NONE);
        board
            .controller
            .cancel(&mut board.store, &mut board.selection);
        assert_eq!(board.transform(&id), Transform::at(0.0, 0.0));
    }

    #[test]
    fn test_item_at_prefers_topmost() {
        let low = image_at(0.0, 0.0, 100.0, 100.0);
        let mut high = image_at(50.0, 50.0, 100.0, 100.0);
        high.z_index = 1000.0;
        let high_id = high.id;
        let board = Board::new(vec![low, high]);
        assert_eq!(
            item_at(&board.store, &board.index, Point::new(75.0, 75.0), 0.0),
            Some(high_id)
        );
        assert_eq!(
            item_at(&board.store, &board.index, Point::new(500.0, 500.0), 0.0),
            None
        );
    }
}
