//! Selection state and the selection frame with its manipulation handles.

use kurbo::{Affine, Point, Rect, Vec2};

use crate::config::SelectionConfig;
use crate::geometry::{GroupBounds, Obb, group_bounds};
use crate::items::{ItemId, SerializableColor};
use crate::scene::{NodeKind, SceneNode, StrokeStyle};
use crate::store::ItemStore;

/// Selection accent color.
pub const SELECTION_COLOR: SerializableColor = SerializableColor::new(59, 130, 246, 255);

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
    /// Rotation handle above the top edge.
    Rotate,
}

impl HandleKind {
    /// Unit direction of the handle from the box center, in box coordinates.
    /// Components are -1, 0 or 1; zero means the axis is not resized.
    pub fn direction(&self) -> Vec2 {
        match self {
            HandleKind::Corner(Corner::TopLeft) => Vec2::new(-1.0, -1.0),
            HandleKind::Corner(Corner::TopRight) => Vec2::new(1.0, -1.0),
            HandleKind::Corner(Corner::BottomLeft) => Vec2::new(-1.0, 1.0),
            HandleKind::Corner(Corner::BottomRight) => Vec2::new(1.0, 1.0),
            HandleKind::Edge(Edge::Top) => Vec2::new(0.0, -1.0),
            HandleKind::Edge(Edge::Bottom) => Vec2::new(0.0, 1.0),
            HandleKind::Edge(Edge::Left) => Vec2::new(-1.0, 0.0),
            HandleKind::Edge(Edge::Right) => Vec2::new(1.0, 0.0),
            HandleKind::Rotate => Vec2::ZERO,
        }
    }

    pub fn is_corner(&self) -> bool {
        matches!(self, HandleKind::Corner(_))
    }
}

/// A selection handle with its position and type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Position in world coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a world point hits this handle. `tolerance` should be adjusted for zoom.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let dx = point.x - self.position.x;
        let dy = point.y - self.position.y;
        dx * dx + dy * dy <= tolerance * tolerance
    }
}

/// Handles for a frame at the given zoom. Side handles and the rotate handle are hidden when
/// the frame is too small on screen.
pub fn frame_handles(frame: &Obb, zoom: f64, config: &SelectionConfig) -> Vec<Handle> {
    let zoom = zoom.max(f64::EPSILON);
    let mut handles = Vec::with_capacity(9);
    let corners = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];
    for corner in corners {
        let kind = HandleKind::Corner(corner);
        handles.push(Handle::new(at(frame, kind), kind));
    }

    let screen_w = frame.width() * zoom;
    let screen_h = frame.height() * zoom;
    if screen_w >= config.min_side_handle_size {
        for edge in [Edge::Top, Edge::Bottom] {
            let kind = HandleKind::Edge(edge);
            handles.push(Handle::new(at(frame, kind), kind));
        }
    }
    if screen_h >= config.min_side_handle_size {
        for edge in [Edge::Left, Edge::Right] {
            let kind = HandleKind::Edge(edge);
            handles.push(Handle::new(at(frame, kind), kind));
        }
    }
    if screen_h >= config.min_rotate_handle_height {
        let offset = config.rotate_handle_offset / zoom;
        let top = frame.from_box(Vec2::new(0.0, -frame.half.y - offset));
        handles.push(Handle::new(top, HandleKind::Rotate));
    }
    handles
}

fn at(frame: &Obb, kind: HandleKind) -> Point {
    let d = kind.direction();
    frame.from_box(Vec2::new(d.x * frame.half.x, d.y * frame.half.y))
}

/// Ephemeral local selection. Never persisted or synchronized.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    selected: Vec<ItemId>,
    /// Item in the externally-managed text edit state.
    editing: Option<ItemId>,
    /// Frame forced during a drag, ahead of the store catching up.
    override_frame: Option<Obb>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &[ItemId] {
        &self.selected
    }

    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.selected.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Replace the selection with a single item.
    pub fn select(&mut self, id: ItemId) {
        self.selected.clear();
        self.selected.push(id);
    }

    pub fn add(&mut self, id: ItemId) {
        if !self.selected.contains(&id) {
            self.selected.push(id);
        }
    }

    pub fn toggle(&mut self, id: ItemId) {
        if self.selected.contains(&id) {
            self.deselect(&id);
        } else {
            self.selected.push(id);
        }
    }

    pub fn deselect(&mut self, id: &ItemId) {
        self.selected.retain(|s| s != id);
    }

    pub fn set(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.selected.clear();
        for id in ids {
            self.add(id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.override_frame = None;
    }

    /// Drop ids no longer present in the store.
    pub fn retain_existing(&mut self, store: &ItemStore) {
        self.selected.retain(|id| store.contains(id));
        if self.editing.is_some_and(|id| !store.contains(&id)) {
            self.editing = None;
        }
    }

    pub fn editing(&self) -> Option<ItemId> {
        self.editing
    }

    pub fn enter_editing(&mut self, id: ItemId) {
        self.editing = Some(id);
    }

    pub fn exit_editing(&mut self) -> Option<ItemId> {
        self.editing.take()
    }

    pub fn is_editing(&self, id: &ItemId) -> bool {
        self.editing.as_ref() == Some(id)
    }

    /// Force the frame to be drawn at an explicit box.
    pub fn set_override(&mut self, frame: Obb) {
        self.override_frame = Some(frame);
    }

    /// Return to deriving the frame from the selected items.
    pub fn clear_override(&mut self) {
        self.override_frame = None;
    }

    pub fn override_frame(&self) -> Option<Obb> {
        self.override_frame
    }

    /// Frame of the selection: the override if set, else the group bounds of the items.
    pub fn frame(&self, store: &ItemStore, config: &SelectionConfig) -> Option<GroupBounds> {
        if let Some(obb) = self.override_frame {
            return Some(GroupBounds {
                obb,
                oriented: obb.rotation != 0.0,
            });
        }
        group_bounds(
            self.selected.iter().filter_map(|id| store.get(id)),
            config.group_rotation_tolerance,
        )
    }

    pub fn handles(&self, store: &ItemStore, zoom: f64, config: &SelectionConfig) -> Vec<Handle> {
        match self.frame(store, config) {
            Some(frame) => frame_handles(&frame.obb, zoom, config),
            None => Vec::new(),
        }
    }

    /// Handle under a world point, if any.
    pub fn hit_handle(
        &self,
        store: &ItemStore,
        point: Point,
        zoom: f64,
        config: &SelectionConfig,
    ) -> Option<HandleKind> {
        let tolerance = config.handle_size / zoom.max(f64::EPSILON);
        // Rotate handle first, it sits outside the frame
        let mut handles = self.handles(store, zoom, config);
        handles.sort_by_key(|h| h.kind != HandleKind::Rotate);
        handles
            .into_iter()
            .find(|h| h.hit_test(point, tolerance))
            .map(|h| h.kind)
    }

    /// Whether a world point lies inside the selection frame.
    pub fn frame_contains(&self, store: &ItemStore, point: Point, config: &SelectionConfig) -> bool {
        self.frame(store, config)
            .is_some_and(|f| f.obb.contains(point, 0.0))
    }

    /// Overlay nodes for the current selection: the frame outline and its handles.
    pub fn overlay_nodes(&self, store: &ItemStore, zoom: f64, config: &SelectionConfig) -> Vec<SceneNode> {
        let Some(frame) = self.frame(store, config) else {
            return Vec::new();
        };
        let zoom = zoom.max(f64::EPSILON);
        let line = 1.5 / zoom;
        let obb = frame.obb;
        let mut nodes = Vec::new();

        // Frame outline, plus per-item outlines when several items are selected
        if self.selected.len() > 1 && self.override_frame.is_none() {
            for item in self.selected.iter().filter_map(|id| store.get(id)) {
                let item_obb = crate::geometry::item_obb(item);
                nodes.push(outline(&item_obb, StrokeStyle::dashed(SELECTION_COLOR, line * 0.66, 4.0 / zoom)));
            }
        }
        nodes.push(outline(&obb, StrokeStyle::solid(SELECTION_COLOR, line)));

        let size = config.handle_size / zoom;
        for handle in frame_handles(&obb, zoom, config) {
            let node = match handle.kind {
                HandleKind::Rotate => {
                    let stem_from = at(&obb, HandleKind::Edge(Edge::Top));
                    nodes.push(SceneNode::new(NodeKind::Stroke {
                        points: vec![stem_from, handle.position],
                        smoothed: false,
                        color: SELECTION_COLOR,
                        width: line,
                    }));
                    SceneNode::new(NodeKind::Circle {
                        center: handle.position,
                        radius: size / 2.0,
                        fill: Some(SerializableColor::white()),
                        stroke: Some(StrokeStyle::solid(SELECTION_COLOR, line)),
                    })
                }
                _ => SceneNode::new(NodeKind::Rect {
                    rect: Rect::from_center_size(Point::ZERO, (size, size)),
                    radius: 0.0,
                    fill: Some(SerializableColor::white()),
                    stroke: Some(StrokeStyle::solid(SELECTION_COLOR, line)),
                })
                .with_transform(
                    Affine::translate(handle.position.to_vec2()) * Affine::rotate(obb.rotation),
                ),
            };
            nodes.push(node);
        }
        nodes
    }
}

/// Closed outline of a box.
pub fn outline(obb: &Obb, style: StrokeStyle) -> SceneNode {
    let [a, b, c, d] = obb.corners();
    match style.dash {
        Some(dash) => SceneNode::group(
            [(a, b), (b, c), (c, d), (d, a)]
                .into_iter()
                .flat_map(|(p, q)| dashes(p, q, dash))
                .map(|(p, q)| {
                    SceneNode::new(NodeKind::Stroke {
                        points: vec![p, q],
                        smoothed: false,
                        color: style.color,
                        width: style.width,
                    })
                })
                .collect(),
        ),
        None => SceneNode::new(NodeKind::Stroke {
            points: vec![a, b, c, d, a],
            smoothed: false,
            color: style.color,
            width: style.width,
        }),
    }
}

fn dashes(p: Point, q: Point, dash: f64) -> Vec<(Point, Point)> {
    let len = p.distance(q);
    if dash <= 0.0 || len <= dash {
        return vec![(p, q)];
    }
    let dir = (q - p) / len;
    let mut out = Vec::new();
    let mut t = 0.0;
    while t < len {
        let end = (t + dash).min(len);
        out.push((p + dir * t, p + dir * end));
        t += dash * 2.0;
    }
    out
}
