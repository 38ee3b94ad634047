//! Retained scene graph: a fixed stack of layers holding renderable nodes.
//!
//! Nodes are backend-neutral. A compositor walks the layers bottom to top; the dynamic layer
//! additionally queues freshly appended stroke segments so an in-progress stroke costs O(1)
//! per pointer sample instead of a full replay.

use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::items::{ItemId, SerializableColor as Rgba};
use crate::text_layout::TextLayout;

/// Scene layers, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Static,
    Dynamic,
    Ghost,
    Particles,
    Selection,
    Drag,
    Cursors,
}

impl LayerKind {
    pub const ALL: [LayerKind; 7] = [
        LayerKind::Static,
        LayerKind::Dynamic,
        LayerKind::Ghost,
        LayerKind::Particles,
        LayerKind::Selection,
        LayerKind::Drag,
        LayerKind::Cursors,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Layers holding board content rather than overlays.
    pub fn is_content(self) -> bool {
        matches!(self, LayerKind::Static | LayerKind::Dynamic)
    }
}

/// How a node's pixels combine with what is beneath it in the same content stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeBlend {
    #[default]
    Normal,
    /// Remove destination alpha under the node's coverage.
    Erase,
}

/// Load state of a texture referenced by an image node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureState {
    #[default]
    Pending,
    Ready,
    Failed,
}

/// Stroke styling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba,
    pub width: f64,
    pub dash: Option<f64>,
}

impl StrokeStyle {
    pub fn solid(color: Rgba, width: f64) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub fn dashed(color: Rgba, width: f64, dash: f64) -> Self {
        Self {
            color,
            width,
            dash: Some(dash),
        }
    }
}

/// Renderable content of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Polyline through `points`, optionally smoothed with quadratic curves.
    Stroke {
        points: Vec<Point>,
        smoothed: bool,
        color: Rgba,
        width: f64,
    },
    Rect {
        rect: Rect,
        radius: f64,
        fill: Option<Rgba>,
        stroke: Option<StrokeStyle>,
    },
    Circle {
        center: Point,
        radius: f64,
        fill: Option<Rgba>,
        stroke: Option<StrokeStyle>,
    },
    /// Closed polygon (folded corners, stamp glyphs, cursor arrows).
    Polygon {
        points: Vec<Point>,
        fill: Rgba,
    },
    Text {
        layout: TextLayout,
        color: Rgba,
        font_size: f64,
    },
    /// Texture placed into `rect`; drawn as a placeholder until the texture is ready.
    Image {
        url: String,
        rect: Rect,
        state: TextureState,
    },
    Group {
        children: Vec<SceneNode>,
        clip: Option<Rect>,
    },
    /// Children rendered together into an offscreen target covering `bounds`, then the
    /// result is drawn in place. Erase-blended children only affect this target.
    Offscreen {
        bounds: Rect,
        children: Vec<SceneNode>,
    },
}

/// A positioned node.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Item this node was synthesized from, if any.
    pub item: Option<ItemId>,
    pub transform: Affine,
    pub kind: NodeKind,
    pub blend: NodeBlend,
    pub opacity: f64,
    pub hidden: bool,
}

impl SceneNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            item: None,
            transform: Affine::IDENTITY,
            kind,
            blend: NodeBlend::Normal,
            opacity: 1.0,
            hidden: false,
        }
    }

    pub fn group(children: Vec<SceneNode>) -> Self {
        Self::new(NodeKind::Group {
            children,
            clip: None,
        })
    }

    pub fn with_item(mut self, id: ItemId) -> Self {
        self.item = Some(id);
        self
    }

    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_blend(mut self, blend: NodeBlend) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn children(&self) -> &[SceneNode] {
        match &self.kind {
            NodeKind::Group { children, .. } | NodeKind::Offscreen { children, .. } => children,
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<SceneNode>> {
        match &mut self.kind {
            NodeKind::Group { children, .. } | NodeKind::Offscreen { children, .. } => {
                Some(children)
            }
            _ => None,
        }
    }

    /// Visit this node and all descendants mutably.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        f(self);
        if let Some(children) = self.children_mut() {
            for child in children {
                child.walk_mut(f);
            }
        }
    }

    /// Visit this node and all descendants.
    pub fn walk(&self, f: &mut impl FnMut(&SceneNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

/// A segment appended to an in-progress stroke, queued for incremental drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSegment {
    pub from: Point,
    pub to: Point,
    pub color: Rgba,
    pub width: f64,
    pub blend: NodeBlend,
}

/// One layer of the scene.
#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    nodes: Vec<SceneNode>,
    pub visible: bool,
    revision: u64,
    pending_segments: Vec<StrokeSegment>,
}

impl Layer {
    fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            visible: true,
            revision: 0,
            pending_segments: Vec::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Bumped on every structural change; compositors use it to invalidate caches.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.nodes.is_empty() || !self.pending_segments.is_empty() {
            self.nodes.clear();
            self.pending_segments.clear();
            self.revision += 1;
        }
    }

    pub fn push(&mut self, node: SceneNode) {
        self.nodes.push(node);
        self.revision += 1;
    }

    pub fn set_nodes(&mut self, nodes: Vec<SceneNode>) {
        self.nodes = nodes;
        self.pending_segments.clear();
        self.revision += 1;
    }

    /// Begin a new stroke node that can be extended segment by segment.
    pub fn begin_stroke(&mut self, start: Point, color: Rgba, width: f64, blend: NodeBlend) {
        self.push(
            SceneNode::new(NodeKind::Stroke {
                points: vec![start],
                smoothed: false,
                color,
                width,
            })
            .with_blend(blend),
        );
    }

    /// Append a point to the last stroke node and queue the new segment.
    ///
    /// Does not bump the revision: the compositor draws just the queued segment.
    pub fn extend_stroke(&mut self, point: Point) -> bool {
        let Some(node) = self.nodes.last_mut() else {
            return false;
        };
        let blend = node.blend;
        match &mut node.kind {
            NodeKind::Stroke {
                points,
                color,
                width,
                ..
            } => {
                let from = points.last().copied().unwrap_or(point);
                points.push(point);
                self.pending_segments.push(StrokeSegment {
                    from,
                    to: point,
                    color: *color,
                    width: *width,
                    blend,
                });
                true
            }
            _ => false,
        }
    }

    /// Segments appended since the last call.
    pub fn take_segments(&mut self) -> Vec<StrokeSegment> {
        std::mem::take(&mut self.pending_segments)
    }

    pub fn has_pending_segments(&self) -> bool {
        !self.pending_segments.is_empty()
    }

    /// Mark the layer as needing a full repaint.
    pub fn invalidate(&mut self) {
        self.revision += 1;
    }

    pub fn walk_mut(&mut self, mut f: impl FnMut(&mut SceneNode)) {
        for node in &mut self.nodes {
            node.walk_mut(&mut f);
        }
    }
}

/// The layer stack.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    layers: Vec<Layer>,
    /// World → screen transform applied to every layer.
    pub view: Affine,
    pub viewport: Size,
    pub background: Rgba,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new(Size::new(1280.0, 720.0))
    }
}

impl SceneGraph {
    pub fn new(viewport: Size) -> Self {
        Self {
            layers: LayerKind::ALL.iter().map(|k| Layer::new(*k)).collect(),
            view: Affine::IDENTITY,
            viewport,
            background: Rgba::white(),
        }
    }

    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut Layer {
        &mut self.layers[kind.index()]
    }

    /// Layers bottom to top.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut()
    }

    pub fn set_view(&mut self, view: Affine, viewport: Size) {
        if self.view != view || self.viewport != viewport {
            self.view = view;
            self.viewport = viewport;
            for layer in &mut self.layers {
                layer.invalidate();
            }
        }
    }

    /// Current zoom factor of the view transform.
    pub fn zoom(&self) -> f64 {
        let c = self.view.as_coeffs();
        Vec2::new(c[0], c[1]).hypot()
    }

    /// Swap the placeholder of every image node showing `url`. Returns the number swapped.
    pub fn set_texture_state(&mut self, url: &str, new_state: TextureState) -> usize {
        let mut swapped = 0;
        for layer in &mut self.layers {
            let mut touched = false;
            layer.walk_mut(|node| {
                if let NodeKind::Image { url: u, state, .. } = &mut node.kind {
                    if u == url && *state != new_state {
                        *state = new_state;
                        touched = true;
                        swapped += 1;
                    }
                }
            });
            if touched {
                layer.invalidate();
            }
        }
        swapped
    }

    /// Ids of items with a node in the static layer.
    pub fn rendered_items(&self) -> Vec<ItemId> {
        let mut out = Vec::new();
        for node in self.layer(LayerKind::Static).nodes() {
            node.walk(&mut |n| {
                if let Some(id) = n.item {
                    out.push(id);
                }
            });
        }
        out
    }

    /// Top-level static node synthesized for `id`.
    pub fn find_item_node(&self, id: ItemId) -> Option<&SceneNode> {
        self.layer(LayerKind::Static)
            .nodes()
            .iter()
            .find(|n| n.item == Some(id))
    }
}
