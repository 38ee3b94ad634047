//! Converts board items into scene nodes.
//!
//! Every item node is built in the item's local space and placed with the center-pivot
//! affine from [`item_affine`], so the rendered box and the interaction box always agree.

use std::collections::HashSet;

use kurbo::{Point, Rect, Vec2};
use meetink_core::geometry::{item_affine, local_bounds};
use meetink_core::items::{
    Erasure, Item, ItemData, ItemId, PathData, SerializableColor as Rgba, StickyNoteData, StrokeBlend,
};
use meetink_core::scene::{LayerKind, NodeBlend, NodeKind, SceneGraph, SceneNode};
use meetink_core::spatial::SpatialIndex;
use meetink_core::store::ItemStore;
use meetink_core::text_layout::layout_text;

use crate::texture::TextureCache;

const NOTE_SHADOW: Rgba = Rgba::new(0, 0, 0, 40);
const NOTE_SHADOW_OFFSET: Vec2 = Vec2::new(2.0, 4.0);
const NOTE_RADIUS: f64 = 2.0;

/// Output of a full re-render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub roots: usize,
    pub children: usize,
}

/// Builds the static layer from the item store.
#[derive(Debug, Default)]
pub struct ItemRenderer {
    last: RenderStats,
}

impl ItemRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_stats(&self) -> RenderStats {
        self.last
    }

    /// Full re-render: rebuild the spatial index over root items and replace the static
    /// layer with one node per root, in paint order.
    ///
    /// `editing` is the text item in the external edit state; its node is kept but hidden.
    /// Textures referenced by no item are dropped from the cache.
    pub fn rebuild(
        &mut self,
        store: &ItemStore,
        editing: Option<ItemId>,
        textures: &mut TextureCache,
        scene: &mut SceneGraph,
        index: &mut SpatialIndex,
    ) -> RenderStats {
        let roots = store.render_order();
        index.rebuild(roots.iter().copied());

        let children_index = store.children_index();
        let mut referenced = HashSet::new();
        let mut stats = RenderStats {
            roots: roots.len(),
            children: 0,
        };
        let nodes: Vec<SceneNode> = roots
            .iter()
            .map(|item| {
                let children: Vec<&Item> = children_index
                    .get(&item.id)
                    .map(|ids| ids.iter().filter_map(|id| store.get(id)).collect())
                    .unwrap_or_default();
                stats.children += children.len();
                let mut ctx = NodeContext {
                    editing,
                    textures: &mut *textures,
                    referenced: &mut referenced,
                };
                ctx.item_node(item, &children)
            })
            .collect();

        textures.retain_referenced(&referenced);
        scene.layer_mut(LayerKind::Static).set_nodes(nodes);
        log::debug!("Rendered {} root items, {} nested", stats.roots, stats.children);
        self.last = stats;
        stats
    }
}

struct NodeContext<'a> {
    editing: Option<ItemId>,
    textures: &'a mut TextureCache,
    referenced: &'a mut HashSet<String>,
}

impl NodeContext<'_> {
    fn item_node(&mut self, item: &Item, children: &[&Item]) -> SceneNode {
        let content = match &item.data {
            ItemData::Path(path) => path_node(path),
            ItemData::Text(text) => SceneNode::new(NodeKind::Text {
                layout: layout_text(text),
                color: text.color,
                font_size: text.font_size,
            })
            .hidden(self.editing == Some(item.id)),
            ItemData::Image(image) => self.image_node(&image.url, Rect::new(0.0, 0.0, image.width, image.height)),
            ItemData::Stamp(stamp) => {
                self.image_node(&stamp.kind.texture_url(), Rect::new(0.0, 0.0, stamp.width, stamp.height))
            }
            ItemData::StickyNote(note) => {
                let nested = children
                    .iter()
                    .map(|child| self.item_node(child, &[]))
                    .collect();
                sticky_note_node(note, nested)
            }
        };
        with_erasures(content, item.data.erasures(), local_bounds(item))
            .with_transform(item_affine(item))
            .with_item(item.id)
    }

    fn image_node(&mut self, url: &str, rect: Rect) -> SceneNode {
        self.referenced.insert(url.to_string());
        let state = self.textures.request(url);
        SceneNode::new(NodeKind::Image {
            url: url.to_string(),
            rect,
            state,
        })
    }
}

fn path_node(path: &PathData) -> SceneNode {
    let blend = match path.blend {
        StrokeBlend::Normal => NodeBlend::Normal,
        StrokeBlend::Erase => NodeBlend::Erase,
    };
    SceneNode::new(NodeKind::Stroke {
        points: path.points.clone(),
        smoothed: path.is_smoothed(),
        color: path.color,
        width: path.width,
    })
    .with_blend(blend)
}

/// Render content and its erasures together offscreen so erasing only removes this item's
/// own pixels.
fn with_erasures(content: SceneNode, erasures: &[Erasure], bounds: Rect) -> SceneNode {
    if erasures.is_empty() {
        return content;
    }
    let mut children = Vec::with_capacity(erasures.len() + 1);
    children.push(content);
    children.extend(erasures.iter().map(|e| {
        SceneNode::new(NodeKind::Stroke {
            points: e.points.clone(),
            smoothed: false,
            color: Rgba::black(),
            width: e.size,
        })
        .with_blend(NodeBlend::Erase)
    }));
    SceneNode::new(NodeKind::Offscreen { bounds, children })
}

fn darker(color: Rgba, factor: f64) -> Rgba {
    let f = |c: u8| (c as f64 * factor).round().clamp(0.0, 255.0) as u8;
    Rgba::new(f(color.r), f(color.g), f(color.b), color.a)
}

/// Note body with shadow and folded corner; children are clipped to the note rectangle.
pub fn sticky_note_node(note: &StickyNoteData, children: Vec<SceneNode>) -> SceneNode {
    let (w, h) = (note.width.max(0.0), note.height.max(0.0));
    let rect = Rect::new(0.0, 0.0, w, h);
    let fold = StickyNoteData::FOLD_SIZE.min(w / 2.0).min(h / 2.0);

    let shadow = SceneNode::new(NodeKind::Rect {
        rect: rect + NOTE_SHADOW_OFFSET,
        radius: NOTE_RADIUS,
        fill: Some(NOTE_SHADOW),
        stroke: None,
    });
    let body = SceneNode::new(NodeKind::Polygon {
        points: vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h - fold),
            Point::new(w - fold, h),
            Point::new(0.0, h),
        ],
        fill: note.fill,
    });
    let corner = SceneNode::new(NodeKind::Polygon {
        points: vec![
            Point::new(w, h - fold),
            Point::new(w - fold, h - fold),
            Point::new(w - fold, h),
        ],
        fill: darker(note.fill, 0.8),
    });
    let content = SceneNode::new(NodeKind::Group {
        children,
        clip: Some(rect),
    });
    SceneNode::group(vec![shadow, body, corner, content])
}
