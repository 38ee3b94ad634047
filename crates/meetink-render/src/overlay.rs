//! Transient overlay nodes: marquee, placement ghosts and remote presence.
//!
//! Overlays live in world space like everything else; sizes that should stay constant on
//! screen are divided by the zoom factor.

use kurbo::{Affine, Point, Rect};
use meetink_core::collaboration::{LiveStroke, RemoteCursor, SyncController};
use meetink_core::items::{SerializableColor as Rgba, StickyNoteData, TextData};
use meetink_core::scene::{NodeKind, SceneNode, StrokeStyle};
use meetink_core::selection::SELECTION_COLOR;
use meetink_core::text_layout::layout_text;
use meetink_core::tools::ToolKind;

use crate::item_renderer::sticky_note_node;

const MARQUEE_FILL: Rgba = Rgba::new(59, 130, 246, 25);
const GHOST_OPACITY: f64 = 0.5;
const CURSOR_LABEL_SIZE: f64 = 12.0;
const CURSOR_LABEL_PADDING: f64 = 4.0;

/// Colors handed out to peers, picked by hashing the sender id.
const PEER_PALETTE: [Rgba; 8] = [
    Rgba::new(239, 68, 68, 255),
    Rgba::new(249, 115, 22, 255),
    Rgba::new(234, 179, 8, 255),
    Rgba::new(34, 197, 94, 255),
    Rgba::new(20, 184, 166, 255),
    Rgba::new(59, 130, 246, 255),
    Rgba::new(168, 85, 247, 255),
    Rgba::new(236, 72, 153, 255),
];

/// Box-select rectangle. Stroke width and dash length are scaled inversely with zoom.
pub fn marquee_node(rect: Rect, zoom: f64) -> SceneNode {
    let zoom = zoom.max(f64::EPSILON);
    SceneNode::new(NodeKind::Rect {
        rect: rect.abs(),
        radius: 0.0,
        fill: Some(MARQUEE_FILL),
        stroke: Some(StrokeStyle::dashed(SELECTION_COLOR, 1.0 / zoom, 4.0 / zoom)),
    })
}

/// Translucent sticky note centered on the pointer.
pub fn sticky_ghost(center: Point, fill: Rgba) -> SceneNode {
    let note = StickyNoteData::new(fill, StickyNoteData::DEFAULT_SIZE, StickyNoteData::DEFAULT_SIZE);
    let half = StickyNoteData::DEFAULT_SIZE / 2.0;
    sticky_note_node(&note, Vec::new())
        .with_transform(Affine::translate((center.x - half, center.y - half)))
        .with_opacity(GHOST_OPACITY)
}

/// Dashed placement box centered on the pointer, used for stamps and images.
pub fn outline_ghost(center: Point, width: f64, height: f64, zoom: f64) -> SceneNode {
    let zoom = zoom.max(f64::EPSILON);
    SceneNode::new(NodeKind::Rect {
        rect: Rect::from_center_size(center, (width.max(0.0), height.max(0.0))),
        radius: 0.0,
        fill: Some(MARQUEE_FILL),
        stroke: Some(StrokeStyle::dashed(SELECTION_COLOR, 1.0 / zoom, 4.0 / zoom)),
    })
}

/// Stable color for a peer.
pub fn peer_color(sender: &str) -> Rgba {
    // FNV-1a
    let hash = sender
        .bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
    PEER_PALETTE[hash as usize % PEER_PALETTE.len()]
}

/// Pointer arrow with the peer's name. Drawn at constant screen size.
pub fn cursor_node(cursor: &RemoteCursor, color: Rgba, zoom: f64) -> SceneNode {
    let zoom = zoom.max(f64::EPSILON);
    let arrow = vec![Point::new(0.0, 0.0), Point::new(0.0, 18.0), Point::new(14.0, 14.0)];
    let mut children = vec![
        SceneNode::new(NodeKind::Polygon {
            points: arrow.clone(),
            fill: color,
        }),
        SceneNode::new(NodeKind::Stroke {
            points: [arrow.as_slice(), &arrow[..1]].concat(),
            smoothed: false,
            color: Rgba::white(),
            width: 1.5,
        }),
    ];

    if let Some(name) = cursor.name.as_deref().filter(|n| !n.is_empty()) {
        let mut label = TextData::new(name);
        label.font_size = CURSOR_LABEL_SIZE;
        label.color = Rgba::white();
        let layout = layout_text(&label);
        let origin = Point::new(16.0, 18.0);
        children.push(SceneNode::new(NodeKind::Rect {
            rect: Rect::new(
                origin.x,
                origin.y,
                origin.x + layout.width + CURSOR_LABEL_PADDING * 2.0,
                origin.y + layout.height + CURSOR_LABEL_PADDING * 2.0,
            ),
            radius: 3.0,
            fill: Some(color),
            stroke: None,
        }));
        children.push(
            SceneNode::new(NodeKind::Text {
                layout,
                color: label.color,
                font_size: label.font_size,
            })
            .with_transform(Affine::translate((
                origin.x + CURSOR_LABEL_PADDING,
                origin.y + CURSOR_LABEL_PADDING,
            ))),
        );
    }

    SceneNode::group(children).with_transform(
        Affine::translate(cursor.position.to_vec2()) * Affine::scale(1.0 / zoom),
    )
}

/// A peer's in-progress stroke. Eraser strokes show as a faint trail.
pub fn live_stroke_node(stroke: &LiveStroke) -> SceneNode {
    let (color, width) = match stroke.tool {
        ToolKind::Eraser => (Rgba::new(128, 128, 128, 80), stroke.width),
        _ => (stroke.color, stroke.width),
    };
    SceneNode::new(NodeKind::Stroke {
        points: stroke.points.clone(),
        smoothed: false,
        color,
        width,
    })
}

/// Live strokes and cursors of every peer, strokes beneath cursors.
pub fn presence_nodes(sync: &SyncController, zoom: f64) -> Vec<SceneNode> {
    let mut strokes: Vec<(&str, &[LiveStroke])> = sync.live_strokes().collect();
    strokes.sort_by(|a, b| a.0.cmp(b.0));
    let mut cursors: Vec<(&str, &RemoteCursor)> = sync.cursors().collect();
    cursors.sort_by(|a, b| a.0.cmp(b.0));

    let mut nodes: Vec<SceneNode> = strokes
        .into_iter()
        .flat_map(|(_, strokes)| strokes.iter())
        .filter(|s| !s.points.is_empty())
        .map(live_stroke_node)
        .collect();
    nodes.extend(
        cursors
            .into_iter()
            .map(|(sender, cursor)| cursor_node(cursor, peer_color(sender), zoom)),
    );
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(name: Option<&str>) -> RemoteCursor {
        RemoteCursor {
            position: Point::new(100.0, 50.0),
            target: Point::new(100.0, 50.0),
            tool: ToolKind::Pen,
            name: name.map(str::to_string),
            avatar: None,
        }
    }

    #[test]
    fn test_marquee_scales_with_zoom() {
        let node = marquee_node(Rect::new(10.0, 10.0, 0.0, 0.0), 2.0);
        let NodeKind::Rect { rect, stroke, fill, .. } = node.kind else {
            panic!("expected rect");
        };
        assert_eq!(rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(fill, Some(MARQUEE_FILL));
        let stroke = stroke.unwrap();
        assert_eq!(stroke.width, 0.5);
        assert_eq!(stroke.dash, Some(2.0));
    }

    #[test]
    fn test_peer_color_is_stable() {
        assert_eq!(peer_color("alice"), peer_color("alice"));
        assert!(PEER_PALETTE.contains(&peer_color("bob")));
    }

    #[test]
    fn test_cursor_label_only_with_name() {
        let plain = cursor_node(&cursor(None), PEER_PALETTE[0], 1.0);
        assert_eq!(plain.children().len(), 2);
        let named = cursor_node(&cursor(Some("Ada")), PEER_PALETTE[0], 1.0);
        assert_eq!(named.children().len(), 4);
        assert!(matches!(named.children()[3].kind, NodeKind::Text { .. }));
    }

    #[test]
    fn test_cursor_keeps_screen_size() {
        let node = cursor_node(&cursor(None), PEER_PALETTE[0], 4.0);
        let tip = node.transform * Point::new(0.0, 18.0);
        assert_eq!(tip, Point::new(100.0, 54.5));
    }

    #[test]
    fn test_sticky_ghost_is_centered() {
        let ghost = sticky_ghost(Point::new(300.0, 300.0), Rgba::sticky_yellow());
        assert_eq!(ghost.opacity, GHOST_OPACITY);
        assert_eq!(ghost.transform * Point::ZERO, Point::new(200.0, 200.0));
    }

    #[test]
    fn test_eraser_live_stroke_is_faint() {
        let stroke = LiveStroke {
            points: vec![Point::ZERO, Point::new(5.0, 5.0)],
            color: Rgba::black(),
            width: 20.0,
            tool: ToolKind::Eraser,
        };
        let NodeKind::Stroke { color, .. } = live_stroke_node(&stroke).kind else {
            panic!("expected stroke");
        };
        assert_eq!(color.a, 80);
    }
}
