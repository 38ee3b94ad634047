//! Scene node painting onto a [`Pixmap`].

use std::f64::consts::TAU;

use kurbo::{Affine, Point, Rect, Vec2};
use meetink_core::items::SerializableColor as Rgba;
use meetink_core::scene::{NodeBlend, NodeKind, SceneNode, StrokeSegment, StrokeStyle, TextureState};
use meetink_core::text_layout::TextLayout;

use crate::raster::{PixelRect, Pixmap, dash_polyline, fill_polygon, stroke_polyline};
use crate::texture::TextureCache;

/// Flattening steps per quadratic curve in the smoothed stroke path.
const CURVE_STEPS: usize = 8;

const PLACEHOLDER_FILL: Rgba = Rgba::new(200, 200, 200, 255);
const PLACEHOLDER_LINE: Rgba = Rgba::new(150, 150, 150, 255);
const PLACEHOLDER_BORDER: Rgba = Rgba::new(100, 100, 100, 255);

/// Uniform scale factor of an affine, used to map stroke widths into device pixels.
pub fn affine_scale(affine: Affine) -> f64 {
    affine.determinant().abs().sqrt()
}

/// Quadratic smoothing through the midpoints of consecutive points, flattened to a polyline.
pub fn smooth_points(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(points.len() * CURVE_STEPS);
    out.push(points[0]);
    let mut start = points[0];
    for i in 1..points.len() - 1 {
        let control = points[i];
        let end = points[i].midpoint(points[i + 1]);
        for step in 1..=CURVE_STEPS {
            let t = step as f64 / CURVE_STEPS as f64;
            let mt = 1.0 - t;
            let p = start.to_vec2() * (mt * mt) + control.to_vec2() * (2.0 * mt * t) + end.to_vec2() * (t * t);
            out.push(p.to_point());
        }
        start = end;
    }
    if let Some(last) = points.last() {
        out.push(*last);
    }
    out
}

/// Outline of a rectangle with rounded corners, clockwise from the top-left.
pub fn rounded_rect_points(rect: Rect, radius: f64) -> Vec<Point> {
    let r = radius.max(0.0).min(rect.width() / 2.0).min(rect.height() / 2.0);
    if r <= 0.0 {
        return vec![
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ];
    }
    let corners = [
        (Point::new(rect.x1 - r, rect.y0 + r), -0.25),
        (Point::new(rect.x1 - r, rect.y1 - r), 0.0),
        (Point::new(rect.x0 + r, rect.y1 - r), 0.25),
        (Point::new(rect.x0 + r, rect.y0 + r), 0.5),
    ];
    let steps = 6;
    let mut out = Vec::with_capacity(corners.len() * (steps + 1));
    for (center, start) in corners {
        for i in 0..=steps {
            let angle = (start + 0.25 * i as f64 / steps as f64) * TAU;
            out.push(center + Vec2::from_angle(angle) * r);
        }
    }
    out
}

pub fn circle_points(center: Point, radius: f64) -> Vec<Point> {
    let segments = ((radius * 0.75).ceil() as usize).clamp(12, 96);
    (0..segments)
        .map(|i| center + Vec2::from_angle(i as f64 / segments as f64 * TAU) * radius)
        .collect()
}

/// Paints scene nodes, resolving image nodes through a texture cache.
pub struct Painter<'a> {
    textures: &'a TextureCache,
}

impl<'a> Painter<'a> {
    pub fn new(textures: &'a TextureCache) -> Self {
        Self { textures }
    }

    pub fn paint_nodes(&self, target: &mut Pixmap, nodes: &[SceneNode], base: Affine) {
        for node in nodes {
            self.paint_node(target, node, base, 1.0);
        }
    }

    pub fn paint_node(&self, target: &mut Pixmap, node: &SceneNode, parent: Affine, opacity: f64) {
        if node.hidden || node.opacity <= 0.0 {
            return;
        }
        let t = parent * node.transform;
        let opacity = opacity * node.opacity;
        let clip = target.bounds();

        match &node.kind {
            NodeKind::Stroke {
                points,
                smoothed,
                color,
                width,
            } => {
                let local = if *smoothed { smooth_points(points) } else { points.clone() };
                let device: Vec<Point> = local.iter().map(|p| t * *p).collect();
                if let Some(mask) = stroke_polyline(&device, width * affine_scale(t), clip) {
                    target.fill_mask(&mask, *color, opacity, node.blend);
                }
            }
            NodeKind::Rect {
                rect,
                radius,
                fill,
                stroke,
            } => {
                let outline: Vec<Point> = rounded_rect_points(*rect, *radius).iter().map(|p| t * *p).collect();
                self.fill_and_stroke(target, &outline, *fill, *stroke, t, opacity, node.blend);
            }
            NodeKind::Circle {
                center,
                radius,
                fill,
                stroke,
            } => {
                let outline: Vec<Point> = circle_points(*center, *radius).iter().map(|p| t * *p).collect();
                self.fill_and_stroke(target, &outline, *fill, *stroke, t, opacity, node.blend);
            }
            NodeKind::Polygon { points, fill } => {
                let device: Vec<Point> = points.iter().map(|p| t * *p).collect();
                if let Some(mask) = fill_polygon(&device, clip) {
                    target.fill_mask(&mask, *fill, opacity, node.blend);
                }
            }
            NodeKind::Text {
                layout,
                color,
                font_size,
            } => self.paint_text(target, layout, *color, *font_size, t, opacity),
            NodeKind::Image { url, rect, state } => {
                let texture = match state {
                    TextureState::Ready => self.textures.get(url),
                    _ => None,
                };
                match texture {
                    Some(texture) if texture.width() > 0 && texture.height() > 0 => {
                        let placement = t
                            * Affine::translate(rect.origin().to_vec2())
                            * Affine::scale_non_uniform(
                                rect.width() / texture.width() as f64,
                                rect.height() / texture.height() as f64,
                            );
                        target.draw_texture(texture, placement, opacity);
                    }
                    _ => self.paint_placeholder(target, *rect, t, opacity),
                }
            }
            NodeKind::Group {
                children,
                clip: None,
            } => {
                for child in children {
                    self.paint_node(target, child, t, opacity);
                }
            }
            NodeKind::Group {
                children,
                clip: Some(clip_rect),
            } => {
                let outline: Vec<Point> = rounded_rect_points(*clip_rect, 0.0).iter().map(|p| t * *p).collect();
                let Some(clip_mask) = fill_polygon(&outline, clip) else {
                    return;
                };
                let mut layer = Pixmap::with_bounds(clip_mask.bounds());
                for child in children {
                    self.paint_node(&mut layer, child, t, 1.0);
                }
                target.draw_pixmap(&layer, opacity, Some(&clip_mask));
            }
            NodeKind::Offscreen { bounds, children } => {
                let Some(area) = device_bounds(*bounds, t).and_then(|r| r.intersect(&clip)) else {
                    return;
                };
                let mut layer = Pixmap::with_bounds(area);
                for child in children {
                    self.paint_node(&mut layer, child, t, 1.0);
                }
                target.draw_pixmap(&layer, opacity, None);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_and_stroke(
        &self,
        target: &mut Pixmap,
        outline: &[Point],
        fill: Option<Rgba>,
        stroke: Option<StrokeStyle>,
        t: Affine,
        opacity: f64,
        blend: NodeBlend,
    ) {
        let clip = target.bounds();
        if let Some(fill) = fill {
            if let Some(mask) = fill_polygon(outline, clip) {
                target.fill_mask(&mask, fill, opacity, blend);
            }
        }
        let Some(style) = stroke else { return };
        let Some(first) = outline.first() else { return };
        let mut closed = outline.to_vec();
        closed.push(*first);
        let scale = affine_scale(t);
        let runs = match style.dash {
            Some(dash) => dash_polyline(&closed, dash * scale),
            None => vec![closed],
        };
        for run in runs {
            if let Some(mask) = stroke_polyline(&run, style.width * scale, clip) {
                target.fill_mask(&mask, style.color, opacity, blend);
            }
        }
    }

    /// Text is drawn as one solid bar per glyph cell, positioned by the same layout used
    /// for hit testing.
    fn paint_text(&self, target: &mut Pixmap, layout: &TextLayout, color: Rgba, font_size: f64, t: Affine, opacity: f64) {
        let clip = target.bounds();
        let ascent = layout.line_height - font_size.max(0.0) * 0.85;
        for line in &layout.lines {
            let count = line.text.chars().count();
            if count == 0 {
                continue;
            }
            let advance = line.width / count as f64;
            for (i, ch) in line.text.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let x = i as f64 * advance;
                let glyph = Rect::new(
                    x + advance * 0.12,
                    line.top + ascent.max(0.0),
                    x + advance * 0.88,
                    line.top + layout.line_height * 0.9,
                );
                let outline: Vec<Point> = rounded_rect_points(glyph, 0.0).iter().map(|p| t * *p).collect();
                if let Some(mask) = fill_polygon(&outline, clip) {
                    target.fill_mask(&mask, color, opacity, NodeBlend::Normal);
                }
            }
        }
    }

    /// Gray box with an X, shown while a texture is loading or after it failed.
    fn paint_placeholder(&self, target: &mut Pixmap, rect: Rect, t: Affine, opacity: f64) {
        let clip = target.bounds();
        let outline: Vec<Point> = rounded_rect_points(rect, 0.0).iter().map(|p| t * *p).collect();
        if let Some(mask) = fill_polygon(&outline, clip) {
            target.fill_mask(&mask, PLACEHOLDER_FILL, opacity, NodeBlend::Normal);
        }
        let width = 2.0 * affine_scale(t);
        let diagonals = [
            [t * Point::new(rect.x0, rect.y0), t * Point::new(rect.x1, rect.y1)],
            [t * Point::new(rect.x1, rect.y0), t * Point::new(rect.x0, rect.y1)],
        ];
        for line in diagonals {
            if let Some(mask) = stroke_polyline(&line, width, clip) {
                target.fill_mask(&mask, PLACEHOLDER_LINE, opacity, NodeBlend::Normal);
            }
        }
        let mut border = outline;
        if let Some(first) = border.first().copied() {
            border.push(first);
        }
        if let Some(mask) = stroke_polyline(&border, width, clip) {
            target.fill_mask(&mask, PLACEHOLDER_BORDER, opacity, NodeBlend::Normal);
        }
    }

    /// Draw a single freshly appended stroke segment.
    pub fn paint_segment(&self, target: &mut Pixmap, segment: &StrokeSegment, view: Affine) {
        let points = [view * segment.from, view * segment.to];
        if let Some(mask) = stroke_polyline(&points, segment.width * affine_scale(view), target.bounds()) {
            target.fill_mask(&mask, segment.color, 1.0, segment.blend);
        }
    }
}

fn device_bounds(rect: Rect, t: Affine) -> Option<PixelRect> {
    let corners = [
        t * Point::new(rect.x0, rect.y0),
        t * Point::new(rect.x1, rect.y0),
        t * Point::new(rect.x1, rect.y1),
        t * Point::new(rect.x0, rect.y1),
    ];
    let bbox = corners[1..]
        .iter()
        .fold(Rect::from_points(corners[0], corners[0]), |r, p| r.union_pt(*p));
    PixelRect::covering(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::new(255, 0, 0, 255);

    fn rect_node(rect: Rect, fill: Rgba) -> SceneNode {
        SceneNode::new(NodeKind::Rect {
            rect,
            radius: 0.0,
            fill: Some(fill),
            stroke: None,
        })
    }

    #[test]
    fn test_smooth_points_keeps_endpoints() {
        let pts: Vec<Point> = (0..12).map(|i| Point::new(i as f64, (i % 2) as f64)).collect();
        let smoothed = smooth_points(&pts);
        assert_eq!(smoothed.first(), pts.first());
        assert_eq!(smoothed.last(), pts.last());
        assert!(smoothed.len() > pts.len());
    }

    #[test]
    fn test_rect_node_respects_transform() {
        let textures = TextureCache::new();
        let painter = Painter::new(&textures);
        let mut target = Pixmap::new(20, 20);
        let node = rect_node(Rect::new(0.0, 0.0, 4.0, 4.0), RED).with_transform(Affine::translate((10.0, 10.0)));
        painter.paint_nodes(&mut target, &[node], Affine::IDENTITY);
        assert_eq!(target.pixel(11, 11), [255, 0, 0, 255]);
        assert_eq!(target.pixel(2, 2), [0; 4]);
    }

    #[test]
    fn test_hidden_node_is_skipped() {
        let textures = TextureCache::new();
        let painter = Painter::new(&textures);
        let mut target = Pixmap::new(10, 10);
        let node = rect_node(Rect::new(0.0, 0.0, 10.0, 10.0), RED).hidden(true);
        painter.paint_nodes(&mut target, &[node], Affine::IDENTITY);
        assert_eq!(target.pixel(5, 5), [0; 4]);
    }

    #[test]
    fn test_offscreen_erase_stays_inside_item() {
        let textures = TextureCache::new();
        let painter = Painter::new(&textures);
        let mut target = Pixmap::new(20, 20);
        target.fill(Rgba::new(0, 0, 255, 255));

        let eraser = SceneNode::new(NodeKind::Stroke {
            points: vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)],
            smoothed: false,
            color: Rgba::black(),
            width: 4.0,
        })
        .with_blend(NodeBlend::Erase);
        let item = SceneNode::new(NodeKind::Offscreen {
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            children: vec![rect_node(Rect::new(0.0, 0.0, 10.0, 10.0), RED), eraser],
        });
        painter.paint_nodes(&mut target, &[item], Affine::IDENTITY);

        // Erased pixels reveal the blue beneath instead of punching through it
        assert_eq!(target.pixel(5, 5), [0, 0, 255, 255]);
        assert_eq!(target.pixel(5, 9), [255, 0, 0, 255]);
        assert_eq!(target.pixel(15, 15), [0, 0, 255, 255]);
    }

    #[test]
    fn test_clipped_group() {
        let textures = TextureCache::new();
        let painter = Painter::new(&textures);
        let mut target = Pixmap::new(20, 20);
        let group = SceneNode::new(NodeKind::Group {
            children: vec![rect_node(Rect::new(0.0, 0.0, 20.0, 20.0), RED)],
            clip: Some(Rect::new(0.0, 0.0, 8.0, 8.0)),
        });
        painter.paint_nodes(&mut target, &[group], Affine::IDENTITY);
        assert_eq!(target.pixel(4, 4), [255, 0, 0, 255]);
        assert_eq!(target.pixel(12, 12), [0; 4]);
    }

    #[test]
    fn test_pending_image_draws_placeholder() {
        let textures = TextureCache::new();
        let painter = Painter::new(&textures);
        let mut target = Pixmap::new(40, 40);
        let node = SceneNode::new(NodeKind::Image {
            url: "x.png".into(),
            rect: Rect::new(0.0, 0.0, 40.0, 40.0),
            state: TextureState::Pending,
        });
        painter.paint_nodes(&mut target, &[node], Affine::IDENTITY);
        assert_eq!(target.color_at(20, 5), PLACEHOLDER_FILL);
    }

    #[test]
    fn test_ready_image_draws_texture() {
        let mut textures = TextureCache::new();
        let texture = crate::texture::Texture::from_rgba8(1, 1, vec![0, 255, 0, 255]).unwrap();
        textures.insert("g.png", texture);
        let painter = Painter::new(&textures);
        let mut target = Pixmap::new(10, 10);
        let node = SceneNode::new(NodeKind::Image {
            url: "g.png".into(),
            rect: Rect::new(2.0, 2.0, 6.0, 6.0),
            state: TextureState::Ready,
        });
        painter.paint_nodes(&mut target, &[node], Affine::IDENTITY);
        assert_eq!(target.pixel(3, 3), [0, 255, 0, 255]);
        assert_eq!(target.pixel(7, 7), [0; 4]);
    }
}
