//! CPU rasterization into premultiplied RGBA pixel buffers.
//!
//! Geometry is first turned into a coverage [`Mask`] in device pixels, then the mask is
//! painted into a [`Pixmap`] with a color and a blend mode. Keeping the two steps apart lets
//! the same mask drive normal painting, alpha erasing and clipping.

use kurbo::{Affine, Point, Rect};
use meetink_core::geometry::{invert, point_segment_distance};
use meetink_core::items::SerializableColor as Rgba;
use meetink_core::scene::NodeBlend;

use crate::texture::Texture;

/// Sample rows per pixel row when filling polygons.
const SUBSAMPLES: usize = 4;

/// Half-open integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// Smallest pixel rectangle covering `rect`. `None` for non-finite input.
    pub fn covering(rect: Rect) -> Option<Self> {
        if ![rect.x0, rect.y0, rect.x1, rect.y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self::new(
            rect.x0.floor() as i32,
            rect.y0.floor() as i32,
            rect.x1.ceil() as i32,
            rect.y1.ceil() as i32,
        ))
    }

    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let r = PixelRect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        (r.x0 < r.x1 && r.y0 < r.y1).then_some(r)
    }

    pub fn width(&self) -> u32 {
        (self.x1 - self.x0).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y1 - self.y0).max(0) as u32
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// Per-pixel coverage in `[0, 1]` over a pixel rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    bounds: PixelRect,
    data: Vec<f32>,
}

impl Mask {
    pub fn new(bounds: PixelRect) -> Self {
        Self {
            bounds,
            data: vec![0.0; bounds.area()],
        }
    }

    pub fn bounds(&self) -> PixelRect {
        self.bounds
    }

    /// Coverage at a device pixel; zero outside the mask.
    pub fn get(&self, x: i32, y: i32) -> f32 {
        if self.bounds.contains(x, y) {
            self.data[self.index(x, y)]
        } else {
            0.0
        }
    }

    pub fn total(&self) -> f32 {
        self.data.iter().sum()
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y - self.bounds.y0) as usize * self.bounds.width() as usize + (x - self.bounds.x0) as usize
    }

    fn raise(&mut self, x: i32, y: i32, value: f32) {
        let i = self.index(x, y);
        if value > self.data[i] {
            self.data[i] = value;
        }
    }
}

struct Edge {
    top: Point,
    bottom: Point,
    dir: i32,
}

impl Edge {
    fn new(a: Point, b: Point) -> Option<Self> {
        if a.y == b.y || !(a.is_finite() && b.is_finite()) {
            return None;
        }
        Some(if a.y < b.y {
            Self {
                top: a,
                bottom: b,
                dir: 1,
            }
        } else {
            Self {
                top: b,
                bottom: a,
                dir: -1,
            }
        })
    }

    fn x_at(&self, y: f64) -> Option<f64> {
        if y < self.top.y || y >= self.bottom.y {
            return None;
        }
        let t = (y - self.top.y) / (self.bottom.y - self.top.y);
        Some(self.top.x + t * (self.bottom.x - self.top.x))
    }
}

fn points_rect(points: &[Point]) -> Option<Rect> {
    let mut finite = points.iter().filter(|p| p.is_finite());
    let first = *finite.next()?;
    Some(finite.fold(Rect::from_points(first, first), |r, p| r.union_pt(*p)))
}

/// Fill a closed polygon with the non-zero winding rule.
pub fn fill_polygon(points: &[Point], clip: PixelRect) -> Option<Mask> {
    if points.len() < 3 {
        return None;
    }
    let area = PixelRect::covering(points_rect(points)?)?.intersect(&clip)?;
    let mut mask = Mask::new(area);

    let edges: Vec<Edge> = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .filter_map(|(a, b)| Edge::new(*a, *b))
        .collect();
    if edges.is_empty() {
        return None;
    }

    let width = area.width() as usize;
    let mut row = vec![0.0f32; width];
    let mut crossings: Vec<(f64, i32)> = Vec::new();
    for py in area.y0..area.y1 {
        row.iter_mut().for_each(|v| *v = 0.0);
        for s in 0..SUBSAMPLES {
            let sy = py as f64 + (s as f64 + 0.5) / SUBSAMPLES as f64;
            crossings.clear();
            crossings.extend(edges.iter().filter_map(|e| e.x_at(sy).map(|x| (x, e.dir))));
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            let mut span_start = 0.0;
            for &(x, dir) in &crossings {
                let before = winding;
                winding += dir;
                if before == 0 && winding != 0 {
                    span_start = x;
                } else if before != 0 && winding == 0 {
                    add_span(&mut row, area.x0, span_start, x);
                }
            }
        }
        let start = (py - area.y0) as usize * width;
        for (dst, v) in mask.data[start..start + width].iter_mut().zip(&row) {
            *dst = v.min(1.0);
        }
    }
    Some(mask)
}

fn add_span(row: &mut [f32], x0: i32, xa: f64, xb: f64) {
    let len = row.len() as f64;
    let left = (xa - x0 as f64).max(0.0);
    let right = (xb - x0 as f64).min(len);
    if right <= left {
        return;
    }
    let weight = 1.0 / SUBSAMPLES as f64;
    let first = left.floor() as usize;
    let last = (right.ceil() as usize).min(row.len());
    for (i, cell) in row.iter_mut().enumerate().take(last).skip(first) {
        let cover = right.min(i as f64 + 1.0) - left.max(i as f64);
        if cover > 0.0 {
            *cell += (cover * weight) as f32;
        }
    }
}

/// Stroke an open polyline with round joins and caps. A single point draws a dot.
///
/// Strokes thinner than a pixel are drawn one pixel wide at reduced strength.
pub fn stroke_polyline(points: &[Point], width: f64, clip: PixelRect) -> Option<Mask> {
    let points: Vec<Point> = points.iter().copied().filter(|p| p.is_finite()).collect();
    let first = *points.first()?;
    if !(width > 0.0 && width.is_finite()) {
        return None;
    }
    let half = (width / 2.0).max(0.5);
    let strength = width.min(1.0) as f32;
    let pad = half + 1.0;
    let area = PixelRect::covering(points_rect(&points)?.inflate(pad, pad))?.intersect(&clip)?;
    let mut mask = Mask::new(area);

    let segments: Vec<(Point, Point)> = if points.len() == 1 {
        vec![(first, first)]
    } else {
        points.windows(2).map(|w| (w[0], w[1])).collect()
    };
    for (a, b) in segments {
        let Some(seg_area) = PixelRect::covering(Rect::from_points(a, b).inflate(pad, pad))
            .and_then(|r| r.intersect(&area))
        else {
            continue;
        };
        for py in seg_area.y0..seg_area.y1 {
            for px in seg_area.x0..seg_area.x1 {
                let center = Point::new(px as f64 + 0.5, py as f64 + 0.5);
                let d = point_segment_distance(center, a, b);
                let cov = (half + 0.5 - d).clamp(0.0, 1.0) as f32 * strength;
                if cov > 0.0 {
                    mask.raise(px, py, cov);
                }
            }
        }
    }
    Some(mask)
}

/// Split a polyline into dashes of length `dash` separated by gaps of the same length.
pub fn dash_polyline(points: &[Point], dash: f64) -> Vec<Vec<Point>> {
    if dash <= 0.0 || points.len() < 2 {
        return vec![points.to_vec()];
    }
    let mut out = Vec::new();
    let mut current = vec![points[0]];
    let mut on = true;
    let mut left = dash;
    for w in points.windows(2) {
        let (mut a, b) = (w[0], w[1]);
        let mut seg = a.distance(b);
        while seg > left {
            let p = a.lerp(b, left / seg);
            if on {
                current.push(p);
                out.push(std::mem::take(&mut current));
            } else {
                current = vec![p];
            }
            on = !on;
            seg -= left;
            a = p;
            left = dash;
        }
        left -= seg;
        if on {
            current.push(b);
        }
    }
    if on && current.len() > 1 {
        out.push(current);
    }
    out
}

fn premultiplied(color: Rgba) -> [f32; 4] {
    let a = color.a as f32 / 255.0;
    [
        color.r as f32 / 255.0 * a,
        color.g as f32 / 255.0 * a,
        color.b as f32 / 255.0 * a,
        a,
    ]
}

fn load(px: &[u8]) -> [f32; 4] {
    [
        px[0] as f32 / 255.0,
        px[1] as f32 / 255.0,
        px[2] as f32 / 255.0,
        px[3] as f32 / 255.0,
    ]
}

fn store(px: &mut [u8], v: [f32; 4]) {
    for (dst, c) in px.iter_mut().zip(v) {
        *dst = (c * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

fn over(dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
    let k = 1.0 - src[3];
    [
        src[0] + dst[0] * k,
        src[1] + dst[1] * k,
        src[2] + dst[2] * k,
        src[3] + dst[3] * k,
    ]
}

fn scaled(v: [f32; 4], s: f32) -> [f32; 4] {
    [v[0] * s, v[1] * s, v[2] * s, v[3] * s]
}

/// Premultiplied RGBA8 pixels over a pixel rectangle in device space.
#[derive(Debug, Clone, PartialEq)]
pub struct Pixmap {
    bounds: PixelRect,
    data: Vec<u8>,
}

impl Pixmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_bounds(PixelRect::from_size(width, height))
    }

    /// A pixmap covering `bounds`, used for offscreen targets placed anywhere on the surface.
    pub fn with_bounds(bounds: PixelRect) -> Self {
        Self {
            bounds,
            data: vec![0; bounds.area() * 4],
        }
    }

    pub fn bounds(&self) -> PixelRect {
        self.bounds
    }

    pub fn width(&self) -> u32 {
        self.bounds.width()
    }

    pub fn height(&self) -> u32 {
        self.bounds.height()
    }

    /// Raw premultiplied bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        self.bounds.contains(x, y).then(|| {
            ((y - self.bounds.y0) as usize * self.bounds.width() as usize
                + (x - self.bounds.x0) as usize)
                * 4
        })
    }

    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|b| *b = 0);
    }

    pub fn fill(&mut self, color: Rgba) {
        let mut px = [0u8; 4];
        store(&mut px, premultiplied(color));
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Premultiplied pixel, transparent outside the pixmap.
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        match self.offset(x, y) {
            Some(i) => [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]],
            None => [0; 4],
        }
    }

    /// Straight-alpha color of a pixel.
    pub fn color_at(&self, x: i32, y: i32) -> Rgba {
        let [r, g, b, a] = self.pixel(x, y);
        let [r, g, b] = unpremultiply([r, g, b], a);
        Rgba::new(r, g, b, a)
    }

    /// Paint `color` through `mask`. Erase removes destination alpha under the coverage
    /// regardless of the color.
    pub fn fill_mask(&mut self, mask: &Mask, color: Rgba, opacity: f64, blend: NodeBlend) {
        let Some(area) = mask.bounds().intersect(&self.bounds) else {
            return;
        };
        let src = premultiplied(color);
        let opacity = opacity.clamp(0.0, 1.0) as f32;
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let cov = mask.get(x, y) * opacity;
                if cov <= 0.0 {
                    continue;
                }
                let Some(i) = self.offset(x, y) else { continue };
                let px = &mut self.data[i..i + 4];
                let dst = load(px);
                let out = match blend {
                    NodeBlend::Normal => over(dst, scaled(src, cov)),
                    NodeBlend::Erase => scaled(dst, 1.0 - cov.min(1.0)),
                };
                store(px, out);
            }
        }
    }

    /// Composite `src` over this pixmap, optionally through a clip mask.
    pub fn draw_pixmap(&mut self, src: &Pixmap, opacity: f64, mask: Option<&Mask>) {
        let Some(area) = src.bounds.intersect(&self.bounds) else {
            return;
        };
        let opacity = opacity.clamp(0.0, 1.0) as f32;
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let cov = mask.map_or(1.0, |m| m.get(x, y)) * opacity;
                if cov <= 0.0 {
                    continue;
                }
                let s = src.pixel(x, y);
                if s[3] == 0 {
                    continue;
                }
                let Some(i) = self.offset(x, y) else { continue };
                let px = &mut self.data[i..i + 4];
                let out = over(load(px), scaled(load(&s), cov));
                store(px, out);
            }
        }
    }

    /// Draw a texture; `transform` maps texture pixel space to device space.
    pub fn draw_texture(&mut self, texture: &Texture, transform: Affine, opacity: f64) {
        let Some(inverse) = invert(transform) else {
            return;
        };
        let (tw, th) = (texture.width() as f64, texture.height() as f64);
        let corners = [
            transform * Point::new(0.0, 0.0),
            transform * Point::new(tw, 0.0),
            transform * Point::new(tw, th),
            transform * Point::new(0.0, th),
        ];
        let Some(area) = points_rect(&corners)
            .and_then(PixelRect::covering)
            .and_then(|r| r.intersect(&self.bounds))
        else {
            return;
        };
        let opacity = opacity.clamp(0.0, 1.0) as f32;
        for y in area.y0..area.y1 {
            for x in area.x0..area.x1 {
                let p = inverse * Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if p.x < 0.0 || p.y < 0.0 || p.x >= tw || p.y >= th {
                    continue;
                }
                let s = texture.pixel(p.x as u32, p.y as u32);
                let Some(i) = self.offset(x, y) else { continue };
                let px = &mut self.data[i..i + 4];
                let out = over(load(px), scaled(load(&s), opacity));
                store(px, out);
            }
        }
    }

    /// Straight-alpha RGBA8 bytes, as image encoders expect.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(4) {
            let [r, g, b] = unpremultiply([px[0], px[1], px[2]], px[3]);
            out.extend_from_slice(&[r, g, b, px[3]]);
        }
        out
    }
}

fn unpremultiply(rgb: [u8; 3], a: u8) -> [u8; 3] {
    if a == 0 {
        return [0; 3];
    }
    rgb.map(|c| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8)
}
