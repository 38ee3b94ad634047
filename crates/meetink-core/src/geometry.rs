//! Geometry model: item bounds, center-pivot transforms and oriented bounding boxes.
//!
//! Every function here is pure. The single invariant shared with the renderer is that an
//! item's content is pivoted on the center of its local bounds and that center is placed at
//! `(transform.x + cx, transform.y + cy)`.

use kurbo::{Affine, Point, Rect, Vec2};

use crate::items::{Item, ItemData, Transform, points_bounds};
use crate::text_layout::layout_text;

/// Below this determinant a transform is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Type-specific bounds in the item's own coordinate space, before transform.
///
/// Missing or non-finite content degrades to a zero-area rect at the origin.
pub fn local_bounds(item: &Item) -> Rect {
    data_bounds(&item.data)
}

/// Local bounds of a bare payload.
pub fn data_bounds(data: &ItemData) -> Rect {
    let rect = match data {
        ItemData::Path(p) => match points_bounds(&p.points) {
            Some(r) => r.inflate(p.width.max(0.0) / 2.0, p.width.max(0.0) / 2.0),
            None => Rect::ZERO,
        },
        ItemData::Image(i) => Rect::new(0.0, 0.0, i.width, i.height),
        ItemData::Stamp(s) => Rect::new(0.0, 0.0, s.width, s.height),
        ItemData::StickyNote(s) => Rect::new(0.0, 0.0, s.width, s.height),
        ItemData::Text(t) => layout_text(t).bounds(),
    };
    sanitize(rect)
}

fn sanitize(rect: Rect) -> Rect {
    if [rect.x0, rect.y0, rect.x1, rect.y1].iter().all(|v| v.is_finite()) {
        rect.abs()
    } else {
        Rect::ZERO
    }
}

/// Center of the local bounds; the pivot for rotation and scale.
pub fn local_center(item: &Item) -> Point {
    local_bounds(item).center()
}

/// World-space position of the item's pivot (in its parent's space for nested items).
pub fn pivot(item: &Item) -> Point {
    let c = local_center(item);
    Point::new(item.transform.x + c.x, item.transform.y + c.y)
}

/// Affine from an item's local space into its parent space.
pub fn item_affine(item: &Item) -> Affine {
    transform_affine(&item.transform, local_center(item))
}

/// Center-pivot affine for a transform around a given local center.
pub fn transform_affine(t: &Transform, center: Point) -> Affine {
    Affine::translate((t.x + center.x, t.y + center.y))
        * Affine::rotate(t.rotation)
        * Affine::scale_non_uniform(t.scale_x, t.scale_y)
        * Affine::translate((-center.x, -center.y))
}

/// Affine from an item's local space into world space, composing its parent when nested.
pub fn world_affine(item: &Item, parent: Option<&Item>) -> Affine {
    match parent {
        Some(p) if item.parent_id == Some(p.id) => item_affine(p) * item_affine(item),
        _ => item_affine(item),
    }
}

/// Map a point from the item's parent space into its local space.
///
/// `None` when the transform is singular (a zero scale).
pub fn to_local(item: &Item, point: Point) -> Option<Point> {
    invert(item_affine(item)).map(|inv| inv * point)
}

/// Inverse of an affine, `None` when it is singular.
pub fn invert(affine: Affine) -> Option<Affine> {
    if affine.determinant().abs() < SINGULAR_EPSILON {
        None
    } else {
        Some(affine.inverse())
    }
}

/// Local bounds scaled and translated by the transform, rotation ignored.
pub fn world_bounds(item: &Item) -> Rect {
    let local = local_bounds(item);
    let t = &item.transform;
    let c = pivot(item);
    let hw = local.width() / 2.0 * t.scale_x.abs();
    let hh = local.height() / 2.0 * t.scale_y.abs();
    sanitize(Rect::new(c.x - hw, c.y - hh, c.x + hw, c.y + hh))
}

/// Axis-aligned bounds of the rotated corners. Used for the spatial index so rotated items
/// stay reachable by range queries.
pub fn index_bounds(item: &Item) -> Rect {
    item_obb(item).aabb()
}

/// Shortest signed angular difference `a - b`, normalized to `(-PI, PI]`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % std::f64::consts::TAU;
    if d > std::f64::consts::PI {
        d -= std::f64::consts::TAU;
    } else if d <= -std::f64::consts::PI {
        d += std::f64::consts::TAU;
    }
    d
}

/// Snap an angle to the nearest multiple of `step` (radians).
pub fn snap_angle(angle: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return angle;
    }
    (angle / step).round() * step
}

/// Rotate `p` about `center` by `angle` radians.
pub fn rotate_about(p: Point, center: Point, angle: f64) -> Point {
    let (s, c) = angle.sin_cos();
    let d = p - center;
    center + Vec2::new(d.x * c - d.y * s, d.x * s + d.y * c)
}

/// Distance from `p` to the segment `a..b`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 <= f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Inclusive rect overlap so zero-area rects still intersect what they touch.
pub fn rects_touch(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// An oriented bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Point,
    /// Half width and half height along the box's own axes.
    pub half: Vec2,
    pub rotation: f64,
}

impl Obb {
    pub fn new(center: Point, half: Vec2, rotation: f64) -> Self {
        Self {
            center,
            half: Vec2::new(half.x.abs(), half.y.abs()),
            rotation,
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(
            rect.center(),
            Vec2::new(rect.width() / 2.0, rect.height() / 2.0),
            0.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.half.x * 2.0
    }

    pub fn height(&self) -> f64 {
        self.half.y * 2.0
    }

    /// Unit vectors of the box's x and y axes.
    pub fn axes(&self) -> (Vec2, Vec2) {
        let (s, c) = self.rotation.sin_cos();
        (Vec2::new(c, s), Vec2::new(-s, c))
    }

    /// Express a world point in box coordinates (origin at center, unrotated).
    pub fn to_box(&self, p: Point) -> Vec2 {
        let (u, v) = self.axes();
        let d = p - self.center;
        Vec2::new(d.dot(u), d.dot(v))
    }

    /// Map box coordinates back to world.
    pub fn from_box(&self, local: Vec2) -> Point {
        let (u, v) = self.axes();
        self.center + u * local.x + v * local.y
    }

    /// Corners in order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        let h = self.half;
        [
            self.from_box(Vec2::new(-h.x, -h.y)),
            self.from_box(Vec2::new(h.x, -h.y)),
            self.from_box(Vec2::new(h.x, h.y)),
            self.from_box(Vec2::new(-h.x, h.y)),
        ]
    }

    pub fn aabb(&self) -> Rect {
        let [a, b, c, d] = self.corners();
        sanitize(Rect::from_points(a, b).union_pt(c).union_pt(d))
    }

    /// Whether `p` lies inside the box grown by `padding` on every side.
    pub fn contains(&self, p: Point, padding: f64) -> bool {
        let local = self.to_box(p);
        local.x.abs() <= self.half.x + padding && local.y.abs() <= self.half.y + padding
    }
}

/// Oriented box of an item in its parent space.
pub fn item_obb(item: &Item) -> Obb {
    let local = local_bounds(item);
    let t = &item.transform;
    Obb::new(
        pivot(item),
        Vec2::new(
            local.width() / 2.0 * t.scale_x.abs(),
            local.height() / 2.0 * t.scale_y.abs(),
        ),
        t.rotation,
    )
}

/// OBB hit test: undo rotation about the pivot, then compare against the scaled half
/// extents plus `padding` (world units; pass a screen constant divided by zoom).
pub fn hit_test(item: &Item, point: Point, padding: f64) -> bool {
    item_obb(item).contains(point, padding)
}

/// Selection frame for a set of items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupBounds {
    pub obb: Obb,
    /// `true` when every member shares one rotation and the frame is aligned to it.
    pub oriented: bool,
}

/// Bounding frame of several items.
///
/// If all rotations agree within `tolerance` radians, the frame is rotated to the shared
/// angle and fitted by projecting member corners onto its axes. Otherwise it is the
/// axis-aligned box of all rotated corners.
pub fn group_bounds<'a>(items: impl IntoIterator<Item = &'a Item>, tolerance: f64) -> Option<GroupBounds> {
    let obbs: Vec<Obb> = items.into_iter().map(item_obb).collect();
    let first = obbs.first()?;
    let rotation = first.rotation;
    let shared = obbs
        .iter()
        .all(|o| angle_diff(o.rotation, rotation).abs() <= tolerance);

    if shared {
        let axes = Obb::new(Point::ZERO, Vec2::ZERO, rotation);
        let (u, v) = axes.axes();
        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for corner in obbs.iter().flat_map(|o| o.corners()) {
            let pu = corner.to_vec2().dot(u);
            let pv = corner.to_vec2().dot(v);
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }
        let center = (u * ((min_u + max_u) / 2.0) + v * ((min_v + max_v) / 2.0)).to_point();
        Some(GroupBounds {
            obb: Obb::new(
                center,
                Vec2::new((max_u - min_u) / 2.0, (max_v - min_v) / 2.0),
                rotation,
            ),
            oriented: true,
        })
    } else {
        let rect = obbs
            .iter()
            .map(Obb::aabb)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO);
        Some(GroupBounds {
            obb: Obb::from_rect(rect),
            oriented: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{ImageData, PathData, SerializableColor, StickyNoteData, Transform};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn image(x: f64, y: f64, w: f64, h: f64) -> Item {
        Item::new(ItemData::Image(ImageData::new("u", w, h)), Transform::at(x, y), 0.0)
    }

    fn assert_close(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_path_local_bounds_include_width() {
        let item = Item::new(
            ItemData::Path(PathData::new(
                vec![Point::new(0.0, 0.0), Point::new(10.0, 20.0)],
                SerializableColor::black(),
                4.0,
            )),
            Transform::IDENTITY,
            0.0,
        );
        assert_eq!(local_bounds(&item), Rect::new(-2.0, -2.0, 12.0, 22.0));
    }

    #[test]
    fn test_empty_path_degrades_to_zero_area() {
        let item = Item::new(
            ItemData::Path(PathData::new(vec![], SerializableColor::black(), 2.0)),
            Transform::at(5.0, 5.0),
            0.0,
        );
        assert_eq!(local_bounds(&item), Rect::ZERO);
        assert!(world_bounds(&item).is_zero_area());
    }

    #[test]
    fn test_world_bounds_scale_about_center() {
        let mut item = image(10.0, 10.0, 100.0, 50.0);
        item.transform.scale_x = 2.0;
        // Pivot stays at (60, 35)
        assert_eq!(world_bounds(&item), Rect::new(-40.0, 10.0, 160.0, 60.0));
        // Rotation is ignored
        item.transform.rotation = 1.0;
        assert_eq!(world_bounds(&item), Rect::new(-40.0, 10.0, 160.0, 60.0));
    }

    #[test]
    fn test_local_roundtrip() {
        let mut item = image(30.0, -12.0, 80.0, 40.0);
        item.transform.rotation = 0.7;
        item.transform.scale_x = 1.5;
        item.transform.scale_y = 0.5;
        let affine = item_affine(&item);
        for p in [Point::new(0.0, 0.0), Point::new(80.0, 40.0), Point::new(13.0, 27.0)] {
            let world = affine * p;
            assert_close(to_local(&item, world).unwrap(), p);
        }
    }

    #[test]
    fn test_center_stays_fixed_under_rotation() {
        let mut item = image(0.0, 0.0, 100.0, 100.0);
        item.transform.rotation = FRAC_PI_4;
        assert_close(item_affine(&item) * Point::new(50.0, 50.0), Point::new(50.0, 50.0));
    }

    #[test]
    fn test_singular_transform_has_no_inverse() {
        let mut item = image(0.0, 0.0, 10.0, 10.0);
        item.transform.scale_x = 0.0;
        assert!(to_local(&item, Point::ZERO).is_none());
    }

    #[test]
    fn test_hit_test_rotation_invariant() {
        let mut item = image(0.0, 0.0, 100.0, 20.0);
        let c = pivot(&item);
        let queries = [
            Point::new(95.0, 10.0),
            Point::new(50.0, 23.0),
            Point::new(50.0, 40.0),
            Point::new(-3.0, 5.0),
        ];
        let before: Vec<bool> = queries.iter().map(|q| hit_test(&item, *q, 4.0)).collect();
        for angle in [0.3, FRAC_PI_2, 2.5, -1.1] {
            item.transform.rotation = angle;
            let after: Vec<bool> = queries
                .iter()
                .map(|q| hit_test(&item, rotate_about(*q, c, angle), 4.0))
                .collect();
            assert_eq!(before, after, "angle {angle}");
        }
        assert_eq!(before, vec![true, true, false, true]);
    }

    #[test]
    fn test_index_bounds_cover_rotated_corners() {
        let mut item = image(0.0, 0.0, 100.0, 10.0);
        item.transform.rotation = FRAC_PI_2;
        let aabb = index_bounds(&item);
        assert!((aabb.width() - 10.0).abs() < 1e-9);
        assert!((aabb.height() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_bounds_shared_rotation() {
        let mut a = image(0.0, 0.0, 10.0, 10.0);
        let mut b = image(100.0, 0.0, 10.0, 10.0);
        a.transform.rotation = 0.5;
        b.transform.rotation = 0.52;
        let group = group_bounds([&a, &b], 0.1).unwrap();
        assert!(group.oriented);
        assert!((group.obb.rotation - 0.5).abs() < 1e-12);
        for corner in item_obb(&a).corners().into_iter().chain(item_obb(&b).corners()) {
            assert!(group.obb.contains(corner, 1e-6));
        }
    }

    #[test]
    fn test_group_bounds_mixed_rotation_falls_back_to_aabb() {
        let a = image(0.0, 0.0, 10.0, 10.0);
        let mut b = image(100.0, 0.0, 10.0, 10.0);
        b.transform.rotation = 1.0;
        let group = group_bounds([&a, &b], 0.1).unwrap();
        assert!(!group.oriented);
        assert_eq!(group.obb.rotation, 0.0);
        assert!(group.obb.aabb().contains(Point::new(0.0, 0.0)));
        assert!(group_bounds(std::iter::empty(), 0.1).is_none());
    }

    #[test]
    fn test_world_affine_composes_parent() {
        let note = Item::new(
            ItemData::StickyNote(StickyNoteData::default()),
            Transform::at(100.0, 100.0),
            0.0,
        );
        let child = image(10.0, 10.0, 20.0, 20.0).with_parent(Some(note.id));
        let p = world_affine(&child, Some(&note)) * Point::ZERO;
        assert_close(p, Point::new(110.0, 110.0));
    }

    #[test]
    fn test_angle_helpers() {
        assert!((angle_diff(0.1, std::f64::consts::TAU - 0.1) - 0.2).abs() < 1e-12);
        let snapped = snap_angle(0.27, 15f64.to_radians());
        assert!((snapped - 15f64.to_radians()).abs() < 1e-12);
        let d = point_segment_distance(Point::new(5.0, 3.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-12);
    }
}
