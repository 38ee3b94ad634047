//! Template-matching shape recognizer for hand-drawn strokes.
//!
//! Candidates are resampled to a fixed point count, scaled into a reference square, rotated
//! so the angle from their centroid to the first point is zero and centered on the origin.
//! Scaling first makes every rectangle a square and every ellipse a circle, so matching does
//! not depend on aspect ratio.
//! They are then compared with each template by mean point distance at the best rotation
//! found by golden-section search.

use std::f64::consts::{PI, TAU};

use kurbo::{Point, Rect, Vec2};

use crate::items::points_bounds;

/// Side of the reference square candidates are scaled into.
const SQUARE_SIZE: f64 = 250.0;
/// Rotation search window either side of the indicative angle.
const ANGLE_RANGE: f64 = PI / 4.0;
const ANGLE_PRECISION: f64 = PI / 90.0;
/// Golden ratio conjugate for the rotation search.
const PHI: f64 = 0.618_033_988_749_895;

/// Shapes the recognizer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Rectangle,
    Triangle,
    Circle,
}

impl ShapeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::Circle => "circle",
        }
    }

    /// Idealized outline filling `bounds`.
    ///
    /// Rectangles and triangles stay under the smoothing threshold so they render with
    /// straight edges; circles are dense enough to be smoothed.
    pub fn ideal_points(&self, bounds: Rect) -> Vec<Point> {
        let (x0, y0, x1, y1) = (bounds.x0, bounds.y0, bounds.x1, bounds.y1);
        match self {
            ShapeKind::Rectangle => vec![
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
                Point::new(x0, y0),
            ],
            ShapeKind::Triangle => {
                let apex = Point::new((x0 + x1) / 2.0, y0);
                vec![apex, Point::new(x1, y1), Point::new(x0, y1), apex]
            }
            ShapeKind::Circle => {
                let c = bounds.center();
                let (rx, ry) = (bounds.width() / 2.0, bounds.height() / 2.0);
                (0..=64)
                    .map(|i| {
                        let t = TAU * i as f64 / 64.0;
                        Point::new(c.x + rx * t.cos(), c.y + ry * t.sin())
                    })
                    .collect()
            }
        }
    }
}

/// A recognized shape with its match score in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recognition {
    pub kind: ShapeKind,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct Template {
    kind: ShapeKind,
    points: Vec<Point>,
}

/// Nearest-template classifier over rectangle, triangle and circle templates, each drawn in
/// both directions.
#[derive(Debug, Clone)]
pub struct ShapeRecognizer {
    templates: Vec<Template>,
    resample_count: usize,
}

impl Default for ShapeRecognizer {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ShapeRecognizer {
    pub fn new(resample_count: usize) -> Self {
        let n = resample_count.max(8);
        let mut recognizer = Self {
            templates: Vec::new(),
            resample_count: n,
        };

        let unit = Rect::new(0.0, 0.0, 100.0, 100.0);
        let rect = ShapeKind::Rectangle.ideal_points(unit);
        recognizer.add_both_directions(ShapeKind::Rectangle, &rect);

        // Triangles are not symmetric under the indicative-angle rotation, so register
        // every starting vertex
        let tri = ShapeKind::Triangle.ideal_points(unit);
        let vertices = &tri[..3];
        for start in 0..3 {
            let mut rotated: Vec<Point> = (0..3).map(|i| vertices[(start + i) % 3]).collect();
            rotated.push(rotated[0]);
            recognizer.add_both_directions(ShapeKind::Triangle, &rotated);
        }

        let circle = ShapeKind::Circle.ideal_points(unit);
        recognizer.add_both_directions(ShapeKind::Circle, &circle);
        recognizer
    }

    fn add_both_directions(&mut self, kind: ShapeKind, points: &[Point]) {
        let forward = normalize(points, self.resample_count);
        let mut reversed_src = points.to_vec();
        reversed_src.reverse();
        let reversed = normalize(&reversed_src, self.resample_count);
        if let Some(points) = forward {
            self.templates.push(Template { kind, points });
        }
        if let Some(points) = reversed {
            self.templates.push(Template { kind, points });
        }
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// Best matching template, regardless of score. `None` for degenerate input.
    pub fn recognize(&self, points: &[Point]) -> Option<Recognition> {
        let candidate = normalize(points, self.resample_count)?;
        let half_diagonal = 0.5 * (2.0 * SQUARE_SIZE * SQUARE_SIZE).sqrt();

        self.templates
            .iter()
            .map(|t| {
                let d = distance_at_best_angle(&candidate, &t.points);
                Recognition {
                    kind: t.kind,
                    score: 1.0 - d / half_diagonal,
                }
            })
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// Best match if its score reaches `threshold`.
    pub fn classify(&self, points: &[Point], threshold: f64) -> Option<Recognition> {
        self.recognize(points).filter(|r| r.score >= threshold)
    }
}

/// Resample, scale, rotate to the indicative angle and center. `None` if the stroke has no
/// length.
fn normalize(points: &[Point], n: usize) -> Option<Vec<Point>> {
    let resampled = resample(points, n)?;
    let scaled = scale_to_square(&resampled, SQUARE_SIZE);
    let c = centroid(&scaled);
    let angle = (c.y - scaled[0].y).atan2(c.x - scaled[0].x);
    let rotated = rotate_by(&scaled, -angle);
    Some(translate_to_origin(&rotated))
}

/// Resample into `n` points evenly spaced along the path.
pub fn resample(points: &[Point], n: usize) -> Option<Vec<Point>> {
    let finite: Vec<Point> = points
        .iter()
        .copied()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    let length: f64 = finite.windows(2).map(|w| w[0].distance(w[1])).sum();
    if finite.len() < 2 || length <= f64::EPSILON || n < 2 {
        return None;
    }

    let interval = length / (n - 1) as f64;
    let mut out = Vec::with_capacity(n);
    out.push(finite[0]);
    let mut accumulated = 0.0;
    let mut prev = finite[0];
    let mut i = 1;
    while i < finite.len() {
        let curr = finite[i];
        let d = prev.distance(curr);
        if d > 0.0 && accumulated + d >= interval {
            let t = (interval - accumulated) / d;
            let q = prev.lerp(curr, t);
            out.push(q);
            // q becomes the start of the remaining segment
            prev = q;
            accumulated = 0.0;
        } else {
            accumulated += d;
            prev = curr;
            i += 1;
        }
        if out.len() == n {
            break;
        }
    }
    // Rounding can leave us one short
    while out.len() < n {
        out.push(finite[finite.len() - 1]);
    }
    Some(out)
}

fn centroid(points: &[Point]) -> Point {
    let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
    (sum / points.len().max(1) as f64).to_point()
}

fn rotate_by(points: &[Point], angle: f64) -> Vec<Point> {
    let c = centroid(points);
    let (s, cos) = angle.sin_cos();
    points
        .iter()
        .map(|p| {
            let d = *p - c;
            Point::new(d.x * cos - d.y * s + c.x, d.x * s + d.y * cos + c.y)
        })
        .collect()
}

fn scale_to_square(points: &[Point], size: f64) -> Vec<Point> {
    let Some(b) = points_bounds(points) else {
        return points.to_vec();
    };
    // A straight stroke has no extent on one axis; keep that axis unscaled
    let sx = if b.width() > 1e-9 { size / b.width() } else { 1.0 };
    let sy = if b.height() > 1e-9 { size / b.height() } else { 1.0 };
    points
        .iter()
        .map(|p| Point::new(p.x * sx, p.y * sy))
        .collect()
}

fn translate_to_origin(points: &[Point]) -> Vec<Point> {
    let c = centroid(points).to_vec2();
    points.iter().map(|p| *p - c).collect()
}

fn path_distance(a: &[Point], b: &[Point]) -> f64 {
    let n = a.len().min(b.len()).max(1);
    a.iter().zip(b).map(|(p, q)| p.distance(*q)).sum::<f64>() / n as f64
}

fn distance_at_angle(points: &[Point], template: &[Point], angle: f64) -> f64 {
    path_distance(&rotate_by(points, angle), template)
}

/// Golden-section search for the rotation minimizing path distance.
fn distance_at_best_angle(points: &[Point], template: &[Point]) -> f64 {
    let (mut a, mut b) = (-ANGLE_RANGE, ANGLE_RANGE);
    let mut x1 = PHI * a + (1.0 - PHI) * b;
    let mut f1 = distance_at_angle(points, template, x1);
    let mut x2 = (1.0 - PHI) * a + PHI * b;
    let mut f2 = distance_at_angle(points, template, x2);
    while (b - a).abs() > ANGLE_PRECISION {
        if f1 < f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = PHI * a + (1.0 - PHI) * b;
            f1 = distance_at_angle(points, template, x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = (1.0 - PHI) * a + PHI * b;
            f2 = distance_at_angle(points, template, x2);
        }
    }
    f1.min(f2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(center: Point, r: f64, n: usize, wobble: f64) -> Vec<Point> {
        (0..=n)
            .map(|i| {
                let t = TAU * i as f64 / n as f64;
                let rr = r + wobble * (7.0 * t).sin();
                Point::new(center.x + rr * t.cos(), center.y + rr * t.sin())
            })
            .collect()
    }

    fn densify(corners: &[Point], per_edge: usize) -> Vec<Point> {
        let mut out = Vec::new();
        for w in corners.windows(2) {
            for i in 0..per_edge {
                out.push(w[0].lerp(w[1], i as f64 / per_edge as f64));
            }
        }
        if let Some(last) = corners.last() {
            out.push(*last);
        }
        out
    }

    #[test]
    fn test_resample_count_and_spacing() {
        let line = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        let pts = resample(&line, 11).unwrap();
        assert_eq!(pts.len(), 11);
        assert!((pts[1].x - 10.0).abs() < 1e-9);
        assert!((pts[10].x - 100.0).abs() < 1e-9);
        assert!(resample(&[Point::ZERO, Point::ZERO], 8).is_none());
    }

    #[test]
    fn test_recognizes_circle() {
        let recognizer = ShapeRecognizer::default();
        let stroke = circle(Point::new(300.0, 200.0), 80.0, 90, 2.0);
        let r = recognizer.classify(&stroke, 0.8).unwrap();
        assert_eq!(r.kind, ShapeKind::Circle);
    }

    #[test]
    fn test_recognizes_counter_clockwise_rectangle() {
        let recognizer = ShapeRecognizer::default();
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 80.0),
            Point::new(150.0, 80.0),
            Point::new(150.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let r = recognizer.classify(&densify(&corners, 20), 0.8).unwrap();
        assert_eq!(r.kind, ShapeKind::Rectangle);
    }

    #[test]
    fn test_recognizes_triangle_from_any_vertex() {
        let recognizer = ShapeRecognizer::default();
        let corners = [
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
            Point::new(50.0, 0.0),
            Point::new(100.0, 100.0),
        ];
        let r = recognizer.classify(&densify(&corners, 20), 0.8).unwrap();
        assert_eq!(r.kind, ShapeKind::Triangle);
    }

    #[test]
    fn test_scribble_is_rejected() {
        let recognizer = ShapeRecognizer::default();
        let zigzag: Vec<Point> = (0..40)
            .map(|i| Point::new(i as f64 * 5.0, if i % 2 == 0 { 0.0 } else { 60.0 }))
            .collect();
        let r = recognizer.recognize(&zigzag).unwrap();
        assert!(r.score < 0.8, "zigzag scored {} as {:?}", r.score, r.kind);
    }

    #[test]
    fn test_ideal_points_fill_bounds() {
        let bounds = Rect::new(10.0, 20.0, 110.0, 70.0);
        for kind in [ShapeKind::Rectangle, ShapeKind::Triangle, ShapeKind::Circle] {
            let pts = kind.ideal_points(bounds);
            let b = points_bounds(&pts).unwrap();
            assert!((b.x0 - bounds.x0).abs() < 1e-6, "{kind:?}");
            assert!((b.x1 - bounds.x1).abs() < 1e-6, "{kind:?}");
            assert!((b.y0 - bounds.y0).abs() < 1e-6, "{kind:?}");
            assert!((b.y1 - bounds.y1).abs() < 1e-6, "{kind:?}");
        }
        assert_eq!(ShapeKind::Rectangle.ideal_points(bounds).len(), 5);
        assert_eq!(ShapeKind::Triangle.ideal_points(bounds).len(), 4);
        assert_eq!(ShapeKind::Circle.ideal_points(bounds).len(), 65);
    }

    #[test]
    fn test_template_count() {
        // rectangle x2, triangle 3 starts x2, circle x2
        assert_eq!(ShapeRecognizer::default().template_count(), 10);
    }
}
