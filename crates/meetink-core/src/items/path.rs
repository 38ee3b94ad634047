//! Freehand path payload.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

use super::{Erasure, SerializableColor};

/// Point-count below which a path is treated as a recognized geometric shape and drawn
/// with straight segments instead of curve smoothing.
pub const SMOOTHING_MIN_POINTS: usize = 10;

/// How a path composites onto content beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeBlend {
    #[default]
    Normal,
    /// Eraser-colored path: removes pixels beneath it within the same content stack.
    Erase,
}

/// Stroke points, color, width and erasure list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathData {
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub color: SerializableColor,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default, skip_serializing_if = "is_normal")]
    pub blend: StrokeBlend,
    #[serde(default)]
    pub erasures: Vec<Erasure>,
}

fn default_width() -> f64 {
    2.0
}

fn is_normal(blend: &StrokeBlend) -> bool {
    *blend == StrokeBlend::Normal
}

impl PathData {
    pub fn new(points: Vec<Point>, color: SerializableColor, width: f64) -> Self {
        Self {
            points,
            color,
            width,
            blend: StrokeBlend::Normal,
            erasures: Vec::new(),
        }
    }

    /// Whether this path should be drawn with quadratic smoothing.
    pub fn is_smoothed(&self) -> bool {
        self.points.len() >= SMOOTHING_MIN_POINTS
    }

    /// Bounding box of the raw points, without stroke width.
    pub fn point_bounds(&self) -> Option<Rect> {
        points_bounds(&self.points)
    }
}

/// Axis-aligned bounds of a point list. `None` when empty or non-finite.
pub fn points_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.iter().find(|p| p.x.is_finite() && p.y.is_finite())?;
    let mut rect = Rect::from_points(*first, *first);
    for p in points {
        if p.x.is_finite() && p.y.is_finite() {
            rect = rect.union_pt(*p);
        }
    }
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_bounds() {
        let b = points_bounds(&[Point::new(1.0, 5.0), Point::new(-2.0, 3.0), Point::new(4.0, 9.0)])
            .unwrap();
        assert_eq!(b, Rect::new(-2.0, 3.0, 4.0, 9.0));
        assert!(points_bounds(&[]).is_none());
    }

    #[test]
    fn test_points_bounds_skips_nan() {
        let b = points_bounds(&[Point::new(f64::NAN, 0.0), Point::new(1.0, 1.0)]).unwrap();
        assert_eq!(b, Rect::new(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_smoothing_threshold() {
        let short = PathData::new(vec![Point::ZERO; 4], SerializableColor::black(), 2.0);
        let long = PathData::new(vec![Point::ZERO; 12], SerializableColor::black(), 2.0);
        assert!(!short.is_smoothed());
        assert!(long.is_smoothed());
    }
}
