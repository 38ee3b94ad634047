//! Engine configuration.
//!
//! Every group is defaulted, so a partial JSON document only overrides the keys it names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Spatial index tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadtreeConfig {
    pub max_objects: usize,
    pub max_levels: usize,
}

impl Default for QuadtreeConfig {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_levels: 5,
        }
    }
}

/// Undo/redo tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

/// Network-facing timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interval between outbound draw-batch flushes.
    pub batch_interval_ms: f64,
    /// Fraction of the remaining distance a remote cursor covers per 16 ms frame.
    pub cursor_smoothing: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_interval_ms: 50.0,
            cursor_smoothing: 0.35,
        }
    }
}

/// One Euro filter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_cutoff: f64,
    pub beta: f64,
    pub d_cutoff: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_cutoff: 1.0,
            beta: 0.007,
            d_cutoff: 1.0,
        }
    }
}

/// Stroke finalization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeConfig {
    /// Douglas-Peucker tolerance in screen pixels (divided by zoom).
    pub simplify_tolerance: f64,
    /// Shape-pen strokes whose bounding box is smaller than this (world units) are dropped.
    pub shape_min_size: f64,
    /// Minimum recognizer score to accept a match.
    pub recognition_threshold: f64,
    /// Number of points candidates and templates are resampled to.
    pub resample_count: usize,
    /// Endpoint-distance / path-length ratio at which a stroke counts as a straight line.
    pub straightness: f64,
    pub eraser_width: f64,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            simplify_tolerance: 1.0,
            shape_min_size: 10.0,
            recognition_threshold: 0.8,
            resample_count: 64,
            straightness: 0.95,
            eraser_width: 20.0,
        }
    }
}

/// Selection frame and hit-testing parameters, in screen pixels unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub handle_size: f64,
    pub rotate_handle_offset: f64,
    pub hit_padding: f64,
    /// Side handles hide when the box is smaller than this on screen.
    pub min_side_handle_size: f64,
    /// Rotate handle hides when the box is shorter than this on screen.
    pub min_rotate_handle_height: f64,
    /// Max rotation spread (radians) for a group to get a shared OBB.
    pub group_rotation_tolerance: f64,
    /// Rotation snap step in degrees.
    pub snap_angle_deg: f64,
    /// Smallest scale a resize can produce.
    pub min_scale: f64,
    /// World-space nudge step for arrow keys.
    pub nudge_step: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            handle_size: 8.0,
            rotate_handle_offset: 24.0,
            hit_padding: 6.0,
            min_side_handle_size: 40.0,
            min_rotate_handle_height: 16.0,
            group_rotation_tolerance: 0.1,
            snap_angle_deg: 15.0,
            min_scale: 0.05,
            nudge_step: 1.0,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub quadtree: QuadtreeConfig,
    pub history: HistoryConfig,
    pub sync: SyncConfig,
    pub filter: FilterConfig,
    pub stroke: StrokeConfig,
    pub selection: SelectionConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quadtree.max_objects == 0 {
            return Err(ConfigError::Invalid {
                field: "quadtree.max_objects",
                reason: "must be at least 1".into(),
            });
        }
        if self.stroke.resample_count < 8 {
            return Err(ConfigError::Invalid {
                field: "stroke.resample_count",
                reason: format!("{} is too few points", self.stroke.resample_count),
            });
        }
        if !(self.sync.batch_interval_ms > 0.0) {
            return Err(ConfigError::Invalid {
                field: "sync.batch_interval_ms",
                reason: "must be positive".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.sync.cursor_smoothing) {
            return Err(ConfigError::Invalid {
                field: "sync.cursor_smoothing",
                reason: "must be within 0..=1".into(),
            });
        }
        Ok(())
    }
}
