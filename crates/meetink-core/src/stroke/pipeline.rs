//! Freehand stroke input: capture, live preview, batching for peers and finalization.
//!
//! The pipeline never mutates the item store. [`StrokeInput::end`] returns a
//! [`StrokeOutcome`] describing what the stroke produced, and the caller applies it through
//! the store, history and sync paths like any other local edit.

use kurbo::{Affine, Point, Rect};
use uuid::Uuid;

use super::filter::OneEuroFilter;
use super::recognizer::ShapeRecognizer;
use super::simplify::{simplify, straightness};
use crate::clock::ZIndexAllocator;
use crate::config::{FilterConfig, StrokeConfig};
use crate::geometry::{self, invert, local_bounds, local_center, point_segment_distance, world_affine};
use crate::items::{
    Erasure, Item, ItemData, ItemId, PathData, SerializableColor, Transform, points_bounds,
    upsert_erasure,
};
use crate::scene::{LayerKind, NodeBlend, SceneGraph};
use crate::spatial::SpatialIndex;
use crate::store::{ItemStore, sort_for_paint};
use crate::sync::protocol::DrawBatch;
use crate::tools::ToolKind;

/// Colour of the eraser trail while dragging.
const ERASER_TRAIL: SerializableColor = SerializableColor::new(160, 160, 160, 110);

/// Result of finishing a stroke.
#[derive(Debug, Clone, PartialEq)]
pub enum StrokeOutcome {
    /// A new path item ready to insert.
    Created(Item),
    /// The stroke produced nothing (too small, or an unrecognized shape).
    Discarded,
    Erased(EraseOutcome),
}

/// Items touched by an eraser stroke.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EraseOutcome {
    /// Erasable items in their new state, each with the stroke's erasure appended.
    pub updated: Vec<Item>,
    /// Atomic items hit by the stroke.
    pub deleted: Vec<ItemId>,
    /// World positions for particle bursts, one per deleted item.
    pub bursts: Vec<Point>,
}

impl EraseOutcome {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Clone)]
struct ActiveStroke {
    tool: ToolKind,
    color: SerializableColor,
    width: f64,
    /// Filtered world-space points.
    points: Vec<Point>,
    /// Sticky-note under the start point.
    anchor_note: Option<ItemId>,
    erasure_id: Uuid,
}

/// Stroke capture state for pen, shape pen and eraser.
#[derive(Debug, Clone)]
pub struct StrokeInput {
    config: StrokeConfig,
    batch_interval_ms: f64,
    filter: OneEuroFilter,
    recognizer: ShapeRecognizer,
    active: Option<ActiveStroke>,
    outbound: Vec<Point>,
    outbound_is_new: bool,
    last_flush_ms: f64,
}

impl StrokeInput {
    pub fn new(config: StrokeConfig, filter: FilterConfig, batch_interval_ms: f64) -> Self {
        let recognizer = ShapeRecognizer::new(config.resample_count);
        Self {
            config,
            batch_interval_ms,
            filter: OneEuroFilter::new(filter),
            recognizer,
            active: None,
            outbound: Vec::new(),
            outbound_is_new: false,
            last_flush_ms: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn tool(&self) -> Option<ToolKind> {
        self.active.as_ref().map(|s| s.tool)
    }

    /// Points captured so far, in world space.
    pub fn points(&self) -> &[Point] {
        self.active.as_ref().map_or(&[], |s| s.points.as_slice())
    }

    /// Sticky-note the stroke started in, if any.
    pub fn anchor_note(&self) -> Option<ItemId> {
        self.active.as_ref().and_then(|s| s.anchor_note)
    }

    /// Start a stroke at `point` (world space).
    #[allow(clippy::too_many_arguments)]
    pub fn begin(
        &mut self,
        store: &ItemStore,
        scene: &mut SceneGraph,
        tool: ToolKind,
        color: SerializableColor,
        width: f64,
        point: Point,
        time_ms: f64,
    ) {
        self.filter.reset();
        let start = self.filter.filter(point, time_ms);
        let anchor_note = sticky_note_at(store, start);

        let (trail, blend) = match tool {
            ToolKind::Eraser => (ERASER_TRAIL, NodeBlend::Normal),
            _ => (color, NodeBlend::Normal),
        };
        let dynamic = scene.layer_mut(LayerKind::Dynamic);
        dynamic.clear();
        dynamic.begin_stroke(start, trail, width, blend);

        self.outbound = vec![start];
        self.outbound_is_new = true;
        self.last_flush_ms = time_ms;
        self.active = Some(ActiveStroke {
            tool,
            color,
            width,
            points: vec![start],
            anchor_note,
            erasure_id: Uuid::new_v4(),
        });
        log::debug!("Stroke started with {} at {start:?}", tool.name());
    }

    /// Append a raw pointer sample. With `lock_axis` the point is pinned to the dominant
    /// axis through the stroke's start. Returns the point actually appended.
    pub fn extend(
        &mut self,
        scene: &mut SceneGraph,
        point: Point,
        lock_axis: bool,
        time_ms: f64,
    ) -> Option<Point> {
        let stroke = self.active.as_mut()?;
        let mut p = self.filter.filter(point, time_ms);
        if lock_axis {
            p = lock_to_axis(stroke.points[0], p);
        }
        if stroke.points.last() == Some(&p) {
            return None;
        }
        stroke.points.push(p);
        scene.layer_mut(LayerKind::Dynamic).extend_stroke(p);
        self.outbound.push(p);
        Some(p)
    }

    /// Points queued for peers since the last flush, once the batch interval has elapsed or
    /// when `force` is set.
    pub fn take_batch(&mut self, now_ms: f64, force: bool) -> Option<DrawBatch> {
        let stroke = self.active.as_ref()?;
        if self.outbound.is_empty() {
            return None;
        }
        if !force && now_ms - self.last_flush_ms < self.batch_interval_ms {
            return None;
        }
        self.last_flush_ms = now_ms;
        Some(DrawBatch {
            sender_id: None,
            points: std::mem::take(&mut self.outbound),
            color: stroke.color,
            width: stroke.width,
            tool: stroke.tool,
            is_new_stroke: std::mem::replace(&mut self.outbound_is_new, false),
        })
    }

    /// Drop the stroke without producing anything.
    pub fn cancel(&mut self, scene: &mut SceneGraph) {
        self.active = None;
        self.outbound.clear();
        scene.layer_mut(LayerKind::Dynamic).clear();
    }

    /// Finish the stroke. Flush any pending batch with [`take_batch`](Self::take_batch)
    /// first; unsent points are dropped here.
    pub fn end(
        &mut self,
        store: &ItemStore,
        index: &SpatialIndex,
        scene: &mut SceneGraph,
        zoom: f64,
        z_alloc: &mut ZIndexAllocator,
    ) -> StrokeOutcome {
        scene.layer_mut(LayerKind::Dynamic).clear();
        self.outbound.clear();
        let Some(stroke) = self.active.take() else {
            return StrokeOutcome::Discarded;
        };

        match stroke.tool {
            ToolKind::Eraser => StrokeOutcome::Erased(self.erase(&stroke, store, index)),
            ToolKind::ShapePen => match self.idealize(&stroke.points) {
                Some(points) => {
                    StrokeOutcome::Created(finalize_path(store, &stroke, points, z_alloc.next()))
                }
                None => StrokeOutcome::Discarded,
            },
            _ => {
                let tolerance = self.config.simplify_tolerance / zoom.max(f64::EPSILON);
                let mut points = simplify(&stroke.points, tolerance);
                if points.len() == 1 {
                    points.push(points[0]);
                }
                StrokeOutcome::Created(finalize_path(store, &stroke, points, z_alloc.next()))
            }
        }
    }

    /// Shape-pen post-processing: a direct line for straight or very short strokes, the
    /// ideal outline for a recognized shape, `None` otherwise.
    fn idealize(&self, points: &[Point]) -> Option<Vec<Point>> {
        let bounds = points_bounds(points)?;
        if bounds.width().max(bounds.height()) < self.config.shape_min_size {
            log::debug!("Shape stroke below minimum size, discarded");
            return None;
        }
        let (first, last) = (*points.first()?, *points.last()?);
        if points.len() <= 4 || straightness(points) >= self.config.straightness {
            return Some(vec![first, last]);
        }
        match self
            .recognizer
            .classify(points, self.config.recognition_threshold)
        {
            Some(r) => {
                log::debug!("Recognized {} (score {:.2})", r.kind.name(), r.score);
                Some(r.kind.ideal_points(bounds))
            }
            None => {
                log::debug!("No shape matched, stroke discarded");
                None
            }
        }
    }

    fn erase(&self, stroke: &ActiveStroke, store: &ItemStore, index: &SpatialIndex) -> EraseOutcome {
        let mut out = EraseOutcome::default();
        let Some(bounds) = points_bounds(&stroke.points) else {
            return out;
        };
        let half = stroke.width / 2.0;
        let query = bounds.inflate(half, half);

        let hits = index.query_rect(query);
        let mut candidates: Vec<&Item> = hits
            .iter()
            .filter_map(|id| store.get(id))
            .filter(|item| item.is_root())
            .collect();
        sort_for_paint(&mut candidates);

        let samples = densify(&stroke.points, (half / 2.0).max(1.0));
        for item in candidates {
            if stroke.anchor_note == Some(item.id) {
                for child in store.children_of(&item.id) {
                    erase_item(child, Some(item), stroke, &samples, &mut out);
                }
                continue;
            }
            erase_item(item, None, stroke, &samples, &mut out);
        }
        log::debug!(
            "Eraser touched {} items, deleted {}",
            out.updated.len(),
            out.deleted.len()
        );
        out
    }
}

/// Topmost root sticky-note containing `point`.
fn sticky_note_at(store: &ItemStore, point: Point) -> Option<ItemId> {
    store
        .render_order()
        .into_iter()
        .rev()
        .find(|item| item.as_sticky_note().is_some() && geometry::hit_test(item, point, 0.0))
        .map(|item| item.id)
}

fn lock_to_axis(anchor: Point, p: Point) -> Point {
    let d = p - anchor;
    if d.x.abs() >= d.y.abs() {
        Point::new(p.x, anchor.y)
    } else {
        Point::new(anchor.x, p.y)
    }
}

/// Build the finished path item, moving points into the anchor note's space when the
/// stroke started inside one.
fn finalize_path(store: &ItemStore, stroke: &ActiveStroke, points: Vec<Point>, z_index: f64) -> Item {
    let parent = stroke
        .anchor_note
        .and_then(|id| store.get(&id))
        .and_then(|note| invert(world_affine(note, None)).map(|inv| (note, inv)));

    let (points, width, parent_id) = match parent {
        Some((note, inv)) => {
            let scale = affine_scale(world_affine(note, None));
            (
                points.into_iter().map(|p| inv * p).collect(),
                stroke.width / scale,
                Some(note.id),
            )
        }
        None => (points, stroke.width, None),
    };

    Item::new(
        ItemData::Path(PathData::new(points, stroke.color, width)),
        Transform::IDENTITY,
        z_index,
    )
    .with_parent(parent_id)
}

/// Average linear scale of an affine.
fn affine_scale(affine: Affine) -> f64 {
    affine.determinant().abs().sqrt().max(f64::EPSILON)
}

/// Points along the polyline no further apart than `step`.
fn densify(points: &[Point], step: f64) -> Vec<Point> {
    let mut out = Vec::with_capacity(points.len());
    if let Some(first) = points.first() {
        out.push(*first);
    }
    for w in points.windows(2) {
        let len = w[0].distance(w[1]);
        let n = (len / step).ceil().max(1.0) as usize;
        for i in 1..=n {
            out.push(w[0].lerp(w[1], i as f64 / n as f64));
        }
    }
    out
}

fn erase_item(
    item: &Item,
    parent: Option<&Item>,
    stroke: &ActiveStroke,
    samples: &[Point],
    out: &mut EraseOutcome,
) {
    let affine = world_affine(item, parent);
    let Some(inv) = invert(affine) else {
        return;
    };
    let scale = affine_scale(affine);
    let pad = stroke.width / 2.0 / scale;
    let local: Vec<Point> = samples.iter().map(|p| inv * *p).collect();
    if !touches(item, &local, pad) {
        return;
    }

    if item.kind().supports_erasure() {
        let mut updated = item.clone();
        if let Some(erasures) = updated.data.erasures_mut() {
            upsert_erasure(
                erasures,
                Erasure {
                    id: stroke.erasure_id,
                    points: stroke.points.iter().map(|p| inv * *p).collect(),
                    size: stroke.width / scale,
                },
            );
        }
        out.updated.push(updated);
    } else {
        out.deleted.push(item.id);
        out.bursts.push(affine * local_center(item));
    }
}

/// Whether local-space samples come within `pad` of the item's content.
fn touches(item: &Item, samples: &[Point], pad: f64) -> bool {
    match &item.data {
        ItemData::Path(path) if path.points.len() > 1 => {
            let reach = pad + path.width / 2.0;
            samples.iter().any(|s| {
                path.points
                    .windows(2)
                    .any(|w| point_segment_distance(*s, w[0], w[1]) <= reach)
            })
        }
        _ => {
            let r: Rect = local_bounds(item).inflate(pad, pad);
            samples
                .iter()
                .any(|p| p.x >= r.x0 && p.x <= r.x1 && p.y >= r.y0 && p.y <= r.y1)
        }
    }
}
