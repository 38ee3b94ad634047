//! Layer compositing.
//!
//! [`Compositor`] is the capability the engine renders through. [`SoftwareCompositor`] keeps
//! one cached pixmap per layer: a layer whose revision changed is repainted from its nodes,
//! otherwise only its queued stroke segments are drawn on top of the cache.

use meetink_core::scene::{LayerKind, SceneGraph};

use crate::export::pixel_size;
use crate::paint::Painter;
use crate::raster::Pixmap;
use crate::texture::TextureCache;

pub trait Compositor {
    /// Bring the output up to date with `scene`. Returns `true` if the frame changed.
    fn composite(&mut self, scene: &mut SceneGraph, textures: &TextureCache) -> bool;

    /// Drop every cache so the next composite repaints everything.
    fn invalidate(&mut self);
}

/// Paint counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositorStats {
    pub frames: u64,
    pub layer_repaints: u64,
    pub segments: u64,
}

#[derive(Debug)]
struct CachedLayer {
    kind: LayerKind,
    revision: Option<u64>,
    visible: bool,
    pixmap: Pixmap,
}

/// CPU compositor over premultiplied RGBA pixmaps.
#[derive(Debug)]
pub struct SoftwareCompositor {
    layers: Vec<CachedLayer>,
    frame: Pixmap,
    stats: CompositorStats,
}

impl Default for SoftwareCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareCompositor {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            frame: Pixmap::new(0, 0),
            stats: CompositorStats::default(),
        }
    }

    /// The last composited frame.
    pub fn frame(&self) -> &Pixmap {
        &self.frame
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    /// Cached pixels of a single layer.
    pub fn layer(&self, kind: LayerKind) -> Option<&Pixmap> {
        self.layers.iter().find(|l| l.kind == kind).map(|l| &l.pixmap)
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::debug!("Compositor surface resized to {width}x{height}");
        self.frame = Pixmap::new(width, height);
        self.layers = LayerKind::ALL
            .iter()
            .map(|kind| CachedLayer {
                kind: *kind,
                revision: None,
                visible: true,
                pixmap: Pixmap::new(width, height),
            })
            .collect();
    }
}

impl Compositor for SoftwareCompositor {
    fn composite(&mut self, scene: &mut SceneGraph, textures: &TextureCache) -> bool {
        let Some((width, height)) = pixel_size(scene.viewport) else {
            return false;
        };
        if self.frame.width() != width || self.frame.height() != height || self.layers.is_empty() {
            self.resize(width, height);
        }

        let painter = Painter::new(textures);
        let view = scene.view;
        let mut dirty = false;
        for (cache, layer) in self.layers.iter_mut().zip(scene.layers_mut()) {
            if cache.visible != layer.visible {
                cache.visible = layer.visible;
                dirty = true;
            }
            if cache.revision != Some(layer.revision()) {
                cache.pixmap.clear();
                painter.paint_nodes(&mut cache.pixmap, layer.nodes(), view);
                // The nodes already contain every queued segment.
                layer.take_segments();
                cache.revision = Some(layer.revision());
                self.stats.layer_repaints += 1;
                dirty = true;
            } else if layer.has_pending_segments() {
                let segments = layer.take_segments();
                for segment in &segments {
                    painter.paint_segment(&mut cache.pixmap, segment, view);
                }
                self.stats.segments += segments.len() as u64;
                dirty = true;
            }
        }

        if dirty {
            self.frame.fill(scene.background);
            for cache in self.layers.iter().filter(|l| l.visible) {
                self.frame.draw_pixmap(&cache.pixmap, 1.0, None);
            }
            self.stats.frames += 1;
        }
        dirty
    }

    fn invalidate(&mut self) {
        for cache in &mut self.layers {
            cache.revision = None;
        }
    }
}
