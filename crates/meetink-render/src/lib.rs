//! Rendering for meetink boards.
//!
//! [`ItemRenderer`] turns the item store into static-layer scene nodes, overlay helpers
//! build the transient layers, and a [`Compositor`] turns the layer stack into pixels.
//! [`SoftwareCompositor`] is the CPU implementation; hosts with an accelerated 2D API can
//! provide their own.

pub mod compositor;
pub mod error;
pub mod export;
pub mod item_renderer;
pub mod overlay;
pub mod paint;
pub mod particles;
pub mod raster;
pub mod texture;

pub use compositor::{Compositor, CompositorStats, SoftwareCompositor};
pub use error::{RenderError, RenderResult};
pub use export::{encode_png, export_png, render_static};
pub use item_renderer::{ItemRenderer, RenderStats};
pub use paint::Painter;
pub use particles::ParticleSystem;
pub use raster::Pixmap;
pub use texture::{Texture, TextureCache};
