//! PNG export of the board.

use kurbo::Size;
use meetink_core::scene::{LayerKind, SceneGraph};

use crate::error::{RenderError, RenderResult};
use crate::paint::Painter;
use crate::raster::Pixmap;
use crate::texture::TextureCache;

/// Encode straight-alpha RGBA pixel data to PNG bytes.
pub fn encode_png(rgba_data: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    if rgba_data.len() != width as usize * height as usize * 4 {
        return Err(RenderError::BufferSize {
            width,
            height,
            len: rgba_data.len(),
        });
    }
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        writer
            .write_image_data(rgba_data)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        writer.finish().map_err(|e| RenderError::Encode(e.to_string()))?;
    }
    Ok(png_data)
}

/// Rasterize the static layer over the background at the scene's viewport and view.
pub fn render_static(scene: &SceneGraph, textures: &TextureCache) -> RenderResult<Pixmap> {
    let (width, height) = pixel_size(scene.viewport).ok_or(RenderError::Empty)?;
    let mut pixmap = Pixmap::new(width, height);
    pixmap.fill(scene.background);
    Painter::new(textures).paint_nodes(&mut pixmap, scene.layer(LayerKind::Static).nodes(), scene.view);
    Ok(pixmap)
}

/// Export the current board as PNG.
pub fn export_png(scene: &SceneGraph, textures: &TextureCache) -> RenderResult<Vec<u8>> {
    let pixmap = render_static(scene, textures)?;
    log::info!("Exporting board as {}x{} PNG", pixmap.width(), pixmap.height());
    encode_png(&pixmap.to_rgba8(), pixmap.width(), pixmap.height())
}

/// Whole-pixel size of a viewport, `None` when it has no area.
pub(crate) fn pixel_size(size: Size) -> Option<(u32, u32)> {
    if !(size.width.is_finite() && size.height.is_finite()) {
        return None;
    }
    let (w, h) = (size.width.ceil(), size.height.ceil());
    (w >= 1.0 && h >= 1.0).then(|| (w as u32, h as u32))
}
