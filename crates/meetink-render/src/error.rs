//! Renderer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Image decode failed: {0}")]
    Decode(String),
    #[error("Texture load failed for {url}: {reason}")]
    TextureLoad { url: String, reason: String },
    #[error("Pixel buffer of {len} bytes does not match {width}x{height}")]
    BufferSize { width: u32, height: u32, len: usize },
    #[error("PNG encode failed: {0}")]
    Encode(String),
    #[error("Nothing to export")]
    Empty,
}

pub type RenderResult<T> = Result<T, RenderError>;
