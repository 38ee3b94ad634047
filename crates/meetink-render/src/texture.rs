//! Texture cache with host-driven asynchronous loading.
//!
//! The renderer never fetches anything itself. Referencing an unknown URL queues a load
//! request; the host fetches the bytes and reports back through [`TextureCache::complete`].
//! Until then the node draws a placeholder.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use meetink_core::scene::TextureState;

use crate::error::{RenderError, RenderResult};

/// Decoded premultiplied RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Texture {
    /// Build from straight-alpha RGBA8 bytes.
    pub fn from_rgba8(width: u32, height: u32, mut rgba: Vec<u8>) -> RenderResult<Self> {
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(RenderError::BufferSize {
                width,
                height,
                len: rgba.len(),
            });
        }
        for px in rgba.chunks_exact_mut(4) {
            let a = px[3] as u32;
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
        Ok(Self {
            width,
            height,
            pixels: rgba,
        })
    }

    /// Decode an encoded image (PNG, JPEG or WebP).
    pub fn decode(bytes: &[u8]) -> RenderResult<Self> {
        let decoded = image::load_from_memory(bytes).map_err(|e| RenderError::Decode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied pixel. Coordinates outside the texture read as transparent.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Pending,
    Ready(Arc<Texture>),
    Failed,
}

#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, Entry>,
    requests: VecDeque<String>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `url`, queueing a load the first time it is seen.
    pub fn request(&mut self, url: &str) -> TextureState {
        match self.entries.get(url) {
            Some(entry) => state_of(entry),
            None => {
                log::debug!("Queueing texture load: {url}");
                self.entries.insert(url.to_string(), Entry::Pending);
                self.requests.push_back(url.to_string());
                TextureState::Pending
            }
        }
    }

    pub fn state(&self, url: &str) -> Option<TextureState> {
        self.entries.get(url).map(state_of)
    }

    pub fn get(&self, url: &str) -> Option<&Texture> {
        match self.entries.get(url) {
            Some(Entry::Ready(texture)) => Some(texture.as_ref()),
            _ => None,
        }
    }

    /// URLs waiting to be fetched by the host, oldest first.
    pub fn take_requests(&mut self) -> Vec<String> {
        self.requests.drain(..).collect()
    }

    /// Record the outcome of a load.
    ///
    /// Results for URLs that are no longer referenced are dropped. Fetch and decode failures
    /// leave a failed entry so the placeholder stays up, and are returned for logging.
    pub fn complete(&mut self, url: &str, result: Result<Vec<u8>, String>) -> RenderResult<TextureState> {
        if !self.entries.contains_key(url) {
            log::debug!("Dropping texture for unreferenced {url}");
            return Ok(TextureState::Pending);
        }
        let decoded = result
            .map_err(|reason| RenderError::TextureLoad {
                url: url.to_string(),
                reason,
            })
            .and_then(|bytes| Texture::decode(&bytes));
        match decoded {
            Ok(texture) => {
                log::debug!("Texture ready: {url} ({}x{})", texture.width, texture.height);
                self.entries.insert(url.to_string(), Entry::Ready(Arc::new(texture)));
                Ok(TextureState::Ready)
            }
            Err(e) => {
                log::warn!("Texture load failed for {url}: {e}");
                self.entries.insert(url.to_string(), Entry::Failed);
                Err(e)
            }
        }
    }

    /// Insert an already decoded texture.
    pub fn insert(&mut self, url: impl Into<String>, texture: Texture) {
        self.entries.insert(url.into(), Entry::Ready(Arc::new(texture)));
    }

    /// Forget every URL not in `referenced`, including pending requests.
    pub fn retain_referenced(&mut self, referenced: &HashSet<String>) {
        self.entries.retain(|url, _| referenced.contains(url));
        self.requests.retain(|url| referenced.contains(url));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn state_of(entry: &Entry) -> TextureState {
    match entry {
        Entry::Pending => TextureState::Pending,
        Entry::Ready(_) => TextureState::Ready,
        Entry::Failed => TextureState::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let rgba = vec![255, 0, 0, 255, 0, 255, 0, 128, 0, 0, 255, 0, 255, 255, 255, 255];
        crate::export::encode_png(&rgba, 2, 2).unwrap()
    }

    #[test]
    fn test_request_queues_once() {
        let mut cache = TextureCache::new();
        assert_eq!(cache.request("a.png"), TextureState::Pending);
        assert_eq!(cache.request("a.png"), TextureState::Pending);
        assert_eq!(cache.take_requests(), vec!["a.png".to_string()]);
        assert!(cache.take_requests().is_empty());
    }

    #[test]
    fn test_complete_decodes_png() {
        let mut cache = TextureCache::new();
        cache.request("a.png");
        assert_eq!(cache.complete("a.png", Ok(png_bytes())).unwrap(), TextureState::Ready);
        let texture = cache.get("a.png").unwrap();
        assert_eq!((texture.width(), texture.height()), (2, 2));
        assert_eq!(texture.pixel(0, 0), [255, 0, 0, 255]);
        // Premultiplied half-transparent green
        assert_eq!(texture.pixel(1, 0), [0, 128, 0, 128]);
        assert_eq!(texture.pixel(5, 5), [0; 4]);
    }

    #[test]
    fn test_failed_load_keeps_placeholder() {
        let mut cache = TextureCache::new();
        cache.request("bad.png");
        assert!(cache.complete("bad.png", Ok(vec![1, 2, 3])).is_err());
        assert_eq!(cache.state("bad.png"), Some(TextureState::Failed));
        assert!(cache.complete("gone.png", Err("404".into())).is_ok());
        assert_eq!(cache.state("gone.png"), None);
    }

    #[test]
    fn test_fetch_error_is_reported() {
        let mut cache = TextureCache::new();
        cache.request("a.png");
        let err = cache.complete("a.png", Err("timeout".into())).unwrap_err();
        assert!(matches!(err, RenderError::TextureLoad { .. }));
    }

    #[test]
    fn test_retain_referenced() {
        let mut cache = TextureCache::new();
        cache.request("keep.png");
        cache.request("drop.png");
        let keep: HashSet<String> = ["keep.png".to_string()].into();
        cache.retain_referenced(&keep);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take_requests(), vec!["keep.png".to_string()]);
    }

    #[test]
    fn test_from_rgba8_checks_length() {
        assert!(Texture::from_rgba8(2, 2, vec![0; 3]).is_err());
    }
}
