//! Composited page bitmaps, keyed by page and zoom and tagged with the edit
//! generation they were built from.

use crate::transform::Zoom;
use image::RgbImage;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    image: Arc<RgbImage>,
}

/// At most one bitmap per (page, zoom). An entry older than the requested
/// generation is evicted on lookup.
///
/// Bitmaps are handed out as `Arc` so callers cannot mutate cached pixels.
#[derive(Debug, Default)]
pub struct PageBitmapCache {
    entries: HashMap<(usize, u32), Entry>,
    hits: u64,
    misses: u64,
}

impl PageBitmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, page: usize, zoom: Zoom, generation: u64) -> Option<Arc<RgbImage>> {
        let key = (page, zoom.key());
        match self.entries.get(&key) {
            Some(entry) if entry.generation == generation => {
                self.hits += 1;
                trace!("Cache hit for page {} at zoom {}", page, zoom.value());
                Some(Arc::clone(&entry.image))
            }
            Some(_) => {
                self.entries.remove(&key);
                self.misses += 1;
                trace!("Evicted stale bitmap for page {} at zoom {}", page, zoom.value());
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a bitmap unless a newer generation is already cached for the key.
    pub fn insert(&mut self, page: usize, zoom: Zoom, generation: u64, image: Arc<RgbImage>) {
        let key = (page, zoom.key());
        if let Some(existing) = self.entries.get(&key) {
            if existing.generation > generation {
                return;
            }
        }
        self.entries.insert(key, Entry { generation, image });
    }

    /// Return the cached bitmap or build, store and return a new one.
    pub fn get_or_insert_with<E>(
        &mut self,
        page: usize,
        zoom: Zoom,
        generation: u64,
        build: impl FnOnce() -> Result<RgbImage, E>,
    ) -> Result<Arc<RgbImage>, E> {
        if let Some(image) = self.get(page, zoom, generation) {
            return Ok(image);
        }
        let image = Arc::new(build()?);
        self.insert(page, zoom, generation, Arc::clone(&image));
        Ok(image)
    }

    /// Drop every zoom level of one page.
    pub fn invalidate_page(&mut self, page: usize) {
        self.entries.retain(|(p, _), _| *p != page);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
