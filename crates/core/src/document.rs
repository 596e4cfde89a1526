//! Collaborator seams: where page bitmaps and inserted-image bytes come from.

use crate::color::Color;
use crate::error::{EditError, Result};
use crate::transform::{PageSize, Zoom};
use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A read-only paginated document that can render its pages.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Page size in document units.
    fn page_size(&self, index: usize) -> Result<PageSize>;

    /// Render a page to an opaque RGB bitmap of `zoom.bitmap_size(page_size)` pixels.
    fn render_page(&self, index: usize, zoom: Zoom) -> Result<RgbImage>;

    fn page_sizes(&self) -> Result<Vec<PageSize>> {
        (0..self.page_count()).map(|i| self.page_size(i)).collect()
    }
}

/// Document made of in-memory bitmaps at native resolution (one pixel per unit).
///
/// Rendering at other zooms resamples the stored bitmap.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pages: Vec<RgbImage>,
}

impl MemoryDocument {
    pub fn new(pages: Vec<RgbImage>) -> Self {
        Self { pages }
    }

    /// `count` pages of `width x height` filled with one color.
    pub fn blank(count: usize, width: u32, height: u32, fill: Color) -> Self {
        let page = RgbImage::from_pixel(width, height, fill.to_rgb());
        Self {
            pages: vec![page; count],
        }
    }

    pub fn page(&self, index: usize) -> Option<&RgbImage> {
        self.pages.get(index)
    }

    pub fn page_mut(&mut self, index: usize) -> Option<&mut RgbImage> {
        self.pages.get_mut(index)
    }

    fn get(&self, index: usize) -> Result<&RgbImage> {
        self.pages.get(index).ok_or(EditError::InvalidPage {
            page: index,
            total: self.pages.len(),
        })
    }
}

impl PageSource for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let page = self.get(index)?;
        Ok(PageSize::new(page.width() as f32, page.height() as f32))
    }

    fn render_page(&self, index: usize, zoom: Zoom) -> Result<RgbImage> {
        let page = self.get(index)?;
        let (width, height) = zoom.bitmap_size(self.page_size(index)?);
        if (width, height) == page.dimensions() {
            return Ok(page.clone());
        }
        Ok(imageops::resize(page, width, height, imageops::FilterType::Nearest))
    }
}

/// Opaque handle to an uploaded asset (inserted images).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Resolves asset handles to encoded image bytes.
pub trait AssetResolver {
    fn load(&self, asset: &AssetRef) -> Result<Vec<u8>>;

    fn exists(&self, asset: &AssetRef) -> bool {
        self.load(asset).is_ok()
    }
}

/// Assets stored as files. Relative handles resolve under `root`; absolute handles
/// are used as-is.
#[derive(Debug, Clone)]
pub struct FileAssets {
    root: PathBuf,
}

impl FileAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, asset: &AssetRef) -> PathBuf {
        let path = Path::new(asset.as_str());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl AssetResolver for FileAssets {
    fn load(&self, asset: &AssetRef) -> Result<Vec<u8>> {
        let path = self.path_of(asset);
        std::fs::read(&path).map_err(|e| EditError::Asset {
            handle: asset.to_string(),
            message: format!("{}: {}", path.display(), e),
        })
    }

    fn exists(&self, asset: &AssetRef) -> bool {
        self.path_of(asset).is_file()
    }
}

/// Assets held in memory, keyed by handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    assets: HashMap<AssetRef, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: AssetRef, bytes: Vec<u8>) {
        self.assets.insert(asset, bytes);
    }

    pub fn remove(&mut self, asset: &AssetRef) -> Option<Vec<u8>> {
        self.assets.remove(asset)
    }
}

impl AssetResolver for MemoryAssets {
    fn load(&self, asset: &AssetRef) -> Result<Vec<u8>> {
        self.assets.get(asset).cloned().ok_or_else(|| EditError::Asset {
            handle: asset.to_string(),
            message: "not found".to_string(),
        })
    }

    fn exists(&self, asset: &AssetRef) -> bool {
        self.assets.contains_key(asset)
    }
}
