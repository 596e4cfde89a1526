//! PDF input and output through pdfium (Google's PDF engine).
//!
//! - [`PdfRenderer`] binds the pdfium library and opens documents.
//! - [`PdfiumDocument`] renders pages to RGB bitmaps ([`PageSource`]).
//! - [`PdfiumPageSink`] writes reconstructed pages into a new PDF ([`PageSink`]).

use crate::color::Color;
use crate::compositor::Compositor;
use crate::config::{PdfiumConfig, RenderConfig};
use crate::document::{AssetResolver, PageSource};
use crate::edits::EditState;
use crate::error::{EditError, Result};
use crate::reconstruct::{reconstruct_document, PageSink, ReconstructionReport};
use crate::transform::{PageRect, PageSize, Zoom};
use image::{imageops, DynamicImage, RgbImage, RgbaImage};
use pdfium_render::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Owner of the pdfium binding.
pub struct PdfRenderer {
    /// Pdfium library instance.
    pdfium: Pdfium,
    /// Render configuration.
    config: RenderConfig,
}

impl PdfRenderer {
    /// Bind pdfium, trying each configured directory before the system library.
    pub fn new(pdfium_config: &PdfiumConfig, config: RenderConfig) -> Result<Self> {
        config.validate()?;

        let bindings = pdfium_config
            .library_paths
            .iter()
            .find_map(|path| {
                let bound = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path.as_str())).ok();
                if bound.is_some() {
                    debug!("Bound pdfium from {}", path);
                }
                bound
            })
            .map(Ok)
            .unwrap_or_else(Pdfium::bind_to_system_library)
            .map_err(|e| EditError::Pdfium(format!("Failed to load pdfium library: {}", e)))?;

        info!("PDF renderer initialized");

        Ok(Self {
            pdfium: Pdfium::new(bindings),
            config,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Open a PDF file for rendering.
    pub fn open(&self, path: &Path) -> Result<PdfiumDocument<'_>> {
        let start = Instant::now();
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| EditError::DocumentLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!(
            "Loaded {:?} ({} pages) in {:?}",
            path,
            document.pages().len(),
            start.elapsed()
        );
        Ok(PdfiumDocument {
            document,
            background: Color::from(self.config.background_color),
        })
    }

    /// Open a PDF held in memory.
    pub fn open_bytes(&self, bytes: Vec<u8>) -> Result<PdfiumDocument<'_>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|e| EditError::DocumentLoad {
                path: "<memory>".into(),
                message: e.to_string(),
            })?;
        Ok(PdfiumDocument {
            document,
            background: Color::from(self.config.background_color),
        })
    }

    /// Start an empty output document fed from `source`.
    pub fn create_sink<'s, 'a>(&'a self, source: &'s PdfiumDocument<'a>) -> Result<PdfiumPageSink<'s, 'a>> {
        let output = self
            .pdfium
            .create_new_pdf()
            .map_err(|e| EditError::Pdfium(format!("Failed to create document: {}", e)))?;
        Ok(PdfiumPageSink {
            source: &source.document,
            output,
            current: None,
        })
    }
}

/// A loaded PDF.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    background: Color,
}

impl<'a> PdfiumDocument<'a> {
    pub fn inner(&self) -> &PdfDocument<'a> {
        &self.document
    }

    fn page(&self, index: usize) -> Result<PdfPage<'_>> {
        let total = self.page_count();
        let page_index = PdfPageIndex::try_from(index)
            .ok()
            .filter(|_| index < total)
            .ok_or(EditError::InvalidPage { page: index, total })?;
        self.document
            .pages()
            .get(page_index)
            .map_err(|e| EditError::Render(format!("Failed to get page {}: {}", index + 1, e)))
    }
}

impl PageSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize> {
        let page = self.page(index)?;
        Ok(PageSize::new(page.width().value, page.height().value))
    }

    fn render_page(&self, index: usize, zoom: Zoom) -> Result<RgbImage> {
        let page = self.page(index)?;
        let size = PageSize::new(page.width().value, page.height().value);
        let (width, height) = zoom.bitmap_size(size);

        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            EditError::Render(format!("Failed to render page {}: {}", index + 1, e))
        })?;

        let rgba: RgbaImage = bitmap.as_image().into_rgba8();
        let mut image = flatten(&rgba, self.background);
        if image.dimensions() != (width, height) {
            image = imageops::resize(&image, width, height, imageops::FilterType::Triangle);
        }
        Ok(image)
    }
}

/// Blend transparent areas onto the background color.
fn flatten(image: &RgbaImage, background: Color) -> RgbImage {
    let bg = [background.r as u32, background.g as u32, background.b as u32];
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        let alpha = pixel[3] as u32;
        let blend = |c: usize| ((pixel[c] as u32 * alpha + bg[c] * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([blend(0), blend(1), blend(2)])
    })
}

/// Writes reconstructed pages into a new PDF.
pub struct PdfiumPageSink<'s, 'a> {
    source: &'s PdfDocument<'a>,
    output: PdfDocument<'a>,
    /// The vector page being drawn on.
    current: Option<VectorPage>,
}

/// Where the displayed (rotated, cropped) page sits in PDF user space.
#[derive(Debug, Clone, Copy)]
struct VectorPage {
    index: PdfPageIndex,
    bounds: PdfRect,
    rotation: PdfPageRenderRotation,
}

/// Map a top-left-origin rectangle on the displayed page into PDF user space.
///
/// `bounds` is the unrotated display box and `rotation` the page's clockwise
/// `/Rotate` value, as pdfium applies them when rendering.
fn display_to_user(rect: PageRect, bounds: PdfRect, rotation: PdfPageRenderRotation) -> PdfRect {
    let (left, bottom) = (bounds.left().value, bounds.bottom().value);
    let (right, top) = (bounds.right().value, bounds.top().value);
    let map = |u: f32, v: f32| match rotation {
        PdfPageRenderRotation::None => (left + u, top - v),
        PdfPageRenderRotation::Degrees90 => (left + v, bottom + u),
        PdfPageRenderRotation::Degrees180 => (right - u, bottom + v),
        PdfPageRenderRotation::Degrees270 => (right - v, top - u),
    };
    let (ax, ay) = map(rect.x1, rect.y1);
    let (bx, by) = map(rect.x2, rect.y2);
    PdfRect::new_from_values(ay.min(by), ax.min(bx), ay.max(by), ax.max(bx))
}

impl PdfiumPageSink<'_, '_> {
    fn next_index(&self) -> Result<PdfPageIndex> {
        let len = self.output.pages().len() as usize;
        PdfPageIndex::try_from(len).map_err(|_| EditError::Pdfium("too many pages".to_string()))
    }

    pub fn page_count(&self) -> usize {
        self.output.pages().len() as usize
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.output.save_to_file(path).map_err(|e| EditError::DocumentSave {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        info!("Saved {} pages to {:?}", self.page_count(), path);
        Ok(())
    }

    pub fn save_to_bytes(&self) -> Result<Vec<u8>> {
        self.output.save_to_bytes().map_err(|e| EditError::DocumentSave {
            path: "<memory>".into(),
            message: e.to_string(),
        })
    }
}

impl PageSink for PdfiumPageSink<'_, '_> {
    fn begin_vector_page(&mut self, source_index: usize, _size: PageSize) -> Result<()> {
        let source_index = PdfPageIndex::try_from(source_index)
            .map_err(|_| EditError::Pdfium(format!("page index {} out of range", source_index)))?;
        let destination = self.next_index()?;
        self.output
            .pages_mut()
            .copy_page_from_document(self.source, source_index, destination)
            .map_err(|e| EditError::Pdfium(format!("Failed to import page: {}", e)))?;

        let page = self
            .output
            .pages()
            .get(destination)
            .map_err(|e| EditError::Pdfium(e.to_string()))?;
        let bounds = page
            .boundaries()
            .bounding()
            .map_err(|e| EditError::Pdfium(format!("Failed to read page box: {}", e)))?
            .bounds;
        let rotation = page
            .rotation()
            .map_err(|e| EditError::Pdfium(format!("Failed to read page rotation: {}", e)))?;
        debug!(
            "Imported page {} (box {:?}, rotation {:?})",
            source_index, bounds, rotation
        );
        self.current = Some(VectorPage {
            index: destination,
            bounds,
            rotation,
        });
        Ok(())
    }

    fn fill_rect(&mut self, rect: PageRect, color: Color) -> Result<()> {
        let target = self
            .current
            .ok_or_else(|| EditError::Pdfium("no vector page started".to_string()))?;
        let mut page = self
            .output
            .pages()
            .get(target.index)
            .map_err(|e| EditError::Pdfium(e.to_string()))?;

        let bounds = display_to_user(rect, target.bounds, target.rotation);
        page.objects_mut()
            .create_path_object_rect(bounds, None, None, Some(PdfColor::new(color.r, color.g, color.b, 255)))
            .map_err(|e| EditError::Pdfium(format!("Failed to draw rectangle: {}", e)))?;
        Ok(())
    }

    fn raster_page(&mut self, size: PageSize, image: &RgbImage) -> Result<()> {
        self.current = None;
        let mut page = self
            .output
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(size.width),
                PdfPoints::new(size.height),
            ))
            .map_err(|e| EditError::Pdfium(format!("Failed to create page: {}", e)))?;

        let image = DynamicImage::ImageRgb8(image.clone());
        page.objects_mut()
            .create_image_object(
                PdfPoints::ZERO,
                PdfPoints::ZERO,
                &image,
                Some(PdfPoints::new(size.width)),
                Some(PdfPoints::new(size.height)),
            )
            .map_err(|e| EditError::Pdfium(format!("Failed to embed page image: {}", e)))?;
        Ok(())
    }
}

/// Load `source_path`, rebuild every page with its edits, and write `output_path`.
pub fn save_edited_pdf(
    renderer: &PdfRenderer,
    compositor: &Compositor,
    source_path: &Path,
    state: &EditState,
    assets: &dyn AssetResolver,
    output_path: &Path,
) -> Result<ReconstructionReport> {
    let document = renderer.open(source_path)?;
    let mut sink = renderer.create_sink(&document)?;
    let report = reconstruct_document(&document, state, compositor, assets, &mut sink)?;
    sink.save_to_file(output_path)?;
    Ok(report)
}
