//! Raster compositor: paints the edit layers of one page onto a rendered bitmap.
//!
//! Layers are applied in a fixed order, later ones overwriting earlier pixels:
//! 1. deletions (opaque white)
//! 2. area recolors (opaque target color)
//! 3. global substitutions (whole-bitmap scan, sequential and compounding)
//! 4. inserted content, in flat-list order
//!
//! The base bitmap is never modified and the output depends only on its inputs.

use crate::color::Color;
use crate::config::CompositorConfig;
use crate::document::{AssetResolver, PageSource};
use crate::edits::{ContentKind, EditKind, EditState, ImageContent, TextContent, MAX_CONTENT_PAGE_RATIO};
use crate::error::{EditError, Result};
use crate::fonts::FontChain;
use crate::outcome::{EditOutcome, EditStatus, PageReport, SkipReason};
use crate::transform::{PagePoint, PageRect, PixelPoint, PixelRect, Zoom};
use ab_glyph::{Font, ScaleFont};
use image::{imageops, RgbImage, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// A composited page bitmap and what happened to each edit.
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: RgbImage,
    pub report: PageReport,
}

/// Paints edit layers onto page bitmaps.
pub struct Compositor {
    /// Font used for inserted text.
    fonts: FontChain,
    /// Rayon thread pool for the substitution scan.
    thread_pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("fonts", &self.fonts)
            .field("threads", &self.thread_pool.current_num_threads())
            .finish()
    }
}

impl Compositor {
    /// Create a new compositor.
    pub fn new(config: &CompositorConfig) -> Result<Self> {
        config.validate()?;

        let fonts = FontChain::load(&config.fonts)?;

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| EditError::InvalidConfig(format!("Failed to create thread pool: {}", e)))?;

        debug!(
            "Compositor initialized with {} threads, font {:?}",
            config.threads,
            fonts.origin()
        );

        Ok(Self { fonts, thread_pool })
    }

    pub fn fonts(&self) -> &FontChain {
        &self.fonts
    }

    /// Render a page and paint its edits on top.
    pub fn render_and_composite<D: PageSource + ?Sized>(
        &self,
        document: &D,
        page: usize,
        zoom: Zoom,
        state: &EditState,
        assets: &dyn AssetResolver,
    ) -> Result<Composite> {
        if document.page_count() != state.page_count() {
            return Err(EditError::InvalidArgument(format!(
                "edit state has {} pages but document has {}",
                state.page_count(),
                document.page_count()
            )));
        }
        let base = document.render_page(page, zoom)?;
        self.composite(&base, page, zoom, state, assets)
    }

    /// Paint the edits of `page` onto a copy of `base`, which was rendered at `zoom`.
    pub fn composite(
        &self,
        base: &RgbImage,
        page: usize,
        zoom: Zoom,
        state: &EditState,
        assets: &dyn AssetResolver,
    ) -> Result<Composite> {
        let start = Instant::now();
        let edits = state.page_edits(page)?;
        let mut image = base.clone();
        let mut report = PageReport::default();

        for (index, rect) in edits.deletions.iter().enumerate() {
            let outcome = match fill_page_rect(&mut image, rect, zoom, Color::WHITE) {
                Ok(()) => EditOutcome::applied(EditKind::Deletion, index),
                Err(reason) => EditOutcome::skipped(EditKind::Deletion, index, reason),
            };
            report.push(outcome);
        }

        for (index, recolor) in edits.area_recolors.iter().enumerate() {
            let result = decode(&recolor.target_color)
                .and_then(|color| fill_page_rect(&mut image, &recolor.rect, zoom, color));
            report.push(match result {
                Ok(()) => EditOutcome::applied(EditKind::AreaRecolor, index),
                Err(reason) => EditOutcome::skipped(EditKind::AreaRecolor, index, reason),
            });
        }

        for (index, sub) in edits.global_substitutions.iter().enumerate() {
            let colors = decode(&sub.source_color).and_then(|s| Ok((s, decode(&sub.target_color)?)));
            report.push(match colors {
                Ok((source, target)) => {
                    let changed = self.substitute(&mut image, source, target, sub.tolerance);
                    debug!(
                        "Substitution {} -> {} changed {} pixels on page {}",
                        source, target, changed, page
                    );
                    EditOutcome::applied(EditKind::GlobalSubstitution, index)
                }
                Err(reason) => EditOutcome::skipped(EditKind::GlobalSubstitution, index, reason),
            });
        }

        for (index, content) in state.content_for_page(page) {
            let at = PagePoint {
                x: content.x,
                y: content.y,
            };
            let result = match &content.kind {
                ContentKind::Text(text) => self.draw_text(&mut image, text, at, zoom),
                ContentKind::Image(img) => paste_image(&mut image, img, at, zoom, assets),
            };
            report.push(match result {
                Ok(()) => EditOutcome::applied(EditKind::InsertedContent, index),
                Err(reason) => EditOutcome::skipped(EditKind::InsertedContent, index, reason),
            });
        }

        for skipped in report.skipped() {
            if let EditStatus::Skipped(reason) = &skipped.status {
                warn!(
                    "Skipped {} #{} on page {}: {}",
                    skipped.kind.as_str(),
                    skipped.index,
                    page,
                    reason
                );
            }
        }

        debug!(
            "Composited page {} at zoom {} ({} edits) in {:?}",
            page,
            zoom.value(),
            report.outcomes.len(),
            start.elapsed()
        );

        Ok(Composite { image, report })
    }

    /// Replace every pixel within `tolerance` of `source` by `target`.
    /// Returns the number of pixels changed.
    pub fn substitute(&self, image: &mut RgbImage, source: Color, target: Color, tolerance: u32) -> usize {
        let limit = tolerance.saturating_mul(tolerance);
        let replacement = [target.r, target.g, target.b];
        let pixels: &mut [u8] = image;

        self.thread_pool.install(|| {
            pixels
                .par_chunks_exact_mut(3)
                .map(|px| {
                    let color = Color::new(px[0], px[1], px[2]);
                    if color.distance_squared(&source) <= limit {
                        px.copy_from_slice(&replacement);
                        1usize
                    } else {
                        0
                    }
                })
                .sum()
        })
    }

    fn draw_text(
        &self,
        image: &mut RgbImage,
        text: &TextContent,
        at: PagePoint,
        zoom: Zoom,
    ) -> std::result::Result<(), SkipReason> {
        let color = decode(&text.color)?;
        let origin = zoom.to_pixel(at);
        let em = zoom.scale(text.font_size_pt);
        if em > oversize_limit(image) as f32 {
            return Err(SkipReason::Oversized {
                width: em as u32,
                height: em as u32,
            });
        }
        let scale = self.fonts.scale_for_em(em);
        let font = self.fonts.font();
        let line_advance = {
            let scaled = font.as_scaled(scale);
            scaled.height() + scaled.line_gap()
        };

        for (line_no, line) in text.text.lines().enumerate() {
            let y = origin.y + line_advance * line_no as f32;
            draw_text_mut(
                image,
                color.to_rgb(),
                origin.x as i32,
                y as i32,
                scale,
                font,
                line,
            );
        }
        Ok(())
    }
}

/// Largest text em or image side, in pixels, drawn onto `image`.
fn oversize_limit(image: &RgbImage) -> u32 {
    (MAX_CONTENT_PAGE_RATIO * image.width().max(image.height()) as f32) as u32
}

fn decode(hex: &str) -> std::result::Result<Color, SkipReason> {
    Color::from_hex(hex).map_err(|_| SkipReason::InvalidColor(hex.to_string()))
}

/// Fill a page-space rectangle, scaled to `zoom` and clamped to the bitmap.
fn fill_page_rect(
    image: &mut RgbImage,
    rect: &PageRect,
    zoom: Zoom,
    color: Color,
) -> std::result::Result<(), SkipReason> {
    let px = zoom.to_pixel_rect(rect, image.width(), image.height());
    if px.is_degenerate() {
        return Err(SkipReason::DegenerateRect);
    }
    let area = imageproc::rect::Rect::at(px.x1 as i32, px.y1 as i32).of_size(px.width(), px.height());
    draw_filled_rect_mut(image, area, color.to_rgb());
    Ok(())
}

/// Output size of an inserted image, in page units.
///
/// Both requested dimensions set: used as-is. One set: the other follows the
/// source aspect ratio (truncated). Neither set: the source size.
pub fn target_dimensions(source_width: u32, source_height: u32, width: u32, height: u32) -> (u32, u32) {
    match (width, height) {
        (0, 0) => (source_width, source_height),
        (w, 0) if source_width > 0 => (w, (source_height as f64 * w as f64 / source_width as f64) as u32),
        (0, h) if source_height > 0 => ((source_width as f64 * h as f64 / source_height as f64) as u32, h),
        (w, h) => (w, h),
    }
}

fn paste_image(
    image: &mut RgbImage,
    content: &ImageContent,
    at: PagePoint,
    zoom: Zoom,
    assets: &dyn AssetResolver,
) -> std::result::Result<(), SkipReason> {
    let bytes = assets
        .load(&content.source_ref)
        .map_err(|e| SkipReason::AssetUnavailable(e.to_string()))?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| SkipReason::ImageDecode(e.to_string()))?;

    let (width, height) = target_dimensions(decoded.width(), decoded.height(), content.width, content.height);
    let width = zoom.scale(width as f32) as u32;
    let height = zoom.scale(height as f32) as u32;
    if width == 0 || height == 0 {
        return Err(SkipReason::EmptyImage);
    }
    let limit = oversize_limit(image);
    if width > limit || height > limit {
        return Err(SkipReason::Oversized { width, height });
    }

    let origin = zoom.to_pixel(at);
    let (x, y) = (origin.x as i64, origin.y as i64);

    if decoded.color().has_alpha() {
        let overlay = resized(decoded.to_rgba8(), width, height);
        blend(image, &overlay, x, y);
    } else {
        let overlay = resized(decoded.to_rgb8(), width, height);
        imageops::replace(image, &overlay, x, y);
    }
    Ok(())
}

fn resized<P>(img: image::ImageBuffer<P, Vec<u8>>, width: u32, height: u32) -> image::ImageBuffer<P, Vec<u8>>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, imageops::FilterType::Lanczos3)
    }
}

/// Alpha-blend an RGBA overlay onto an opaque bitmap, clipped to its bounds.
fn blend(image: &mut RgbImage, overlay: &RgbaImage, x: i64, y: i64) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    for (ox, oy, src) in overlay.enumerate_pixels() {
        let (tx, ty) = (x + ox as i64, y + oy as i64);
        if tx < 0 || ty < 0 || tx >= width || ty >= height {
            continue;
        }
        let alpha = src[3] as u32;
        if alpha == 0 {
            continue;
        }
        let dst = image.get_pixel_mut(tx as u32, ty as u32);
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * alpha + dst[c] as u32 * (255 - alpha) + 127) / 255) as u8;
        }
    }
}

/// Most frequent color in a pixel region; ties go to the color seen first
/// in row-major order. `None` when the region is empty.
pub fn dominant_color(image: &RgbImage, region: PixelRect) -> Option<Color> {
    let x2 = region.x2.min(image.width());
    let y2 = region.y2.min(image.height());
    let mut counts: HashMap<[u8; 3], (usize, usize)> = HashMap::new();
    let mut seen = 0;
    for y in region.y1..y2 {
        for x in region.x1..x2 {
            let px = image.get_pixel(x, y).0;
            let entry = counts.entry(px).or_insert((0, seen));
            entry.0 += 1;
            seen += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(px, _)| Color::new(px[0], px[1], px[2]))
}

/// Color of the pixel under a pixel-space point, clamped to the bitmap.
pub fn sample_pixel(image: &RgbImage, point: PixelPoint) -> Option<Color> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }
    let x = (point.x.max(0.0) as u32).min(image.width() - 1);
    let y = (point.y.max(0.0) as u32).min(image.height() - 1);
    Some(Color::from_rgb(image.get_pixel(x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontConfig;
    use crate::document::{AssetRef, MemoryAssets};
    use crate::edits::InsertedContent;
    use crate::transform::PageSize;
    use image::{Rgb, Rgba};
    use std::io::Cursor;

    fn compositor() -> Compositor {
        Compositor::new(
            &CompositorConfig::default()
                .threads(2)
                .fonts(FontConfig::embedded_only()),
        )
        .unwrap()
    }

    fn state(width: f32, height: f32) -> EditState {
        EditState::new([PageSize::new(width, height)], Color::new(0, 0, 255))
    }

    fn png_bytes(img: image::DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_deletion_whitens_exact_region() {
        let base = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
        let mut s = state(200.0, 200.0);
        s.add_deletion(0, PageRect::new(10.0, 10.0, 100.0, 100.0)).unwrap();

        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        let white = out.image.pixels().filter(|p| **p == Rgb([255, 255, 255])).count();
        assert_eq!(white, 90 * 90);
        assert_eq!(out.image.get_pixel(10, 10), &Rgb([255, 255, 255]));
        assert_eq!(out.image.get_pixel(99, 99), &Rgb([255, 255, 255]));
        assert_eq!(out.image.get_pixel(100, 100), &Rgb([0, 0, 0]));
        // base untouched
        assert!(base.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_deletion_scales_with_zoom() {
        let base = RgbImage::from_pixel(400, 400, Rgb([0, 0, 0]));
        let mut s = state(200.0, 200.0);
        s.add_deletion(0, PageRect::new(10.0, 10.0, 20.0, 20.0)).unwrap();
        let out = compositor()
            .composite(&base, 0, Zoom::new(2.0).unwrap(), &s, &MemoryAssets::new())
            .unwrap();
        let white = out.image.pixels().filter(|p| **p == Rgb([255, 255, 255])).count();
        assert_eq!(white, 20 * 20);
    }

    #[test]
    fn test_subpixel_rect_is_skipped_at_low_zoom() {
        let base = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let mut s = state(100.0, 100.0);
        s.add_deletion(0, PageRect::new(10.0, 10.0, 12.0, 12.0)).unwrap();
        let out = compositor()
            .composite(&base, 0, Zoom::new(0.2).unwrap(), &s, &MemoryAssets::new())
            .unwrap();
        assert_eq!(out.image, base);
        assert_eq!(
            out.report.outcomes[0].status,
            EditStatus::Skipped(SkipReason::DegenerateRect)
        );
    }

    #[test]
    fn test_malformed_recolor_is_skipped_not_fatal() {
        let base = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let mut s = state(50.0, 50.0);
        s.add_area_recolor(0, PageRect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK, Some(Color::new(255, 0, 0)))
            .unwrap();
        s.add_area_recolor(0, PageRect::new(20.0, 20.0, 30.0, 30.0), Color::BLACK, None)
            .unwrap();
        s.record_mut(0).unwrap().edits.area_recolors[1].target_color = "#12345z".to_string();

        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        assert_eq!(out.image.get_pixel(5, 5), &Rgb([255, 0, 0]));
        assert_eq!(out.image.get_pixel(25, 25), &Rgb([0, 0, 0]));
        assert_eq!(out.report.applied_count(), 1);
    }

    #[test]
    fn test_recolor_paints_over_deletion() {
        let base = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let mut s = state(50.0, 50.0);
        s.add_area_recolor(0, PageRect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK, Some(Color::new(0, 255, 0)))
            .unwrap();
        s.add_deletion(0, PageRect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        assert_eq!(out.image.get_pixel(3, 3), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_tolerance_boundary() {
        let mut base = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        base.put_pixel(0, 0, Rgb([225, 0, 0])); // distance 30
        base.put_pixel(1, 0, Rgb([224, 0, 0])); // distance 31
        base.put_pixel(2, 0, Rgb([255, 0, 0]));
        let mut s = state(3.0, 1.0);
        s.add_global_substitution(0, Color::new(255, 0, 0), Color::new(0, 255, 0), 30)
            .unwrap();

        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        assert_eq!(out.image.get_pixel(0, 0), &Rgb([0, 255, 0]));
        assert_eq!(out.image.get_pixel(1, 0), &Rgb([224, 0, 0]));
        assert_eq!(out.image.get_pixel(2, 0), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_substitutions_compound() {
        let base = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        let mut s = state(4.0, 4.0);
        s.add_global_substitution(0, Color::new(255, 0, 0), Color::new(0, 255, 0), 0)
            .unwrap();
        s.add_global_substitution(0, Color::new(0, 255, 0), Color::new(0, 0, 255), 0)
            .unwrap();
        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        assert!(out.image.pixels().all(|p| *p == Rgb([0, 0, 255])));
    }

    #[test]
    fn test_substitution_affects_deleted_area() {
        let base = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let mut s = state(10.0, 10.0);
        s.add_deletion(0, PageRect::new(0.0, 0.0, 5.0, 10.0)).unwrap();
        s.add_global_substitution(0, Color::WHITE, Color::new(9, 9, 9), 0).unwrap();
        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        assert_eq!(out.image.get_pixel(2, 2), &Rgb([9, 9, 9]));
        assert_eq!(out.image.get_pixel(7, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_composition_is_idempotent() {
        let mut base = RgbImage::new(120, 80);
        for (x, y, p) in base.enumerate_pixels_mut() {
            *p = Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8]);
        }
        let mut s = state(120.0, 80.0);
        s.add_deletion(0, PageRect::new(5.0, 5.0, 30.0, 30.0)).unwrap();
        s.add_global_substitution(0, Color::new(100, 100, 100), Color::new(1, 2, 3), 60)
            .unwrap();
        s.add_inserted_content(InsertedContent::text(0, 40.0, 40.0, "Approved\nby QA", 14.0, Color::new(200, 0, 0)))
            .unwrap();

        let c = compositor();
        let assets = MemoryAssets::new();
        let first = c.composite(&base, 0, Zoom::NATIVE, &s, &assets).unwrap();
        let second = c.composite(&base, 0, Zoom::NATIVE, &s, &assets).unwrap();
        assert_eq!(first.image.as_raw(), second.image.as_raw());
        assert_eq!(first.report, second.report);
    }

    #[test]
    fn test_text_changes_pixels_near_anchor() {
        let base = RgbImage::from_pixel(200, 60, Rgb([255, 255, 255]));
        let mut s = state(200.0, 60.0);
        s.add_inserted_content(InsertedContent::text(0, 10.0, 10.0, "HELLO", 20.0, Color::BLACK))
            .unwrap();
        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        assert_eq!(out.report.applied_count(), 1);
        let inked = out.image.pixels().filter(|p| **p != Rgb([255, 255, 255])).count();
        assert!(inked > 0);
        // nothing drawn above/left of the anchor
        for y in 0..10 {
            for x in 0..200 {
                assert_eq!(out.image.get_pixel(x, y), &Rgb([255, 255, 255]));
            }
        }
    }

    #[test]
    fn test_image_paste_opaque_and_resized() {
        let mut assets = MemoryAssets::new();
        let logo = RgbImage::from_pixel(10, 20, Rgb([0, 128, 0]));
        assets.insert(AssetRef::new("logo"), png_bytes(image::DynamicImage::ImageRgb8(logo)));

        let base = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let mut s = state(100.0, 100.0);
        // width 20 -> height derived as 40
        s.add_inserted_content(InsertedContent::image(0, 5.0, 5.0, AssetRef::new("logo"), 20, 0))
            .unwrap();
        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &assets).unwrap();
        assert_eq!(out.image.get_pixel(5, 5), &Rgb([0, 128, 0]));
        assert_eq!(out.image.get_pixel(24, 44), &Rgb([0, 128, 0]));
        assert_eq!(out.image.get_pixel(25, 5), &Rgb([255, 255, 255]));
        assert_eq!(out.image.get_pixel(5, 45), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_image_paste_blends_alpha() {
        let mut assets = MemoryAssets::new();
        let mut stamp = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        stamp.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        stamp.put_pixel(1, 0, Rgba([0, 0, 0, 128]));
        assets.insert(AssetRef::new("stamp"), png_bytes(image::DynamicImage::ImageRgba8(stamp)));

        let base = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let mut s = state(10.0, 10.0);
        s.add_inserted_content(InsertedContent::image(0, 2.0, 2.0, AssetRef::new("stamp"), 0, 0))
            .unwrap();
        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &assets).unwrap();
        assert_eq!(out.image.get_pixel(2, 2), &Rgb([0, 0, 0]));
        assert_eq!(out.image.get_pixel(3, 2), &Rgb([127, 127, 127]));
        assert_eq!(out.image.get_pixel(4, 2), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_missing_image_skips_only_that_item() {
        let base = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        let mut s = state(50.0, 50.0);
        s.add_inserted_content(InsertedContent::image(0, 1.0, 1.0, AssetRef::new("gone"), 0, 0))
            .unwrap();
        s.add_deletion(0, PageRect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        s.add_inserted_content(InsertedContent::text(0, 10.0, 10.0, "ok", 12.0, Color::BLACK))
            .unwrap();
        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        let skipped: Vec<_> = out.report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(
            skipped[0].status,
            EditStatus::Skipped(SkipReason::AssetUnavailable(_))
        ));
        assert_eq!(out.report.applied_count(), 2);
    }

    #[test]
    fn test_huge_text_is_skipped_not_drawn() {
        let base = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let mut s = state(100.0, 100.0);
        s.content_mut()
            .push(InsertedContent::text(0, 1.0, 1.0, "W", 2_000_000.0, Color::BLACK));
        s.add_deletion(0, PageRect::new(0.0, 0.0, 10.0, 10.0)).unwrap();

        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &MemoryAssets::new()).unwrap();
        let skipped: Vec<_> = out.report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(
            skipped[0].status,
            EditStatus::Skipped(SkipReason::Oversized { .. })
        ));
        assert_eq!(out.report.applied_count(), 1);
        assert_eq!(out.image.get_pixel(50, 50), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_huge_image_is_skipped_before_resize() {
        let mut assets = MemoryAssets::new();
        let logo = RgbImage::from_pixel(10, 10, Rgb([0, 128, 0]));
        assets.insert(AssetRef::new("logo"), png_bytes(image::DynamicImage::ImageRgb8(logo)));

        let base = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let mut s = state(100.0, 100.0);
        s.content_mut()
            .push(InsertedContent::image(0, 1.0, 1.0, AssetRef::new("logo"), 200_000, 0));
        // height derived from the aspect ratio
        s.content_mut()
            .push(InsertedContent::image(0, 1.0, 1.0, AssetRef::new("logo"), 400, 0));

        let out = compositor().composite(&base, 0, Zoom::NATIVE, &s, &assets).unwrap();
        let skipped: Vec<_> = out.report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(
            skipped[0].status,
            EditStatus::Skipped(SkipReason::Oversized {
                width: 200_000,
                height: 200_000
            })
        );
        assert_eq!(out.report.applied_count(), 1);
    }

    #[test]
    fn test_target_dimensions_policy() {
        assert_eq!(target_dimensions(200, 100, 0, 0), (200, 100));
        assert_eq!(target_dimensions(200, 100, 50, 0), (50, 25));
        assert_eq!(target_dimensions(200, 100, 0, 30), (60, 30));
        assert_eq!(target_dimensions(200, 100, 10, 10), (10, 10));
        assert_eq!(target_dimensions(3, 7, 2, 0), (2, 4));
    }

    #[test]
    fn test_dominant_color() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([1, 1, 1]));
        for x in 0..10 {
            for y in 0..6 {
                img.put_pixel(x, y, Rgb([9, 9, 9]));
            }
        }
        let all = PixelRect { x1: 0, y1: 0, x2: 10, y2: 10 };
        assert_eq!(dominant_color(&img, all), Some(Color::new(9, 9, 9)));
        let bottom = PixelRect { x1: 0, y1: 6, x2: 10, y2: 10 };
        assert_eq!(dominant_color(&img, bottom), Some(Color::new(1, 1, 1)));
        let empty = PixelRect { x1: 4, y1: 4, x2: 4, y2: 9 };
        assert_eq!(dominant_color(&img, empty), None);
    }

    #[test]
    fn test_dominant_color_tie_prefers_first_seen() {
        let mut img = RgbImage::from_pixel(2, 1, Rgb([5, 5, 5]));
        img.put_pixel(1, 0, Rgb([7, 7, 7]));
        let region = PixelRect { x1: 0, y1: 0, x2: 2, y2: 1 };
        assert_eq!(dominant_color(&img, region), Some(Color::new(5, 5, 5)));
    }

    #[test]
    fn test_sample_pixel_clamps() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        img.put_pixel(3, 3, Rgb([1, 2, 3]));
        assert_eq!(
            sample_pixel(&img, PixelPoint { x: 99.0, y: 99.0 }),
            Some(Color::new(1, 2, 3))
        );
        assert_eq!(sample_pixel(&img, PixelPoint { x: -3.0, y: 0.0 }), Some(Color::BLACK));
    }
}
