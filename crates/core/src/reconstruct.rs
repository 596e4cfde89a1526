//! Final-output reconstruction.
//!
//! Every page takes one of two paths:
//! - **Vector**: the source page is imported unchanged and deletions/area recolors are
//!   appended as opaque filled rectangles.
//! - **Raster**: the page is rendered at native resolution, the full compositor
//!   pipeline runs, and the result is embedded as one full-page image.
//!
//! A page goes raster iff it has a global substitution or inserted content.

use crate::color::Color;
use crate::compositor::Compositor;
use crate::document::{AssetResolver, PageSource};
use crate::edits::{EditKind, EditState};
use crate::error::{EditError, Result};
use crate::outcome::{EditOutcome, PageReport, SkipReason};
use crate::transform::{PageRect, PageSize, Zoom};
use image::RgbImage;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionPath {
    Vector,
    Raster,
}

/// Path a page takes on save.
pub fn choose_path(state: &EditState, page: usize) -> ReconstructionPath {
    if state.has_global_substitutions(page) || state.has_inserted_content(page) {
        ReconstructionPath::Raster
    } else {
        ReconstructionPath::Vector
    }
}

/// Destination of reconstructed pages, written in page order.
pub trait PageSink {
    /// Start a page that reuses the content of source page `source_index`.
    fn begin_vector_page(&mut self, source_index: usize, size: PageSize) -> Result<()>;

    /// Draw an opaque rectangle on the current vector page. Coordinates are page-space
    /// (origin top-left).
    fn fill_rect(&mut self, rect: PageRect, color: Color) -> Result<()>;

    /// Append a page made of a single image covering `size`.
    fn raster_page(&mut self, size: PageSize, image: &RgbImage) -> Result<()>;
}

/// How one page was rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReconstruction {
    pub page: usize,
    pub path: ReconstructionPath,
    pub report: PageReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconstructionReport {
    pub pages: Vec<PageReconstruction>,
}

impl ReconstructionReport {
    pub fn raster_pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.pages
            .iter()
            .filter(|p| p.path == ReconstructionPath::Raster)
            .map(|p| p.page)
    }

    /// Total number of edits that were skipped across all pages.
    pub fn skipped_count(&self) -> usize {
        self.pages.iter().map(|p| p.report.skipped().count()).sum()
    }
}

/// Rebuild every page of `document` with its edits into `sink`.
///
/// A bad edit is skipped and recorded; only render and sink failures abort.
pub fn reconstruct_document<D, S>(
    document: &D,
    state: &EditState,
    compositor: &Compositor,
    assets: &dyn AssetResolver,
    sink: &mut S,
) -> Result<ReconstructionReport>
where
    D: PageSource + ?Sized,
    S: PageSink + ?Sized,
{
    let total = document.page_count();
    if total != state.page_count() {
        return Err(EditError::InvalidArgument(format!(
            "edit state has {} pages but document has {}",
            state.page_count(),
            total
        )));
    }

    let start = Instant::now();
    let mut report = ReconstructionReport::default();

    for page in 0..total {
        let path = choose_path(state, page);
        debug!("Page {} takes the {:?} path", page, path);

        let page_report = match path {
            ReconstructionPath::Vector => vector_page(document, state, page, sink)?,
            ReconstructionPath::Raster => {
                let size = document.page_size(page)?;
                let composite = compositor.render_and_composite(document, page, Zoom::NATIVE, state, assets)?;
                sink.raster_page(size, &composite.image)?;
                composite.report
            }
        };

        report.pages.push(PageReconstruction {
            page,
            path,
            report: page_report,
        });
    }

    info!(
        "Reconstructed {} pages ({} raster, {} skipped edits) in {:?}",
        total,
        report.raster_pages().count(),
        report.skipped_count(),
        start.elapsed()
    );

    Ok(report)
}

fn vector_page<D, S>(document: &D, state: &EditState, page: usize, sink: &mut S) -> Result<PageReport>
where
    D: PageSource + ?Sized,
    S: PageSink + ?Sized,
{
    let size = document.page_size(page)?;
    let edits = state.page_edits(page)?;
    let mut report = PageReport::default();

    sink.begin_vector_page(page, size)?;

    for (index, rect) in edits.deletions.iter().enumerate() {
        let clamped = rect.normalized().clamped(size);
        if clamped.is_degenerate() {
            report.push(EditOutcome::skipped(EditKind::Deletion, index, SkipReason::DegenerateRect));
            continue;
        }
        sink.fill_rect(clamped, Color::WHITE)?;
        report.push(EditOutcome::applied(EditKind::Deletion, index));
    }

    for (index, recolor) in edits.area_recolors.iter().enumerate() {
        let clamped = recolor.rect.normalized().clamped(size);
        let outcome = match Color::from_hex(&recolor.target_color) {
            Err(_) => EditOutcome::skipped(
                EditKind::AreaRecolor,
                index,
                SkipReason::InvalidColor(recolor.target_color.clone()),
            ),
            Ok(_) if clamped.is_degenerate() => {
                EditOutcome::skipped(EditKind::AreaRecolor, index, SkipReason::DegenerateRect)
            }
            Ok(color) => {
                sink.fill_rect(clamped, color)?;
                EditOutcome::applied(EditKind::AreaRecolor, index)
            }
        };
        report.push(outcome);
    }

    for skipped in report.skipped() {
        warn!("Skipped {} #{} on page {}", skipped.kind.as_str(), skipped.index, page);
    }

    Ok(report)
}
