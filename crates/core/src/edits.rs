//! The edit layer model.
//!
//! One [`PageRecord`] per page lives in a single indexed collection, so every page
//! has its deletions, recolors, substitutions and generation counter side by side.
//! Inserted content is kept in one flat list tagged with its page, because its
//! insertion order across pages is part of the model.

use crate::color::{Color, MAX_RGB_DISTANCE};
use crate::document::AssetRef;
use crate::error::{EditError, Result};
use crate::transform::{PagePoint, PageRect, PageSize};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inserted text and images may be at most this many times the page's larger side.
pub const MAX_CONTENT_PAGE_RATIO: f32 = 4.0;

/// A rectangle filled with a fixed color.
///
/// `target_color` is authoritative. `source_color` records the dominant color
/// sampled when the edit was created and is never reapplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(PageRect, String, String)", into = "(PageRect, String, String)")]
pub struct AreaRecolor {
    pub rect: PageRect,
    pub source_color: String,
    pub target_color: String,
}

impl From<(PageRect, String, String)> for AreaRecolor {
    fn from((rect, source_color, target_color): (PageRect, String, String)) -> Self {
        Self {
            rect,
            source_color,
            target_color,
        }
    }
}

impl From<AreaRecolor> for (PageRect, String, String) {
    fn from(r: AreaRecolor) -> Self {
        (r.rect, r.source_color, r.target_color)
    }
}

fn default_tolerance() -> u32 {
    30
}

/// Whole-page replacement of every pixel within `tolerance` of `source_color`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSubstitution {
    #[serde(alias = "old_color")]
    pub source_color: String,
    #[serde(alias = "new_color")]
    pub target_color: String,
    #[serde(default = "default_tolerance")]
    pub tolerance: u32,
}

/// Text placed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    #[serde(alias = "font_size")]
    pub font_size_pt: f32,
    pub color: String,
}

/// An image placed on a page. A zero dimension is derived from the other one,
/// keeping the aspect ratio; both zero keeps the source size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    #[serde(alias = "path")]
    pub source_ref: AssetRef,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentKind {
    Text(TextContent),
    Image(ImageContent),
}

/// Content inserted at a page-space position (top-left anchor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ContentRecord", into = "ContentRecord")]
pub struct InsertedContent {
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub kind: ContentKind,
}

impl InsertedContent {
    pub fn text(page: usize, x: f32, y: f32, text: impl Into<String>, font_size_pt: f32, color: Color) -> Self {
        Self {
            page,
            x,
            y,
            kind: ContentKind::Text(TextContent {
                text: text.into(),
                font_size_pt,
                color: color.to_hex(),
            }),
        }
    }

    pub fn image(page: usize, x: f32, y: f32, source_ref: AssetRef, width: u32, height: u32) -> Self {
        Self {
            page,
            x,
            y,
            kind: ContentKind::Image(ImageContent {
                source_ref,
                width,
                height,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ContentType {
    Text,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentData {
    Text(TextContent),
    Image(ImageContent),
}

/// Wire form: `{page, type, x, y, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentRecord {
    page: usize,
    #[serde(rename = "type")]
    content_type: ContentType,
    x: f32,
    y: f32,
    data: ContentData,
}

impl TryFrom<ContentRecord> for InsertedContent {
    type Error = String;

    fn try_from(record: ContentRecord) -> std::result::Result<Self, String> {
        let kind = match (record.content_type, record.data) {
            (ContentType::Text, ContentData::Text(text)) => ContentKind::Text(text),
            (ContentType::Image, ContentData::Image(image)) => ContentKind::Image(image),
            (content_type, _) => {
                return Err(format!("data does not match content type {content_type:?}"))
            }
        };
        Ok(Self {
            page: record.page,
            x: record.x,
            y: record.y,
            kind,
        })
    }
}

impl From<InsertedContent> for ContentRecord {
    fn from(content: InsertedContent) -> Self {
        let (content_type, data) = match content.kind {
            ContentKind::Text(text) => (ContentType::Text, ContentData::Text(text)),
            ContentKind::Image(image) => (ContentType::Image, ContentData::Image(image)),
        };
        Self {
            page: content.page,
            content_type,
            x: content.x,
            y: content.y,
            data,
        }
    }
}

/// Pending edits of one page, in application order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageEdits {
    pub deletions: Vec<PageRect>,
    pub area_recolors: Vec<AreaRecolor>,
    pub global_substitutions: Vec<GlobalSubstitution>,
}

impl PageEdits {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
            && self.area_recolors.is_empty()
            && self.global_substitutions.is_empty()
    }
}

/// Kinds of index-addressed edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Deletion,
    AreaRecolor,
    GlobalSubstitution,
    InsertedContent,
}

impl EditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditKind::Deletion => "deletion",
            EditKind::AreaRecolor => "area recolor",
            EditKind::GlobalSubstitution => "global substitution",
            EditKind::InsertedContent => "inserted content",
        }
    }
}

/// Selection of edit kinds for page-to-page copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditKinds {
    pub deletions: bool,
    pub area_recolors: bool,
    pub global_substitutions: bool,
    pub inserted_content: bool,
}

impl EditKinds {
    pub const ALL: EditKinds = EditKinds {
        deletions: true,
        area_recolors: true,
        global_substitutions: true,
        inserted_content: true,
    };

    pub const COLORS: EditKinds = EditKinds {
        deletions: false,
        area_recolors: true,
        global_substitutions: true,
        inserted_content: false,
    };

    pub fn contains(&self, kind: EditKind) -> bool {
        match kind {
            EditKind::Deletion => self.deletions,
            EditKind::AreaRecolor => self.area_recolors,
            EditKind::GlobalSubstitution => self.global_substitutions,
            EditKind::InsertedContent => self.inserted_content,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.deletions || self.area_recolors || self.global_substitutions || self.inserted_content)
    }
}

/// Result of copying edits onto another page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub copied: usize,
    /// Rectangles that had no area once clamped to the target page.
    pub dropped: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct PageRecord {
    pub(crate) size: PageSize,
    pub(crate) edits: PageEdits,
    pub(crate) generation: u64,
}

/// All pending edits for one document instance.
#[derive(Debug, Clone)]
pub struct EditState {
    pages: Vec<PageRecord>,
    content: Vec<InsertedContent>,
    default_target_color: Color,
}

impl EditState {
    /// Empty edits for a document with the given page sizes.
    pub fn new(page_sizes: impl IntoIterator<Item = PageSize>, default_target_color: Color) -> Self {
        let pages = page_sizes
            .into_iter()
            .map(|size| PageRecord {
                size,
                edits: PageEdits::default(),
                generation: 0,
            })
            .collect();
        Self {
            pages,
            content: Vec::new(),
            default_target_color,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn record(&self, page: usize) -> Result<&PageRecord> {
        self.pages.get(page).ok_or(EditError::InvalidPage {
            page,
            total: self.pages.len(),
        })
    }

    pub(crate) fn record_mut(&mut self, page: usize) -> Result<&mut PageRecord> {
        let total = self.pages.len();
        self.pages
            .get_mut(page)
            .ok_or(EditError::InvalidPage { page, total })
    }

    pub(crate) fn content_mut(&mut self) -> &mut Vec<InsertedContent> {
        &mut self.content
    }

    pub fn page_size(&self, page: usize) -> Result<PageSize> {
        Ok(self.record(page)?.size)
    }

    pub fn page_edits(&self, page: usize) -> Result<&PageEdits> {
        Ok(&self.record(page)?.edits)
    }

    /// Version counter of a page, bumped by every mutation that touches it.
    pub fn generation(&self, page: usize) -> Result<u64> {
        Ok(self.record(page)?.generation)
    }

    pub fn inserted_content(&self) -> &[InsertedContent] {
        &self.content
    }

    /// Inserted content of one page with its index in the flat list.
    pub fn content_for_page(&self, page: usize) -> impl Iterator<Item = (usize, &InsertedContent)> {
        self.content
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.page == page)
    }

    pub fn has_global_substitutions(&self, page: usize) -> bool {
        self.pages
            .get(page)
            .is_some_and(|r| !r.edits.global_substitutions.is_empty())
    }

    pub fn has_inserted_content(&self, page: usize) -> bool {
        self.content.iter().any(|c| c.page == page)
    }

    pub fn default_target_color(&self) -> Color {
        self.default_target_color
    }

    pub fn set_default_target_color(&mut self, color: Color) {
        self.default_target_color = color;
    }

    /// True when no page has any edit and no content is inserted.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.pages.iter().all(|r| r.edits.is_empty())
    }

    pub(crate) fn touch(&mut self, page: usize) {
        if let Some(record) = self.pages.get_mut(page) {
            record.generation += 1;
        }
    }

    pub fn add_deletion(&mut self, page: usize, rect: PageRect) -> Result<usize> {
        let record = self.record_mut(page)?;
        let rect = rect.fit_to(record.size)?;
        record.edits.deletions.push(rect);
        record.generation += 1;
        debug!("Added deletion {:?} on page {}", rect, page);
        Ok(record.edits.deletions.len() - 1)
    }

    /// Add an area recolor. `source` is the sampled dominant color of the region;
    /// `target` defaults to the state's default target color.
    pub fn add_area_recolor(
        &mut self,
        page: usize,
        rect: PageRect,
        source: Color,
        target: Option<Color>,
    ) -> Result<usize> {
        let target = target.unwrap_or(self.default_target_color);
        let record = self.record_mut(page)?;
        let rect = rect.fit_to(record.size)?;
        record.edits.area_recolors.push(AreaRecolor {
            rect,
            source_color: source.to_hex(),
            target_color: target.to_hex(),
        });
        record.generation += 1;
        debug!("Added area recolor {:?} -> {} on page {}", rect, target, page);
        Ok(record.edits.area_recolors.len() - 1)
    }

    pub fn add_global_substitution(
        &mut self,
        page: usize,
        source: Color,
        target: Color,
        tolerance: u32,
    ) -> Result<usize> {
        if tolerance > MAX_RGB_DISTANCE {
            return Err(EditError::InvalidTolerance(tolerance));
        }
        let record = self.record_mut(page)?;
        record.edits.global_substitutions.push(GlobalSubstitution {
            source_color: source.to_hex(),
            target_color: target.to_hex(),
            tolerance,
        });
        record.generation += 1;
        debug!(
            "Added global substitution {} -> {} (tolerance {}) on page {}",
            source, target, tolerance, page
        );
        Ok(record.edits.global_substitutions.len() - 1)
    }

    /// Append inserted content; returns its index in the flat list.
    pub fn add_inserted_content(&mut self, content: InsertedContent) -> Result<usize> {
        let size = self.record(content.page)?.size;
        validate_content(&content, size)?;
        let page = content.page;
        self.content.push(content);
        self.touch(page);
        debug!("Inserted content #{} on page {}", self.content.len() - 1, page);
        Ok(self.content.len() - 1)
    }

    /// Remove one edit. Inserted content is addressed by its flat-list index and
    /// must belong to `page`.
    pub fn remove_item(&mut self, kind: EditKind, page: usize, index: usize) -> Result<()> {
        let not_found = EditError::ItemNotFound {
            kind: kind.as_str(),
            page,
            index,
        };
        if kind == EditKind::InsertedContent {
            self.record(page)?;
            if !self.content.get(index).is_some_and(|c| c.page == page) {
                return Err(not_found);
            }
            self.content.remove(index);
        } else {
            let edits = &mut self.record_mut(page)?.edits;
            let removed = match kind {
                EditKind::Deletion => remove_at(&mut edits.deletions, index),
                EditKind::AreaRecolor => remove_at(&mut edits.area_recolors, index),
                _ => remove_at(&mut edits.global_substitutions, index),
            };
            if !removed {
                return Err(not_found);
            }
        }
        self.touch(page);
        debug!("Removed {} #{} from page {}", kind.as_str(), index, page);
        Ok(())
    }

    /// Drop every edit of a page, including its inserted content.
    pub fn clear_page(&mut self, page: usize) -> Result<()> {
        self.record_mut(page)?.edits = PageEdits::default();
        self.content.retain(|c| c.page != page);
        self.touch(page);
        debug!("Cleared page {}", page);
        Ok(())
    }

    /// Append copies of the selected edit kinds of `source` onto `target`.
    /// Rectangles are re-clamped to the target page; ones left without area are dropped.
    pub fn copy_page_edits(&mut self, source: usize, target: usize, kinds: EditKinds) -> Result<CopySummary> {
        if source == target {
            return Err(EditError::InvalidArgument(
                "source and target page are the same".to_string(),
            ));
        }
        if kinds.is_empty() {
            return Err(EditError::InvalidArgument("no edit kinds selected".to_string()));
        }
        let from = self.record(source)?.edits.clone();
        let target_size = self.record(target)?.size;
        let mut summary = CopySummary::default();

        let mut deletions = Vec::new();
        if kinds.deletions {
            for rect in &from.deletions {
                match rect.fit_to(target_size) {
                    Ok(r) => deletions.push(r),
                    Err(_) => summary.dropped += 1,
                }
            }
        }
        let mut recolors = Vec::new();
        if kinds.area_recolors {
            for recolor in &from.area_recolors {
                match recolor.rect.fit_to(target_size) {
                    Ok(rect) => recolors.push(AreaRecolor {
                        rect,
                        ..recolor.clone()
                    }),
                    Err(_) => summary.dropped += 1,
                }
            }
        }
        let substitutions = if kinds.global_substitutions {
            from.global_substitutions.clone()
        } else {
            Vec::new()
        };
        let mut content = Vec::new();
        if kinds.inserted_content {
            for (_, item) in self.content_for_page(source) {
                let moved = InsertedContent {
                    page: target,
                    ..item.clone()
                };
                match validate_content(&moved, target_size) {
                    Ok(()) => content.push(moved),
                    Err(_) => summary.dropped += 1,
                }
            }
        }

        summary.copied = deletions.len() + recolors.len() + substitutions.len() + content.len();
        if summary.copied == 0 {
            debug!(
                "Nothing copied from page {} to page {} ({} dropped)",
                source, target, summary.dropped
            );
            return Ok(summary);
        }
        let record = self.record_mut(target)?;
        record.edits.deletions.extend(deletions);
        record.edits.area_recolors.extend(recolors);
        record.edits.global_substitutions.extend(substitutions);
        self.content.extend(content);
        self.touch(target);
        debug!(
            "Copied {} edits from page {} to page {} ({} dropped)",
            summary.copied, source, target, summary.dropped
        );
        Ok(summary)
    }

    /// Copy the area recolors and global substitutions of `source` onto every other page.
    /// Returns the pages that received edits.
    pub fn copy_color_edits_to_all_pages(&mut self, source: usize) -> Result<Vec<usize>> {
        let edits = &self.record(source)?.edits;
        if edits.area_recolors.is_empty() && edits.global_substitutions.is_empty() {
            return Ok(Vec::new());
        }
        let mut affected = Vec::new();
        for target in (0..self.pages.len()).filter(|&p| p != source) {
            if self.copy_page_edits(source, target, EditKinds::COLORS)?.copied > 0 {
                affected.push(target);
            }
        }
        Ok(affected)
    }
}

fn remove_at<T>(items: &mut Vec<T>, index: usize) -> bool {
    if index < items.len() {
        items.remove(index);
        true
    } else {
        false
    }
}

pub(crate) fn validate_content(content: &InsertedContent, size: PageSize) -> Result<()> {
    let at = PagePoint {
        x: content.x,
        y: content.y,
    };
    if !(at.x.is_finite() && at.y.is_finite()) || !size.contains(at) {
        return Err(EditError::InvalidArgument(format!(
            "insertion point ({}, {}) is outside the page",
            content.x, content.y
        )));
    }
    match &content.kind {
        ContentKind::Text(text) => {
            Color::from_hex(&text.color)?;
            if !(text.font_size_pt.is_finite() && text.font_size_pt > 0.0) {
                return Err(EditError::InvalidArgument(format!(
                    "font size must be positive, got {}",
                    text.font_size_pt
                )));
            }
            let limit = MAX_CONTENT_PAGE_RATIO * size.width.max(size.height);
            if text.font_size_pt > limit {
                return Err(EditError::InvalidArgument(format!(
                    "font size {} exceeds the limit of {} for this page",
                    text.font_size_pt, limit
                )));
            }
            if text.text.is_empty() {
                return Err(EditError::InvalidArgument("text is empty".to_string()));
            }
        }
        ContentKind::Image(image) => {
            if image.source_ref.as_str().is_empty() {
                return Err(EditError::InvalidArgument("image source is empty".to_string()));
            }
            let limit = MAX_CONTENT_PAGE_RATIO * size.width.max(size.height);
            if image.width as f32 > limit || image.height as f32 > limit {
                return Err(EditError::InvalidArgument(format!(
                    "image size {}x{} exceeds the limit of {} for this page",
                    image.width, image.height, limit
                )));
            }
        }
    }
    Ok(())
}
