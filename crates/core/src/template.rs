//! Edit templates: the whole edit state as a JSON record that can be merged into
//! another document, possibly with a different page count.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "totalPages": 2,
//!   "deletions": [[[10, 10, 100, 100]], []],
//!   "areaRecolors": [[], [[[0, 0, 50, 50], "#ffffff", "#0000ff"]]],
//!   "globalSubstitutions": [[], []],
//!   "insertedContent": [],
//!   "defaultTargetColor": "#0000ff"
//! }
//! ```
//!
//! The older snake_case names (`total_pages`, `deletion_areas`, `color_changes`,
//! `color_replacements`, `inserted_content`, `target_color`) are accepted on input.

use crate::color::{Color, MAX_RGB_DISTANCE};
use crate::edits::{validate_content, AreaRecolor, EditState, GlobalSubstitution, InsertedContent};
use crate::error::{EditError, Result};
use crate::transform::PageRect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Version written by [`Template::from_state`].
pub const TEMPLATE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub version: String,

    /// Page count of the document the template was taken from. Inferred from the
    /// per-page arrays when absent.
    #[serde(default, alias = "total_pages")]
    pub total_pages: Option<usize>,

    #[serde(default, alias = "deletion_areas")]
    pub deletions: Vec<Vec<PageRect>>,

    #[serde(default, alias = "color_changes")]
    pub area_recolors: Vec<Vec<AreaRecolor>>,

    #[serde(default, alias = "color_replacements")]
    pub global_substitutions: Vec<Vec<GlobalSubstitution>>,

    #[serde(default, alias = "inserted_content")]
    pub inserted_content: Vec<InsertedContent>,

    #[serde(default, alias = "target_color", skip_serializing_if = "Option::is_none")]
    pub default_target_color: Option<String>,
}

/// How a template combines with existing edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Append template edits after the existing ones.
    Additive,
    /// Template edits replace the existing ones on overlapping pages.
    Replacing,
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Pages whose generation was bumped.
    pub pages_affected: Vec<usize>,
    /// Template entries not merged: rectangles without area on the target page,
    /// out-of-range tolerances, invalid or out-of-range inserted content.
    pub dropped: usize,
    pub content_merged: usize,
}

impl Template {
    /// Snapshot the current edit state.
    pub fn from_state(state: &EditState) -> Self {
        let mut deletions = Vec::with_capacity(state.page_count());
        let mut area_recolors = Vec::with_capacity(state.page_count());
        let mut global_substitutions = Vec::with_capacity(state.page_count());
        for page in 0..state.page_count() {
            let edits = state.page_edits(page).cloned().unwrap_or_default();
            deletions.push(edits.deletions);
            area_recolors.push(edits.area_recolors);
            global_substitutions.push(edits.global_substitutions);
        }
        Self {
            version: TEMPLATE_VERSION.to_string(),
            total_pages: Some(state.page_count()),
            deletions,
            area_recolors,
            global_substitutions,
            inserted_content: state.inserted_content().to_vec(),
            default_target_color: Some(state.default_target_color().to_hex()),
        }
    }

    /// Recorded page count, or the longest per-page array.
    pub fn page_count(&self) -> usize {
        self.total_pages.unwrap_or_else(|| {
            self.deletions
                .len()
                .max(self.area_recolors.len())
                .max(self.global_substitutions.len())
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let template: Template = serde_json::from_str(json)?;
        template.check_version()?;
        Ok(template)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let template = Self::from_json(&json)?;
        debug!("Loaded template {:?} ({} pages)", path, template.page_count());
        Ok(template)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!("Saved template to {:?}", path);
        Ok(())
    }

    fn check_version(&self) -> Result<()> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(EditError::Template(format!(
                "unsupported template version '{}'",
                self.version
            )));
        }
        Ok(())
    }
}

/// Merge a template into `state`. Only pages present in both are touched.
///
/// Validation happens before any change, so the state is either fully merged or
/// left as it was.
pub fn merge(state: &mut EditState, template: &Template, mode: MergeMode) -> Result<MergeReport> {
    template.check_version()?;
    let default_target = template
        .default_target_color
        .as_deref()
        .map(Color::from_hex)
        .transpose()?;

    let overlap = template.page_count().min(state.page_count());
    let mut report = MergeReport::default();
    let mut staged = Vec::with_capacity(overlap);

    for page in 0..overlap {
        let size = state.page_size(page)?;
        let mut deletions = Vec::new();
        for rect in template.deletions.get(page).into_iter().flatten() {
            match rect.fit_to(size) {
                Ok(r) => deletions.push(r),
                Err(_) => report.dropped += 1,
            }
        }
        let mut recolors = Vec::new();
        for recolor in template.area_recolors.get(page).into_iter().flatten() {
            match recolor.rect.fit_to(size) {
                Ok(rect) => recolors.push(AreaRecolor {
                    rect,
                    ..recolor.clone()
                }),
                Err(_) => report.dropped += 1,
            }
        }
        let mut substitutions = Vec::new();
        for sub in template.global_substitutions.get(page).into_iter().flatten() {
            if sub.tolerance > MAX_RGB_DISTANCE {
                report.dropped += 1;
            } else {
                substitutions.push(sub.clone());
            }
        }
        staged.push((deletions, recolors, substitutions));
    }

    let mut content = Vec::new();
    for item in &template.inserted_content {
        let valid = item.page < overlap
            && state
                .page_size(item.page)
                .and_then(|size| validate_content(item, size))
                .is_ok();
        if valid {
            content.push(item.clone());
        } else {
            report.dropped += 1;
        }
    }

    let mut affected = BTreeSet::new();
    for (page, (deletions, recolors, substitutions)) in staged.into_iter().enumerate() {
        let has_template_edits = !(deletions.is_empty() && recolors.is_empty() && substitutions.is_empty());
        let record = state.record_mut(page)?;
        match mode {
            MergeMode::Additive => {
                record.edits.deletions.extend(deletions);
                record.edits.area_recolors.extend(recolors);
                record.edits.global_substitutions.extend(substitutions);
                if has_template_edits {
                    affected.insert(page);
                }
            }
            MergeMode::Replacing => {
                record.edits.deletions = deletions;
                record.edits.area_recolors = recolors;
                record.edits.global_substitutions = substitutions;
                affected.insert(page);
            }
        }
    }

    if mode == MergeMode::Replacing {
        state.content_mut().retain(|c| c.page >= overlap);
    }
    report.content_merged = content.len();
    affected.extend(content.iter().map(|c| c.page));
    state.content_mut().extend(content);

    for &page in &affected {
        state.touch(page);
    }
    if let Some(color) = default_target {
        state.set_default_target_color(color);
    }

    report.pages_affected = affected.into_iter().collect();
    info!(
        "Merged template ({:?}): {} pages affected, {} content items, {} entries dropped",
        mode,
        report.pages_affected.len(),
        report.content_merged,
        report.dropped
    );
    Ok(report)
}
