//! Per-edit application results.
//!
//! Composition and reconstruction never abort on a single bad edit. Each edit
//! yields an [`EditOutcome`] so skipped edits stay observable.

use crate::edits::EditKind;
use serde::Serialize;
use std::fmt;

/// Why an edit was not applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The rectangle covers no pixels (or no area) at this resolution.
    DegenerateRect,
    /// A color field is not `#RRGGBB`.
    InvalidColor(String),
    /// The inserted image could not be resolved.
    AssetUnavailable(String),
    /// The inserted image bytes could not be decoded.
    ImageDecode(String),
    /// The inserted image resolves to zero pixels.
    EmptyImage,
    /// Inserted text or image is far larger than the page bitmap.
    Oversized { width: u32, height: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DegenerateRect => write!(f, "degenerate rectangle"),
            SkipReason::InvalidColor(c) => write!(f, "invalid color '{}'", c),
            SkipReason::AssetUnavailable(m) => write!(f, "asset unavailable: {}", m),
            SkipReason::ImageDecode(m) => write!(f, "image decode failed: {}", m),
            SkipReason::EmptyImage => write!(f, "image has no pixels"),
            SkipReason::Oversized { width, height } => {
                write!(f, "content of {}x{} pixels is too large for the page", width, height)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStatus {
    Applied,
    Skipped(SkipReason),
}

/// What happened to one edit. `index` is the position in the page's sequence,
/// or in the flat content list for inserted content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    pub kind: EditKind,
    pub index: usize,
    pub status: EditStatus,
}

impl EditOutcome {
    pub fn applied(kind: EditKind, index: usize) -> Self {
        Self {
            kind,
            index,
            status: EditStatus::Applied,
        }
    }

    pub fn skipped(kind: EditKind, index: usize, reason: SkipReason) -> Self {
        Self {
            kind,
            index,
            status: EditStatus::Skipped(reason),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.status == EditStatus::Applied
    }
}

/// Outcomes of every edit applied to one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageReport {
    pub outcomes: Vec<EditOutcome>,
}

impl PageReport {
    pub fn push(&mut self, outcome: EditOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &EditOutcome> {
        self.outcomes.iter().filter(|o| !o.is_applied())
    }
}
