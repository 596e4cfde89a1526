//! Error types for the edit engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the redline engine.
#[derive(Error, Debug)]
pub enum EditError {
    /// Page index outside the loaded document.
    #[error("Invalid page index {page}: document has {total} pages")]
    InvalidPage { page: usize, total: usize },

    /// Rectangle has no area once clamped to the page.
    #[error("Degenerate rectangle ({x1}, {y1}, {x2}, {y2}) after clamping to page bounds")]
    DegenerateRect { x1: f32, y1: f32, x2: f32, y2: f32 },

    /// Color is not a `#RRGGBB` hex string.
    #[error("Invalid color '{0}': expected #RRGGBB")]
    InvalidColor(String),

    /// Zoom is not a positive finite number, or outside the configured range.
    #[error("Invalid zoom {0}")]
    InvalidZoom(f32),

    /// Tolerance exceeds the largest possible RGB distance.
    #[error("Invalid tolerance {0}: must be between 0 and 441")]
    InvalidTolerance(u32),

    /// Any other rejected argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Index-addressed edit does not exist.
    #[error("No {kind} at index {index} on page {page}")]
    ItemNotFound {
        kind: &'static str,
        page: usize,
        index: usize,
    },

    /// Session has no document loaded.
    #[error("No document loaded")]
    NoDocument,

    /// Session id is unknown to the registry.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Source document could not be opened.
    #[error("Failed to load document '{path}': {message}")]
    DocumentLoad { path: PathBuf, message: String },

    /// Output document could not be written.
    #[error("Failed to save document '{path}': {message}")]
    DocumentSave { path: PathBuf, message: String },

    /// Pdfium library error.
    #[error("Pdfium error: {0}")]
    Pdfium(String),

    /// Page rendering failed.
    #[error("Page rendering failed: {0}")]
    Render(String),

    /// Inserted-content asset could not be resolved or decoded.
    #[error("Asset '{handle}' unavailable: {message}")]
    Asset { handle: String, message: String },

    /// No usable font could be loaded.
    #[error("Font error: {0}")]
    Font(String),

    /// Template record is structurally invalid.
    #[error("Invalid template: {0}")]
    Template(String),

    /// Template (de)serialization failed.
    #[error("Template JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, EditError>;

impl EditError {
    /// Whether the error came from caller input rather than a resource or state problem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EditError::InvalidPage { .. }
                | EditError::DegenerateRect { .. }
                | EditError::InvalidColor(_)
                | EditError::InvalidZoom(_)
                | EditError::InvalidTolerance(_)
                | EditError::InvalidArgument(_)
                | EditError::ItemNotFound { .. }
        )
    }
}
