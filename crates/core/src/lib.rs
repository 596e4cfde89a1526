//! # redline-core
//!
//! Layered page edits for PDF documents: redaction, recoloring and annotation,
//! with a live raster preview and a vector/raster reconstruction on save.
//!
//! The engine keeps a per-page edit model and uses it two ways:
//!
//! - **Preview**: pages are rendered to RGB bitmaps and the edits are painted on in a
//!   fixed order (deletions, area recolors, global substitutions, inserted content).
//!   Results are cached per page and zoom until the page's edits change.
//! - **Save**: each page is rebuilt either by importing the original page and drawing
//!   opaque rectangles over it (**vector path**), or, when the page carries a global
//!   color substitution or inserted content, by embedding the composited bitmap as a
//!   single full-page image (**raster path**).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use redline_core::{
//!     Color, EngineConfig, FileAssets, PageRect, PdfRenderer, SessionRegistry, PdfiumDocument,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! fn main() -> redline_core::Result<()> {
//!     let config = EngineConfig::default();
//!     let renderer = PdfRenderer::new(&config.pdfium, config.render.clone())?;
//!     let mut sessions: SessionRegistry<PdfiumDocument> =
//!         SessionRegistry::new(config, Arc::new(FileAssets::new("./uploads")))?;
//!
//!     let id = sessions.create();
//!     let session = sessions.get_mut(&id)?;
//!     session.load_document(renderer.open(Path::new("invoice.pdf"))?)?;
//!
//!     // White out the account number and turn red ink green everywhere on page 2.
//!     session.add_deletion(0, PageRect::new(40.0, 120.0, 260.0, 140.0))?;
//!     session.add_global_substitution(1, Color::new(255, 0, 0), Color::new(0, 255, 0), Some(30))?;
//!
//!     let preview = session.render_page(0, 1.5)?;
//!     println!("Preview is {}x{}", preview.width(), preview.height());
//!
//!     let source = session.document()?;
//!     let mut sink = renderer.create_sink(source)?;
//!     let report = session.reconstruct(&mut sink)?;
//!     sink.save_to_file(Path::new("invoice-redacted.pdf"))?;
//!
//!     println!("{} raster pages", report.raster_pages().count());
//!     Ok(())
//! }
//! ```
//!
//! ## Templates
//!
//! ```rust,no_run
//! use redline_core::{MergeMode, Template};
//! # fn run(session: &mut redline_core::Session<redline_core::MemoryDocument>) -> redline_core::Result<()> {
//! session.export_template()?.save("edits.json")?;
//!
//! let template = Template::load("edits.json")?;
//! let report = session.import_template(&template, MergeMode::Additive)?;
//! println!("Pages changed: {:?}", report.pages_affected);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod color;
pub mod compositor;
pub mod config;
pub mod document;
pub mod edits;
pub mod error;
pub mod fonts;
pub mod outcome;
pub mod pdf_renderer;
pub mod reconstruct;
pub mod session;
pub mod template;
pub mod transform;

// Re-export main types for convenience
pub use cache::{CacheStats, PageBitmapCache};
pub use color::{Color, MAX_RGB_DISTANCE};
pub use compositor::{Composite, Compositor};
pub use config::{CompositorConfig, EditConfig, EngineConfig, FontConfig, PdfiumConfig, RenderConfig};
pub use document::{AssetRef, AssetResolver, FileAssets, MemoryAssets, MemoryDocument, PageSource};
pub use edits::{
    AreaRecolor, ContentKind, CopySummary, EditKind, EditKinds, EditState, GlobalSubstitution, ImageContent,
    InsertedContent, PageEdits, TextContent,
};
pub use error::{EditError, Result};
pub use outcome::{EditOutcome, EditStatus, PageReport, SkipReason};
pub use pdf_renderer::{save_edited_pdf, PdfRenderer, PdfiumDocument, PdfiumPageSink};
pub use reconstruct::{choose_path, reconstruct_document, PageSink, ReconstructionPath, ReconstructionReport};
pub use session::{PageSummary, Session, SessionId, SessionRegistry};
pub use template::{merge, MergeMode, MergeReport, Template, TEMPLATE_VERSION};
pub use transform::{PagePoint, PageRect, PageSize, PixelPoint, PixelRect, Zoom};

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
