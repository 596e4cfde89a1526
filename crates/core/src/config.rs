//! Configuration types for the edit engine.

use crate::color::{Color, MAX_RGB_DISTANCE};
use crate::error::{EditError, Result};
use crate::transform::Zoom;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for interactive page rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Smallest zoom accepted for previews.
    /// Default: 0.2.
    pub min_zoom: f32,

    /// Largest zoom accepted for previews.
    /// Default: 5.0.
    pub max_zoom: f32,

    /// Color used to flatten transparent areas of rendered pages.
    /// Default: white (255, 255, 255).
    pub background_color: (u8, u8, u8),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.2,
            max_zoom: 5.0,
            background_color: (255, 255, 255),
        }
    }
}

impl RenderConfig {
    /// Set the accepted zoom range.
    pub fn zoom_range(mut self, min: f32, max: f32) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    /// Validate a caller-supplied zoom against the configured range.
    pub fn check_zoom(&self, value: f32) -> Result<Zoom> {
        let zoom = Zoom::new(value)?;
        if value < self.min_zoom || value > self.max_zoom {
            return Err(EditError::InvalidZoom(value));
        }
        Ok(zoom)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_zoom.is_finite() && self.min_zoom > 0.0) {
            return Err(EditError::InvalidConfig(
                "min_zoom must be a positive number".to_string(),
            ));
        }
        if !self.max_zoom.is_finite() || self.max_zoom < self.min_zoom {
            return Err(EditError::InvalidConfig(
                "max_zoom must be at least min_zoom".to_string(),
            ));
        }
        Ok(())
    }
}

/// Defaults applied to new edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditConfig {
    /// Target color for area recolors when none is given.
    /// Default: "#0000FF".
    pub default_target_color: String,

    /// Tolerance for global substitutions when none is given.
    /// Default: 30.
    pub default_tolerance: u32,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            default_target_color: "#0000FF".to_string(),
            default_tolerance: 30,
        }
    }
}

impl EditConfig {
    /// Set the default recolor target.
    pub fn default_target_color(mut self, color: Color) -> Self {
        self.default_target_color = color.to_hex();
        self
    }

    /// Set the default substitution tolerance.
    pub fn default_tolerance(mut self, tolerance: u32) -> Self {
        self.default_tolerance = tolerance;
        self
    }

    pub fn target_color(&self) -> Result<Color> {
        Color::from_hex(&self.default_target_color)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.target_color().map_err(|_| {
            EditError::InvalidConfig(format!(
                "default_target_color '{}' is not #RRGGBB",
                self.default_target_color
            ))
        })?;
        if self.default_tolerance > MAX_RGB_DISTANCE {
            return Err(EditError::InvalidConfig(format!(
                "default_tolerance must be at most {}",
                MAX_RGB_DISTANCE
            )));
        }
        Ok(())
    }
}

/// Font files tried, in order, for inserted text.
///
/// The embedded face is always tried last, so text rendering cannot run out of fonts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    /// Preferred system fonts.
    pub preferred: Vec<PathBuf>,

    /// Generic fallbacks tried after the preferred fonts.
    pub fallback: Vec<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            preferred: [
                // Windows
                "C:\\Windows\\Fonts\\arial.ttf",
                // macOS
                "/Library/Fonts/Arial.ttf",
                "/System/Library/Fonts/Supplemental/Arial.ttf",
                // Linux (msttcorefonts)
                "/usr/share/fonts/truetype/msttcorefonts/Arial.ttf",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            fallback: [
                "/System/Library/Fonts/Helvetica.ttc",
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        }
    }
}

impl FontConfig {
    /// Only the embedded face; no filesystem lookups.
    pub fn embedded_only() -> Self {
        Self {
            preferred: Vec::new(),
            fallback: Vec::new(),
        }
    }

    /// Put a font file ahead of all others.
    pub fn prefer(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferred.insert(0, path.into());
        self
    }
}

/// Configuration for the raster compositor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositorConfig {
    /// Threads used for the whole-page color substitution scan.
    /// Default: number of CPU cores.
    pub threads: usize,

    /// Font chain for inserted text.
    pub fonts: FontConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            fonts: FontConfig::default(),
        }
    }
}

impl CompositorConfig {
    /// Set the number of scan threads.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Replace the font chain.
    pub fn fonts(mut self, fonts: FontConfig) -> Self {
        self.fonts = fonts;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(EditError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where to look for the pdfium shared library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfiumConfig {
    /// Directories searched in order before falling back to the system library.
    pub library_paths: Vec<String>,
}

impl Default for PdfiumConfig {
    fn default() -> Self {
        Self {
            library_paths: ["./", "/usr/lib", "/usr/local/lib"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Combined configuration for the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Render configuration.
    pub render: RenderConfig,

    /// Edit defaults.
    pub edits: EditConfig,

    /// Compositor configuration.
    pub compositor: CompositorConfig,

    /// Pdfium binding configuration.
    pub pdfium: PdfiumConfig,
}

impl EngineConfig {
    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.render.validate()?;
        self.edits.validate()?;
        self.compositor.validate()?;
        Ok(())
    }
}
