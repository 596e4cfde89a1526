//! Font chain for inserted text.

use crate::config::FontConfig;
use crate::error::{EditError, Result};
use ab_glyph::{Font, FontArc, FontVec, PxScale};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// DejaVu Sans Mono, always available as the last link of the chain.
static EMBEDDED_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Where the active font came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontOrigin {
    Preferred(PathBuf),
    Fallback(PathBuf),
    Embedded,
}

/// The first font of the configured chain that loads and parses.
#[derive(Clone)]
pub struct FontChain {
    font: FontArc,
    origin: FontOrigin,
}

impl std::fmt::Debug for FontChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontChain")
            .field("origin", &self.origin)
            .finish()
    }
}

impl FontChain {
    /// Walk preferred fonts, then fallbacks, then the embedded face.
    pub fn load(config: &FontConfig) -> Result<Self> {
        for path in &config.preferred {
            if let Some(font) = load_font_file(path) {
                info!("Using preferred font {:?}", path);
                return Ok(Self {
                    font,
                    origin: FontOrigin::Preferred(path.clone()),
                });
            }
        }
        for path in &config.fallback {
            if let Some(font) = load_font_file(path) {
                info!("Using fallback font {:?}", path);
                return Ok(Self {
                    font,
                    origin: FontOrigin::Fallback(path.clone()),
                });
            }
        }
        Self::embedded()
    }

    pub fn embedded() -> Result<Self> {
        let font = FontArc::try_from_slice(EMBEDDED_FONT)
            .map_err(|e| EditError::Font(format!("embedded font is invalid: {}", e)))?;
        debug!("Using embedded font");
        Ok(Self {
            font,
            origin: FontOrigin::Embedded,
        })
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }

    pub fn origin(&self) -> &FontOrigin {
        &self.origin
    }

    /// Glyph scale whose em square is `em_px` pixels tall.
    pub fn scale_for_em(&self, em_px: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(em_px * self.font.height_unscaled() / units_per_em)
    }
}

fn load_font_file(path: &Path) -> Option<FontArc> {
    let data = std::fs::read(path).ok()?;
    // Collections (.ttc) use their first face.
    match FontVec::try_from_vec_and_index(data, 0) {
        Ok(font) => Some(FontArc::new(font)),
        Err(e) => {
            debug!("Skipping font {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_font_loads() {
        let chain = FontChain::embedded().unwrap();
        assert_eq!(chain.origin(), &FontOrigin::Embedded);
        assert!(chain.font().units_per_em().is_some());
    }

    #[test]
    fn test_missing_fonts_fall_through_to_embedded() {
        let config = FontConfig {
            preferred: vec![PathBuf::from("/nonexistent/arial.ttf")],
            fallback: vec![PathBuf::from("/nonexistent/helvetica.ttc")],
        };
        let chain = FontChain::load(&config).unwrap();
        assert_eq!(chain.origin(), &FontOrigin::Embedded);
    }

    #[test]
    fn test_unparseable_font_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        let chain = FontChain::load(&FontConfig::embedded_only().prefer(&bogus)).unwrap();
        assert_eq!(chain.origin(), &FontOrigin::Embedded);
    }

    #[test]
    fn test_font_file_is_used_when_valid() {
        let dir = tempfile::tempdir().unwrap();
        let copy = dir.path().join("copy.ttf");
        std::fs::write(&copy, EMBEDDED_FONT).unwrap();
        let chain = FontChain::load(&FontConfig::embedded_only().prefer(&copy)).unwrap();
        assert_eq!(chain.origin(), &FontOrigin::Preferred(copy));
    }

    #[test]
    fn test_scale_for_em_grows_with_size() {
        let chain = FontChain::embedded().unwrap();
        let small = chain.scale_for_em(10.0);
        let large = chain.scale_for_em(20.0);
        assert!(large.y > small.y);
        assert!(small.y >= 10.0);
    }
}
