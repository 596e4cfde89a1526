//! Page-space to pixel-space mapping.
//!
//! Edits are stored in page-space (document units, origin top-left). Bitmaps are
//! addressed in pixel-space at a given zoom. Every multiplication by zoom in the
//! crate goes through this module so the preview and the saved page agree.

use crate::error::{EditError, Result};
use serde::{Deserialize, Serialize};

/// A positive, finite magnification factor.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Zoom(f32);

impl Zoom {
    /// Native resolution: one pixel per document unit.
    pub const NATIVE: Zoom = Zoom(1.0);

    pub fn new(value: f32) -> Result<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(EditError::InvalidZoom(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Bit pattern used as a cache key component.
    pub fn key(self) -> u32 {
        self.0.to_bits()
    }

    /// Page-space length to pixel-space length.
    pub fn scale(self, length: f32) -> f32 {
        length * self.0
    }

    /// Pixel-space length back to page-space length.
    pub fn unscale(self, length: f32) -> f32 {
        length / self.0
    }

    pub fn to_pixel(self, p: PagePoint) -> PixelPoint {
        PixelPoint {
            x: self.scale(p.x),
            y: self.scale(p.y),
        }
    }

    pub fn to_page(self, q: PixelPoint) -> PagePoint {
        PagePoint {
            x: self.unscale(q.x),
            y: self.unscale(q.y),
        }
    }

    /// Pixel dimensions of a page rendered at this zoom.
    pub fn bitmap_size(self, size: PageSize) -> (u32, u32) {
        (
            self.scale(size.width).max(1.0) as u32,
            self.scale(size.height).max(1.0) as u32,
        )
    }

    /// Scale a page rectangle to whole pixels (truncating), clamped to the bitmap.
    pub fn to_pixel_rect(self, rect: &PageRect, bitmap_width: u32, bitmap_height: u32) -> PixelRect {
        let clamp = |v: f32, max: u32| (self.scale(v) as i64).clamp(0, max as i64) as u32;
        PixelRect {
            x1: clamp(rect.x1, bitmap_width),
            y1: clamp(rect.y1, bitmap_height),
            x2: clamp(rect.x2, bitmap_width),
            y2: clamp(rect.y2, bitmap_height),
        }
    }
}

/// Page dimensions in document units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, p: PagePoint) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x <= self.width && p.y <= self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned rectangle in page-space, serialized as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct PageRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl PageRect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Corners reordered so that `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    /// Clamp every coordinate into `[0, width] x [0, height]`.
    pub fn clamped(&self, size: PageSize) -> Self {
        Self {
            x1: self.x1.clamp(0.0, size.width),
            y1: self.y1.clamp(0.0, size.height),
            x2: self.x2.clamp(0.0, size.width),
            y2: self.y2.clamp(0.0, size.height),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.x1 < self.x2 && self.y1 < self.y2)
    }

    /// Normalize and clamp, rejecting rectangles that end up with no area.
    pub fn fit_to(&self, size: PageSize) -> Result<Self> {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        if coords.iter().any(|v| !v.is_finite()) {
            return Err(EditError::InvalidArgument(format!(
                "rectangle has non-finite coordinates: {coords:?}"
            )));
        }
        let fitted = self.normalized().clamped(size);
        if fitted.is_degenerate() {
            return Err(EditError::DegenerateRect {
                x1: fitted.x1,
                y1: fitted.y1,
                x2: fitted.x2,
                y2: fitted.y2,
            });
        }
        Ok(fitted)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

impl From<[f32; 4]> for PageRect {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<PageRect> for [f32; 4] {
    fn from(r: PageRect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

/// Half-open pixel rectangle `[x1, x2) x [y1, y2)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRect {
    pub fn is_degenerate(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_rejects_non_positive() {
        assert!(Zoom::new(0.0).is_err());
        assert!(Zoom::new(-1.0).is_err());
        assert!(Zoom::new(f32::NAN).is_err());
        assert!(Zoom::new(f32::INFINITY).is_err());
        assert!(Zoom::new(0.2).is_ok());
    }

    #[test]
    fn test_point_roundtrip() {
        let zoom = Zoom::new(2.0).unwrap();
        let p = PagePoint { x: 10.0, y: 25.5 };
        let q = zoom.to_pixel(p);
        assert_eq!(q, PixelPoint { x: 20.0, y: 51.0 });
        assert_eq!(zoom.to_page(q), p);
    }

    #[test]
    fn test_bitmap_size() {
        let size = PageSize::new(600.0, 800.0);
        assert_eq!(Zoom::NATIVE.bitmap_size(size), (600, 800));
        assert_eq!(Zoom::new(1.5).unwrap().bitmap_size(size), (900, 1200));
    }

    #[test]
    fn test_pixel_rect_truncates_and_clamps() {
        let zoom = Zoom::new(1.5).unwrap();
        let rect = PageRect::new(10.0, 10.0, 1000.0, 33.0);
        let px = zoom.to_pixel_rect(&rect, 900, 1200);
        assert_eq!(px, PixelRect { x1: 15, y1: 15, x2: 900, y2: 49 });
        assert_eq!(px.width(), 885);
    }

    #[test]
    fn test_fit_to_normalizes_and_clamps() {
        let size = PageSize::new(600.0, 800.0);
        let fitted = PageRect::new(700.0, 50.0, 100.0, -5.0).fit_to(size).unwrap();
        assert_eq!(fitted, PageRect::new(100.0, 0.0, 600.0, 50.0));
    }

    #[test]
    fn test_fit_to_rejects_degenerate() {
        let size = PageSize::new(600.0, 800.0);
        let err = PageRect::new(650.0, 10.0, 700.0, 20.0).fit_to(size).unwrap_err();
        assert!(matches!(err, EditError::DegenerateRect { .. }));
        assert!(PageRect::new(5.0, 5.0, 5.0, 9.0).fit_to(size).is_err());
        assert!(PageRect::new(f32::NAN, 5.0, 5.0, 9.0).fit_to(size).is_err());
    }

    #[test]
    fn test_rect_serializes_as_array() {
        let json = serde_json::to_string(&PageRect::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let back: PageRect = serde_json::from_str("[1, 2, 3.5, 4]").unwrap();
        assert_eq!(back, PageRect::new(1.0, 2.0, 3.5, 4.0));
    }
}
