//! Integration tests against real PDFs through pdfium.
//!
//! These tests require the pdfium library (place it in ./, /usr/lib or
//! /usr/local/lib, or install it system-wide). They are skipped otherwise.
//!
//! Run with: cargo test --package redline-core --test pdfium_tests

use image::Rgb;
use redline_core::{
    save_edited_pdf, Color, Compositor, CompositorConfig, EditError, EditState, FontConfig, MemoryAssets,
    PageRect, PageSource, PdfRenderer, PdfiumConfig, ReconstructionPath, RenderConfig, Zoom,
};
use tempfile::TempDir;

/// Build a PDF whose pages are each filled with one color (components in 0..=1).
fn solid_pdf(pages: &[(f32, f32, [f32; 3])]) -> Vec<u8> {
    solid_pdf_placed(pages, 0, 0.0)
}

/// Like [`solid_pdf`], with every page's box moved to `(origin, origin)` and a `/Rotate` entry.
fn solid_pdf_placed(pages: &[(f32, f32, [f32; 3])], rotate: u32, origin: f32) -> Vec<u8> {
    let count = pages.len();
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..count).map(|i| format!("{} 0 R", 3 + i * 2)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), count));
    for (i, (width, height, [r, g, b])) in pages.iter().enumerate() {
        let content = format!("{r} {g} {b} rg {origin} {origin} {width} {height} re f");
        let (right, top) = (origin + width, origin + height);
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [{origin} {origin} {right} {top}] /Rotate {rotate} /Contents {} 0 R >>",
            4 + i * 2
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

/// Bind pdfium or skip the test.
macro_rules! require_pdfium {
    () => {
        match PdfRenderer::new(&PdfiumConfig::default(), RenderConfig::default()) {
            Ok(renderer) => renderer,
            Err(EditError::Pdfium(e)) => {
                eprintln!("Skipping test: Pdfium not found ({})", e);
                return;
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    };
}

fn compositor() -> Compositor {
    Compositor::new(
        &CompositorConfig::default()
            .threads(2)
            .fonts(FontConfig::embedded_only()),
    )
    .unwrap()
}

#[test]
fn test_render_solid_page() {
    let renderer = require_pdfium!();
    let document = renderer
        .open_bytes(solid_pdf(&[(200.0, 100.0, [1.0, 0.0, 0.0])]))
        .unwrap();

    assert_eq!(document.page_count(), 1);
    let size = document.page_size(0).unwrap();
    assert_eq!((size.width, size.height), (200.0, 100.0));

    let bitmap = document.render_page(0, Zoom::new(2.0).unwrap()).unwrap();
    assert_eq!(bitmap.dimensions(), (400, 200));
    assert_eq!(bitmap.get_pixel(200, 100), &Rgb([255, 0, 0]));
    assert!(document.page_size(1).is_err());
}

#[test]
fn test_save_edited_pdf_roundtrip() {
    let renderer = require_pdfium!();
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source.pdf");
    let output = temp.path().join("edited.pdf");
    std::fs::write(
        &source,
        solid_pdf(&[(300.0, 400.0, [0.0, 0.0, 0.0]), (300.0, 400.0, [1.0, 0.0, 0.0])]),
    )
    .unwrap();

    let document = renderer.open(&source).unwrap();
    let mut state = EditState::new(document.page_sizes().unwrap(), Color::new(0, 0, 255));
    drop(document);
    state.add_deletion(0, PageRect::new(10.0, 10.0, 110.0, 60.0)).unwrap();
    state
        .add_global_substitution(1, Color::new(255, 0, 0), Color::new(0, 255, 0), 30)
        .unwrap();

    let report = save_edited_pdf(&renderer, &compositor(), &source, &state, &MemoryAssets::new(), &output)
        .unwrap();
    assert_eq!(report.pages[0].path, ReconstructionPath::Vector);
    assert_eq!(report.pages[1].path, ReconstructionPath::Raster);
    assert!(output.exists());

    let edited = renderer.open(&output).unwrap();
    assert_eq!(edited.page_count(), 2);

    let page0 = edited.render_page(0, Zoom::NATIVE).unwrap();
    // top-left origin: the white box sits near the top of the page
    assert_eq!(page0.get_pixel(60, 35), &Rgb([255, 255, 255]));
    assert_eq!(page0.get_pixel(60, 300), &Rgb([0, 0, 0]));

    let page1 = edited.render_page(1, Zoom::NATIVE).unwrap();
    let center = page1.get_pixel(150, 200);
    assert!(center[1] > 200 && center[0] < 50, "expected green, got {:?}", center);
}

#[test]
fn test_save_to_unwritable_destination_fails() {
    let renderer = require_pdfium!();
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source.pdf");
    std::fs::write(&source, solid_pdf(&[(100.0, 100.0, [1.0, 1.0, 1.0])])).unwrap();

    let state = EditState::new([redline_core::PageSize::new(100.0, 100.0)], Color::BLACK);
    let result = save_edited_pdf(
        &renderer,
        &compositor(),
        &source,
        &state,
        &MemoryAssets::new(),
        &temp.path().join("missing-dir/out.pdf"),
    );
    assert!(matches!(result, Err(EditError::DocumentSave { .. })));
}

#[test]
fn test_vector_edits_land_where_preview_shows_them_on_rotated_page() {
    let renderer = require_pdfium!();
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("rotated.pdf");
    let output = temp.path().join("rotated-edited.pdf");
    std::fs::write(&source, solid_pdf_placed(&[(300.0, 400.0, [0.0, 0.0, 0.0])], 90, 50.0)).unwrap();

    let document = renderer.open(&source).unwrap();
    let size = document.page_size(0).unwrap();
    assert_eq!((size.width, size.height), (400.0, 300.0));

    let mut state = EditState::new(document.page_sizes().unwrap(), Color::new(0, 0, 255));
    state.add_deletion(0, PageRect::new(10.0, 10.0, 110.0, 60.0)).unwrap();
    let preview = compositor()
        .render_and_composite(&document, 0, Zoom::NATIVE, &state, &MemoryAssets::new())
        .unwrap()
        .image;
    drop(document);

    let report = save_edited_pdf(&renderer, &compositor(), &source, &state, &MemoryAssets::new(), &output)
        .unwrap();
    assert_eq!(report.pages[0].path, ReconstructionPath::Vector);

    let edited = renderer.open(&output).unwrap();
    let saved = edited.render_page(0, Zoom::NATIVE).unwrap();
    assert_eq!(saved.dimensions(), preview.dimensions());
    for (x, y) in [(15, 15), (100, 50), (60, 35), (200, 200), (60, 100), (300, 30)] {
        assert_eq!(saved.get_pixel(x, y), preview.get_pixel(x, y), "pixel ({}, {})", x, y);
    }
    assert_eq!(saved.get_pixel(60, 35), &Rgb([255, 255, 255]));
    assert_eq!(saved.get_pixel(300, 30), &Rgb([0, 0, 0]));
}
