//! End-to-end tests against a real PDFium library.
//!
//! Gated behind `E2E_ENABLED` so they do not run in CI unless a PDFium
//! binary is available.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! Extra PDFs dropped into `./test_cases/` are picked up by
//! `test_every_test_case_pdf`.

use image::{Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream};
use pdfgrid::{
    compose, compose_to_file, compose_with, edit_pdf, ComposeConfig, EditResponse, FsResolver,
    Orientation, PdfEngine, PdfiumEngine,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// A text-only PDF with `n` letter-sized pages.
fn sample_pdf(dir: &Path, n: usize) -> String {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut kids = Vec::new();
    for i in 0..n {
        let text = format!("BT /F1 48 Tf 72 700 Td (Page {}) Tj ET", i + 1);
        let content = doc.add_object(Stream::new(lopdf::Dictionary::new(), text.into_bytes()));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font } },
            "Contents" => content,
        });
        kids.push(Object::Reference(page));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => n as i64,
        }),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);

    let path = dir.join(format!("sample-{n}.pdf"));
    doc.save(&path).expect("save sample PDF");
    path.to_string_lossy().to_string()
}

fn photo(dir: &Path, name: &str, w: u32, h: u32) -> String {
    let path = dir.join(name);
    RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
        .save(&path)
        .expect("save photo");
    path.to_string_lossy().to_string()
}

fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf)
        .expect("output must parse")
        .get_pages()
        .len()
}

// ── Rendering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_render_pdf_pages_with_pdfium() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![sample_pdf(dir.path(), 7)];
    let config = ComposeConfig::builder().items_per_page(4).build().unwrap();

    let output = compose(&inputs, &config).await.expect("compose should succeed");

    assert_eq!(output.stats.placed_images, 7);
    assert_eq!(output.stats.output_pages, 2);
    assert_eq!(page_count(&output.pdf), 2);
    println!("7 pages → {} bytes", output.pdf.len());
}

#[tokio::test]
async fn test_large_pdf_uses_small_batches() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![sample_pdf(dir.path(), 30)];
    let config = ComposeConfig::builder()
        .items_per_page(6)
        .orientation(Orientation::Landscape)
        .build()
        .unwrap();

    let output = compose(&inputs, &config).await.expect("compose should succeed");
    assert_eq!(output.stats.placed_images, 30);
    assert_eq!(page_count(&output.pdf), 5);
}

#[tokio::test]
async fn test_mixed_images_and_pdf() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        photo(dir.path(), "wide.png", 2400, 1200),
        sample_pdf(dir.path(), 2),
        photo(dir.path(), "tall.png", 900, 3000),
    ];

    let out = output_dir().join("mixed.pdf");
    let stats = compose_to_file(
        &inputs,
        &out,
        &ComposeConfig::builder().items_per_page(2).build().unwrap(),
    )
    .await
    .expect("compose_to_file should succeed");

    assert_eq!(stats.placed_images, 4);
    assert_eq!(stats.output_pages, 2);
    assert_eq!(page_count(&std::fs::read(&out).unwrap()), 2);
    println!("Wrote {}", out.display());
}

#[tokio::test]
async fn test_explicit_engine_binding() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![sample_pdf(dir.path(), 1)];
    let engine: Arc<dyn PdfEngine> = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(lib) => Arc::new(PdfiumEngine::with_library(lib)),
        Err(_) => Arc::new(PdfiumEngine::new()),
    };

    let output = compose_with(
        Arc::new(FsResolver::new()),
        engine,
        &inputs,
        &ComposeConfig::default(),
    )
    .await
    .expect("compose should succeed");
    assert_eq!(output.stats.output_pages, 1);
}

#[tokio::test]
async fn test_edit_pdf_bridge() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![sample_pdf(dir.path(), 3), photo(dir.path(), "a.png", 300, 300)];

    match edit_pdf(&inputs, 2, "Retrato").await {
        EditResponse::Ok { pages, pdf_base64 } => {
            assert_eq!(pages, 2);
            assert!(!pdf_base64.is_empty());
        }
        EditResponse::Error { code, message } => panic!("{code}: {message}"),
    }
}

#[tokio::test]
async fn test_every_test_case_pdf() {
    e2e_skip_unless_ready!();
    let Ok(entries) = std::fs::read_dir(test_cases_dir()) else {
        println!("SKIP — no test_cases directory");
        return;
    };
    let pdfs: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "pdf"))
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    if pdfs.is_empty() {
        println!("SKIP — no PDFs in test_cases/");
        return;
    }

    for pdf in &pdfs {
        let config = ComposeConfig::builder().items_per_page(4).build().unwrap();
        let output = compose(&[pdf], &config)
            .await
            .unwrap_or_else(|e| panic!("[{pdf}] {e}"));
        assert!(output.stats.placed_images > 0, "[{pdf}] nothing placed");
        println!(
            "[{pdf}] ✓ {} pages placed on {} sheets",
            output.stats.placed_images, output.stats.output_pages
        );
    }
}
