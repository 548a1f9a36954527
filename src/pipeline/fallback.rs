//! Per-page fallback for PDFs the direct render path cannot handle.
//!
//! Some documents open fine in `lopdf` but trip PDFium on a single page, or
//! fail to open in PDFium at all because of a damaged cross-reference table
//! that `lopdf` tolerates. The fallback loads the document with `lopdf`,
//! writes each remaining page out as a standalone single-page PDF inside the
//! job workspace, and renders that file through the normal [`PdfEngine`].
//! Temporary files are removed when each page is done, whatever the outcome.
//!
//! Each copy is built from scratch: only the objects reachable from the page
//! are carried over, and inherited attributes are pinned on the page itself,
//! so the cost per page tracks the page rather than the whole document.

use crate::pipeline::raster::{page_scale, PageSink, PixelPage};
use crate::pipeline::render::{PdfEngine, RenderError};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("lopdf could not load the document: {0}")]
    Load(#[from] lopdf::Error),

    #[error("could not write single-page copy: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("single-page copy rendered no page")]
    Empty,
}

/// Re-render pages of `path` one at a time, starting at the 0-based page `skip`.
///
/// Returns the number of pages accepted by `sink`. Only a document that
/// cannot be loaded at all is an error; single-page failures are logged and
/// the page is dropped.
pub fn rerender(
    engine: &dyn PdfEngine,
    path: &Path,
    scratch: &Path,
    skip: usize,
    max_dimension: u32,
    sink: &mut dyn PageSink,
) -> Result<usize, FallbackError> {
    let source = Document::load(path)?;
    let pages: Vec<(u32, ObjectId)> = source.get_pages().into_iter().collect();
    info!(
        "Fallback: re-rendering pages {}..={} of {}",
        skip + 1,
        pages.len(),
        path.display()
    );

    let mut accepted = 0;
    for (index, &(number, page_id)) in pages.iter().enumerate().skip(skip) {
        let page = match render_single(engine, &source, number, page_id, scratch, max_dimension) {
            Ok(page) => page,
            Err(e) => {
                warn!("Fallback: page {} dropped: {}", index + 1, e);
                continue;
            }
        };
        match sink.accept(page) {
            Ok(()) => accepted += 1,
            Err(e) => warn!("Fallback: page {} dropped: {}", index + 1, e),
        }
    }
    Ok(accepted)
}

/// Extract page `number` into a throwaway file and render it.
fn render_single(
    engine: &dyn PdfEngine,
    source: &Document,
    number: u32,
    page_id: ObjectId,
    scratch: &Path,
    max_dimension: u32,
) -> Result<PixelPage, FallbackError> {
    let mut single = extract_page(source, page_id)?;

    let mut file = tempfile::Builder::new()
        .prefix(&format!("page-{number}-"))
        .suffix(".pdf")
        .tempfile_in(scratch)?;
    single.save_to(file.as_file_mut())?;
    file.as_file_mut().flush()?;
    debug!("Fallback: page {} → {}", number, file.path().display());

    let mut rendered = None;
    engine.with_document(file.path(), &mut |doc| {
        if doc.page_count() == 0 {
            return Ok(());
        }
        let (w, h) = doc.page_size(0)?;
        rendered = Some(doc.render(0, page_scale(w, h, max_dimension))?);
        Ok(())
    })?;

    rendered.ok_or(FallbackError::Empty)
}

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Build a standalone one-page document holding `page_id` and everything it
/// references. Object ids are kept; a fresh page tree and catalog are added.
fn extract_page(source: &Document, page_id: ObjectId) -> Result<Document, lopdf::Error> {
    let mut page = source.get_dictionary(page_id)?.clone();

    let mut ancestors = BTreeSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(id) = parent {
        if !ancestors.insert(id) {
            break;
        }
        let node = source.get_dictionary(id)?;
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    let mut single = Document::with_version(source.version.clone());
    single.max_id = source.max_id;

    let mut seen = BTreeSet::from([page_id]);
    let mut pending = Vec::new();
    push_dict_refs(&page, &mut pending);
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        // dangling references stay dangling
        let Ok(object) = source.get_object(id) else {
            continue;
        };
        if is_page(object) {
            continue;
        }
        push_refs(object, &mut pending);
        single.objects.insert(id, object.clone());
    }

    let pages_id = single.new_object_id();
    page.set("Parent", pages_id);
    single.objects.insert(page_id, Object::Dictionary(page));
    single.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = single.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    single.trailer.set("Root", catalog_id);
    Ok(single)
}

fn is_page(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(dict.get(b"Type").and_then(Object::as_name), Ok(b"Page")),
        _ => false,
    }
}

fn push_refs(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|item| push_refs(item, out)),
        Object::Dictionary(dict) => push_dict_refs(dict, out),
        Object::Stream(stream) => push_dict_refs(&stream.dict, out),
        _ => {}
    }
}

/// `Parent` links lead back up the page tree and are never followed.
fn push_dict_refs(dict: &Dictionary, out: &mut Vec<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() != b"Parent" {
            push_refs(value, out);
        }
    }
}
