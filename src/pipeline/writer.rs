//! Output document assembly with `lopdf`.
//!
//! Image XObjects are added to the document the moment they are encoded,
//! so the pixel buffer can be dropped right away. Page objects are added
//! when the composer closes a page; the page tree, catalog and trailer are
//! written once in [`DocumentWriter::to_bytes`].

use crate::error::PdfGridError;
use crate::pipeline::encode::{EncodeError, EncodedImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// One image drawn on a page, in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedImage {
    pub image: ObjectId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub struct DocumentWriter {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentWriter {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Add an encoded image (and its soft mask) and return the image's id.
    pub fn add_image(&mut self, encoded: EncodedImage) -> ObjectId {
        let EncodedImage {
            mut image,
            soft_mask,
            ..
        } = encoded;
        if let Some(mask) = soft_mask {
            let mask_id = self.doc.add_object(mask);
            image.dict.set("SMask", Object::Reference(mask_id));
        }
        self.doc.add_object(image)
    }

    /// Add a `width` × `height` page drawing `images`, in order.
    pub fn add_page(
        &mut self,
        width: f32,
        height: f32,
        images: &[PlacedImage],
    ) -> Result<ObjectId, EncodeError> {
        let mut operations = Vec::with_capacity(images.len() * 4);
        let mut xobjects = lopdf::Dictionary::new();

        for (i, placed) in images.iter().enumerate() {
            let name = format!("Im{i}");
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    Object::Real(placed.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(placed.height),
                    Object::Real(placed.x),
                    Object::Real(placed.y),
                ],
            ));
            operations.push(Operation::new(
                "Do",
                vec![Object::Name(name.as_bytes().to_vec())],
            ));
            operations.push(Operation::new("Q", vec![]));
            xobjects.set(name, Object::Reference(placed.image));
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| EncodeError::Content(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(lopdf::Dictionary::new(), content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => xobjects,
            },
        });
        self.kids.push(Object::Reference(page_id));
        debug!("Added output page {} with {} images", self.kids.len(), images.len());
        Ok(page_id)
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Write the page tree and serialise the document.
    pub fn to_bytes(mut self) -> Result<Vec<u8>, PdfGridError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => std::mem::take(&mut self.kids),
            "Count" => count,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(concat!("pdfgrid ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        // Content streams only; images carry their own filters.
        self.doc.compress();

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| PdfGridError::SerializeFailed(e.to_string()))?;
        Ok(buf)
    }
}
