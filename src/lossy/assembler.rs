//! Image-only PDF assembly
//!
//! Builds a fresh lopdf document whose pages each show one embedded JPEG.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, SaveOptions, Stream};

use super::PageSize;
use crate::error::RasterError;

/// Handle to an embedded image XObject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef(ObjectId);

/// Handle to a page added to the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef(usize);

/// Page waiting for its content stream
struct PendingPage {
    size: PageSize,
    operations: Vec<Operation>,
    xobjects: Dictionary,
}

/// Builder for image-only PDFs
pub struct ImagePdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    pages: Vec<PendingPage>,
}

impl Default for ImagePdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            pages: Vec::new(),
        }
    }

    /// Embed JPEG bytes as an RGB image XObject
    pub fn embed_jpeg(&mut self, jpeg: Vec<u8>, width_px: u32, height_px: u32) -> ImageRef {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width_px),
            "Height" => i64::from(height_px),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        let mut stream = Stream::new(dict, jpeg);
        stream.allows_compression = false;
        ImageRef(self.doc.add_object(stream))
    }

    /// Add an empty page of the given size in points
    pub fn add_page(&mut self, size: PageSize) -> PageRef {
        self.pages.push(PendingPage {
            size,
            operations: Vec::new(),
            xobjects: Dictionary::new(),
        });
        PageRef(self.pages.len() - 1)
    }

    /// Draw an image into a rectangle of a page (PDF user space, origin bottom-left)
    pub fn draw_image(
        &mut self,
        page: PageRef,
        image: ImageRef,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), RasterError> {
        let pending = self
            .pages
            .get_mut(page.0)
            .ok_or_else(|| RasterError::Assemble(format!("unknown page {}", page.0)))?;

        let name = format!("Im{}", pending.xobjects.len());
        pending.xobjects.set(name.as_bytes().to_vec(), Object::Reference(image.0));
        pending.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0.into(),
                    0.into(),
                    height.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Write the page tree and serialize with object streams
    pub fn save(mut self) -> Result<Vec<u8>, RasterError> {
        let mut kids = Vec::with_capacity(self.pages.len());

        for pending in std::mem::take(&mut self.pages) {
            let content = Content {
                operations: pending.operations,
            };
            let encoded = content
                .encode()
                .map_err(|e| RasterError::Assemble(e.to_string()))?;
            let mut content_stream = Stream::new(dictionary! {}, encoded);
            // Tiny streams; compression failure only means they stay raw
            let _ = content_stream.compress();
            let content_id = self.doc.add_object(content_stream);

            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => pending.xobjects,
                },
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    pending.size.width.into(),
                    pending.size.height.into(),
                ],
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let options = SaveOptions::builder()
            .use_object_streams(true)
            .use_xref_streams(true)
            .build();

        let mut buffer = Vec::new();
        self.doc
            .save_with_options(&mut buffer, options)
            .map_err(|e| RasterError::Assemble(e.to_string()))?;
        Ok(buffer)
    }
}
