//! Pdfium page renderer
//!
//! Pdfium is bound at runtime. When no library can be found the renderer is
//! simply absent and the rasterizing fallback reports itself unavailable.

use image::{DynamicImage, RgbImage, RgbaImage};
use pdfium_render::prelude::*;

use super::{PageRenderer, PageSize, PixelSize, RenderSession};
use crate::error::RasterError;

pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    /// Bind libpdfium from the working directory, then from system paths
    pub fn bind() -> Result<Self, RasterError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| RasterError::Unavailable(format!("Pdfium library not found: {:?}", e)))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRenderer for PdfiumRenderer {
    fn open<'a>(&'a self, pdf: &'a [u8]) -> Result<Box<dyn RenderSession + 'a>, RasterError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| RasterError::Open(format!("{:?}", e)))?;
        Ok(Box::new(PdfiumSession { document }))
    }
}

/// An open document; closed when dropped
struct PdfiumSession<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumSession<'_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>, RasterError> {
        let page_index = PdfPageIndex::try_from(index).map_err(|_| RasterError::PageRender {
            page: index,
            message: "page index out of range".to_string(),
        })?;
        self.document
            .pages()
            .get(page_index)
            .map_err(|e| RasterError::PageRender {
                page: index,
                message: format!("{:?}", e),
            })
    }
}

impl RenderSession for PdfiumSession<'_> {
    fn page_count(&self) -> usize {
        usize::from(self.document.pages().len())
    }

    fn page_size(&self, index: usize) -> Result<PageSize, RasterError> {
        let page = self.page(index)?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn render_page(&self, index: usize, target: PixelSize) -> Result<RgbImage, RasterError> {
        let render_error = |message: String| RasterError::PageRender {
            page: index,
            message,
        };

        let page = self.page(index)?;
        let config = PdfRenderConfig::new()
            .set_target_size(target.width as i32, target.height as i32)
            .set_clear_color(PdfColor::WHITE)
            .render_form_data(true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| render_error(format!("{:?}", e)))?;

        let width = u32::try_from(bitmap.width()).map_err(|e| render_error(e.to_string()))?;
        let height = u32::try_from(bitmap.height()).map_err(|e| render_error(e.to_string()))?;
        let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| render_error("bitmap size mismatch".to_string()))?;

        Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
}
