//! Lossy rasterization fallback
//!
//! Renders every page of the original document to a bitmap, re-encodes it as
//! JPEG and reassembles an image-only PDF. Profiles run from high fidelity to
//! low fidelity, so quality is only given up as far as the target demands.

pub mod assembler;
pub mod encoder;
pub mod pdfium;

pub use assembler::{ImagePdfBuilder, ImageRef, PageRef};
pub use encoder::JpegImageEncoder;
pub use pdfium::PdfiumRenderer;

use std::time::Instant;

use image::RgbImage;

use crate::config::defaults::{
    MAX_CANVAS_AREA, MAX_CANVAS_HEIGHT, MAX_CANVAS_WIDTH, MIN_RENDER_SCALE,
};
use crate::error::RasterError;
use crate::lossless::AttemptResult;

/// Page size in PDF points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Bitmap size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// Page rasterizer; opening a document yields a session that is released on drop
pub trait PageRenderer {
    fn open<'a>(&'a self, pdf: &'a [u8]) -> Result<Box<dyn RenderSession + 'a>, RasterError>;
}

/// An open document ready for rendering
pub trait RenderSession {
    fn page_count(&self) -> usize;

    /// Native page size at scale 1
    fn page_size(&self, index: usize) -> Result<PageSize, RasterError>;

    /// Render a page onto an opaque white bitmap of exactly `target` pixels
    fn render_page(&self, index: usize, target: PixelSize) -> Result<RgbImage, RasterError>;
}

/// Quality-parameterized bitmap encoder
pub trait ImageEncoder {
    /// `quality` is normalized to (0, 1]
    fn encode(&self, bitmap: &RgbImage, quality: f32) -> Result<Vec<u8>, RasterError>;
}

/// One render/quality parameterization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterProfile {
    pub render_scale: f32,
    pub max_render_width: f32,
    pub image_quality: f32,
}

const fn raster(render_scale: f32, max_render_width: f32, image_quality: f32) -> RasterProfile {
    RasterProfile {
        render_scale,
        max_render_width,
        image_quality,
    }
}

/// Raster ladder, highest fidelity first
pub const RASTER_PROFILES: &[RasterProfile] = &[
    raster(1.0, 2200.0, 0.82),
    raster(0.9, 1900.0, 0.68),
    raster(0.8, 1600.0, 0.56),
    raster(0.7, 1400.0, 0.46),
    raster(0.55, 1100.0, 0.36),
    raster(0.45, 900.0, 0.27),
    raster(0.35, 700.0, 0.2),
];

/// Ceilings that bound peak bitmap memory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterLimits {
    pub min_scale: f32,
    pub max_canvas_width: f32,
    pub max_canvas_height: f32,
    pub max_canvas_area: f32,
}

impl Default for RasterLimits {
    fn default() -> Self {
        Self {
            min_scale: MIN_RENDER_SCALE,
            max_canvas_width: MAX_CANVAS_WIDTH,
            max_canvas_height: MAX_CANVAS_HEIGHT,
            max_canvas_area: MAX_CANVAS_AREA,
        }
    }
}

impl RasterLimits {
    /// Scale for rendering `page` under `profile`, capped by the canvas limits
    /// and floored at the minimum scale.
    pub fn safe_render_scale(&self, page: PageSize, profile: &RasterProfile) -> f32 {
        let mut scale = profile.render_scale.min(profile.max_render_width / page.width);

        if !scale.is_finite() || scale <= 0.0 {
            scale = self.min_scale;
        }

        scale = scale.min(self.max_canvas_width / page.width);
        scale = scale.min(self.max_canvas_height / page.height);

        let area = page.width * page.height;
        if area > 0.0 {
            scale = scale.min((self.max_canvas_area / area).sqrt());
        }

        // NaN from degenerate pages also lands on the floor
        if scale.is_nan() {
            return self.min_scale;
        }
        scale.max(self.min_scale)
    }

    /// Bitmap dimensions for `page` at `scale`
    pub fn pixel_size(page: PageSize, scale: f32) -> PixelSize {
        let dimension = |points: f32| {
            let pixels = (points * scale).round();
            if pixels.is_finite() && pixels >= 1.0 {
                pixels as u32
            } else {
                1
            }
        };
        PixelSize {
            width: dimension(page.width),
            height: dimension(page.height),
        }
    }
}

/// Rebuild the whole document under one profile.
///
/// Any page failure abandons the profile; no partial document is returned.
fn build_with_profile(
    session: &dyn RenderSession,
    encoder: &dyn ImageEncoder,
    profile: &RasterProfile,
    limits: &RasterLimits,
) -> Result<Vec<u8>, RasterError> {
    let mut builder = ImagePdfBuilder::new();

    for index in 0..session.page_count() {
        let page_size = session.page_size(index)?;
        let scale = limits.safe_render_scale(page_size, profile);
        let pixels = RasterLimits::pixel_size(page_size, scale);

        // Only one page bitmap is alive at a time
        let jpeg = {
            let bitmap = session.render_page(index, pixels)?;
            encoder.encode(&bitmap, profile.image_quality)?
        };

        let image = builder.embed_jpeg(jpeg, pixels.width, pixels.height);
        let page = builder.add_page(page_size);
        builder.draw_image(page, image, 0.0, 0.0, page_size.width, page_size.height)?;
    }

    log::debug!(
        "Assembling {} rasterized pages at quality {}",
        builder.page_count(),
        profile.image_quality
    );
    builder.save()
}

/// Rasterize the original document toward `target_bytes`.
///
/// Returns the first document that fits a non-zero target, otherwise the
/// smallest document produced, or the input itself when nothing beat it.
/// Fails when no renderer is available, the document cannot be opened, or
/// every profile failed.
pub fn rasterize(
    renderer: Option<&dyn PageRenderer>,
    encoder: &dyn ImageEncoder,
    input: &[u8],
    target_bytes: u64,
    limits: &RasterLimits,
) -> Result<AttemptResult, RasterError> {
    let renderer = renderer
        .ok_or_else(|| RasterError::Unavailable("no page renderer bound".to_string()))?;
    let session = renderer.open(input)?;

    log::info!(
        "Rasterizing {} pages, target {} bytes",
        session.page_count(),
        target_bytes
    );

    let mut smallest: Option<Vec<u8>> = None;

    for (index, profile) in RASTER_PROFILES.iter().enumerate() {
        let started = Instant::now();
        let document = match build_with_profile(session.as_ref(), encoder, profile, limits) {
            Ok(document) => document,
            Err(e) => {
                log::warn!("Raster profile {} abandoned: {}", index + 1, e);
                continue;
            }
        };

        log::info!(
            "Raster profile {} (scale {}, quality {}): {} bytes ({:.2?})",
            index + 1,
            profile.render_scale,
            profile.image_quality,
            document.len(),
            started.elapsed()
        );

        if target_bytes > 0 && document.len() as u64 <= target_bytes {
            return Ok(AttemptResult::new(document));
        }

        if smallest.as_ref().map_or(true, |best| document.len() < best.len()) {
            smallest = Some(document);
        }
    }

    match smallest {
        None => Err(RasterError::NoProfileSucceeded),
        Some(document) if document.len() < input.len() => Ok(AttemptResult::new(document)),
        Some(_) => Ok(AttemptResult::new(input.to_vec())),
    }
}
