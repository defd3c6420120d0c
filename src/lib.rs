pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod lossless;
pub mod lossy;
pub mod request;
pub mod target;

pub use cli::CompressionMode;
pub use config::Settings;
pub use engine::{compose, CompressionOutcome, CompressionRequest, Compressor, OutputSource};
pub use error::{CompressError, ConfigError, RasterError, RecompressError, TargetSizeError};
pub use lossless::{LopdfRecompressor, Recompressor};
pub use lossy::{ImageEncoder, JpegImageEncoder, PageRenderer, PdfiumRenderer};
pub use request::{handle, validate_pdf_candidate, CompressForm, CompressResponse, ErrorResponse};
pub use target::{clamp_target, compute_bounds, parse_target_size, SizeUnit, TargetSizeBounds};

/// High-level API for shrinking a PDF held in memory.
///
/// This is the simplest entry point for library consumers. It uses the
/// default settings and the lopdf recompressor; the rasterizing fallback is
/// used only in aggressive mode and only when Pdfium can be bound.
///
/// # Arguments
///
/// * `pdf` - The original PDF bytes
/// * `target_bytes` - Requested maximum size; 0 minimizes without a target.
///   Non-zero targets are clamped to 20%..90% of the original size.
/// * `mode` - Whether quality may be given up to reach the target
///
/// # Example
///
/// ```no_run
/// use pdf_squeeze::{compress_pdf, CompressionMode};
///
/// let pdf = std::fs::read("report.pdf").unwrap();
/// let outcome = compress_pdf(pdf, 2 * 1024 * 1024, CompressionMode::Standard).unwrap();
///
/// println!("{} -> {} bytes", outcome.original_size, outcome.compressed_size);
/// std::fs::write("report-small.pdf", outcome.output_bytes).unwrap();
/// ```
pub fn compress_pdf(
    pdf: Vec<u8>,
    target_bytes: u64,
    mode: CompressionMode,
) -> Result<CompressionOutcome, CompressError> {
    let renderer = renderer_for_mode(mode);
    let compressor = Compressor::with_default_backends(Settings::default(), renderer);
    compressor.compress(&CompressionRequest {
        input_bytes: pdf,
        requested_target_bytes: target_bytes,
        mode,
    })
}

/// Bind Pdfium when `mode` may rasterize; a missing library only disables the
/// lossy fallback.
pub fn renderer_for_mode(mode: CompressionMode) -> Option<Box<dyn PageRenderer>> {
    match mode {
        CompressionMode::Aggressive => match PdfiumRenderer::bind() {
            Ok(renderer) => Some(Box::new(renderer)),
            Err(e) => {
                log::warn!("{}; continuing with lossless compression only", e);
                None
            }
        },
        CompressionMode::Standard => None,
    }
}
