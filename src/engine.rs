//! Result composition and the top-level compressor
//!
//! The composer decides between the lossless search result and the lossy
//! fallback; [`Compressor`] wires settings and backends around it.

use std::time::Instant;

use crate::cli::CompressionMode;
use crate::config::Settings;
use crate::error::{CompressError, RasterError};
use crate::lossless::{self, AttemptResult, LopdfRecompressor, LosslessAttempt, Recompressor, SearchSummary};
use crate::lossy::{self, ImageEncoder, JpegImageEncoder, PageRenderer};

/// One compression call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionRequest {
    pub input_bytes: Vec<u8>,
    /// 0 means "no target": minimize only
    pub requested_target_bytes: u64,
    pub mode: CompressionMode,
}

/// Which path produced the returned bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Lossless { profile: &'static str },
    Lossy,
    /// No attempt beat the input; it is returned unchanged
    Original,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionOutcome {
    pub output_bytes: Vec<u8>,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Target actually used, after clamping
    pub requested_target_bytes: u64,
    pub target_achieved: bool,
    pub lossy_attempted: bool,
    pub used_lossy_compression: bool,
    pub lossy_attempt_failed: bool,
    pub source: OutputSource,
}

impl CompressionOutcome {
    fn new(output_bytes: Vec<u8>, original_size: u64, target_bytes: u64, source: OutputSource) -> Self {
        let compressed_size = output_bytes.len() as u64;
        Self {
            output_bytes,
            original_size,
            compressed_size,
            requested_target_bytes: target_bytes,
            target_achieved: target_bytes == 0 || compressed_size <= target_bytes,
            lossy_attempted: false,
            used_lossy_compression: false,
            lossy_attempt_failed: false,
            source,
        }
    }

    fn from_lossless(attempt: LosslessAttempt, original: &[u8], target_bytes: u64) -> Self {
        let source = if attempt.result.bytes == original {
            OutputSource::Original
        } else {
            OutputSource::Lossless {
                profile: attempt.profile,
            }
        };
        Self::new(attempt.result.bytes, original.len() as u64, target_bytes, source)
    }

    /// Fraction of the original size saved, 0 when nothing was saved
    pub fn savings_ratio(&self) -> f64 {
        if self.original_size == 0 || self.compressed_size >= self.original_size {
            return 0.0;
        }
        1.0 - self.compressed_size as f64 / self.original_size as f64
    }
}

/// Combine the lossless search with the optional lossy fallback.
///
/// `lossy` runs at most once, and only when the mode is aggressive and the
/// lossless search missed a non-zero target.
pub fn compose<F>(
    target_bytes: u64,
    mode: CompressionMode,
    summary: SearchSummary,
    original: &[u8],
    lossy: F,
) -> CompressionOutcome
where
    F: FnOnce() -> Result<AttemptResult, RasterError>,
{
    if target_bytes == 0 {
        return CompressionOutcome::from_lossless(summary.smallest, original, 0);
    }

    if let Some(matched) = summary.matched {
        return CompressionOutcome::from_lossless(matched, original, target_bytes);
    }

    if mode == CompressionMode::Standard {
        return CompressionOutcome::from_lossless(summary.smallest, original, target_bytes);
    }

    let mut outcome = match lossy() {
        Ok(raster) if raster.size_bytes() <= target_bytes => {
            let mut outcome =
                CompressionOutcome::new(raster.bytes, original.len() as u64, target_bytes, OutputSource::Lossy);
            outcome.used_lossy_compression = true;
            outcome
        }
        Ok(raster) => {
            // Ties go to the lossless result
            if raster.size_bytes() < summary.smallest.size_bytes() {
                let mut outcome =
                    CompressionOutcome::new(raster.bytes, original.len() as u64, target_bytes, OutputSource::Lossy);
                outcome.used_lossy_compression = true;
                outcome
            } else {
                CompressionOutcome::from_lossless(summary.smallest, original, target_bytes)
            }
        }
        Err(e) => {
            log::warn!("Lossy fallback failed: {}", e);
            let mut outcome = CompressionOutcome::from_lossless(summary.smallest, original, target_bytes);
            outcome.lossy_attempt_failed = true;
            outcome
        }
    };

    outcome.lossy_attempted = true;
    outcome
}

/// Compression engine with its backends bound
pub struct Compressor {
    settings: Settings,
    recompressor: Box<dyn Recompressor>,
    renderer: Option<Box<dyn PageRenderer>>,
    encoder: Box<dyn ImageEncoder>,
}

impl Compressor {
    pub fn new(
        settings: Settings,
        recompressor: Box<dyn Recompressor>,
        renderer: Option<Box<dyn PageRenderer>>,
        encoder: Box<dyn ImageEncoder>,
    ) -> Self {
        Self {
            settings,
            recompressor,
            renderer,
            encoder,
        }
    }

    /// Lopdf recompression and JPEG encoding, with an optional page renderer
    pub fn with_default_backends(settings: Settings, renderer: Option<Box<dyn PageRenderer>>) -> Self {
        Self::new(
            settings,
            Box::new(LopdfRecompressor::default()),
            renderer,
            Box::new(JpegImageEncoder),
        )
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn compress(&self, request: &CompressionRequest) -> Result<CompressionOutcome, CompressError> {
        let started = Instant::now();
        let input = request.input_bytes.as_slice();
        let original_size = input.len() as u64;
        let target_bytes = self
            .settings
            .target
            .resolve(original_size, request.requested_target_bytes);

        if target_bytes != request.requested_target_bytes {
            log::info!(
                "Target {} bytes clamped to {} bytes",
                request.requested_target_bytes,
                target_bytes
            );
        }

        let summary = lossless::search(self.recompressor.as_ref(), input, target_bytes, &self.settings.search)?;

        let outcome = compose(target_bytes, request.mode, summary, input, || {
            lossy::rasterize(
                self.renderer.as_deref(),
                self.encoder.as_ref(),
                input,
                target_bytes,
                &self.settings.raster,
            )
        });

        log::info!(
            "Compressed {} -> {} bytes via {:?} (target achieved: {}, {:.2?})",
            outcome.original_size,
            outcome.compressed_size,
            outcome.source,
            outcome.target_achieved,
            started.elapsed()
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lossless::tests::SizedRecompressor;
    use crate::lossy::tests::{SizedEncoder, StubRenderer};
    use std::cell::Cell;

    fn attempt(profile: &'static str, size: usize) -> LosslessAttempt {
        LosslessAttempt {
            profile,
            result: AttemptResult::new(vec![b'p'; size]),
        }
    }

    fn missed(smallest: LosslessAttempt) -> SearchSummary {
        SearchSummary {
            matched: None,
            smallest,
            attempts: 4,
        }
    }

    fn no_lossy() -> Result<AttemptResult, RasterError> {
        panic!("lossy fallback must not run")
    }

    #[test]
    fn test_no_target_returns_smallest() {
        let original = vec![0u8; 10_000];
        let outcome = compose(0, CompressionMode::Aggressive, missed(attempt("maximum", 6_000)), &original, no_lossy);

        assert!(outcome.target_achieved);
        assert_eq!(outcome.compressed_size, 6_000);
        assert_eq!(outcome.requested_target_bytes, 0);
        assert!(!outcome.lossy_attempted);
        assert_eq!(outcome.source, OutputSource::Lossless { profile: "maximum" });
    }

    #[test]
    fn test_lossless_match_skips_lossy() {
        let original = vec![0u8; 10_000];
        let summary = SearchSummary {
            matched: Some(attempt("balanced", 4_000)),
            smallest: attempt("balanced", 4_000),
            attempts: 2,
        };

        let outcome = compose(5_000, CompressionMode::Aggressive, summary, &original, no_lossy);

        assert!(outcome.target_achieved);
        assert!(!outcome.lossy_attempted);
        assert_eq!(outcome.source, OutputSource::Lossless { profile: "balanced" });
    }

    #[test]
    fn test_standard_mode_misses_target() {
        let original = vec![0u8; 10_000];
        let outcome = compose(3_000, CompressionMode::Standard, missed(attempt("strong", 8_200)), &original, no_lossy);

        assert!(!outcome.target_achieved);
        assert!(!outcome.lossy_attempted);
        assert_eq!(outcome.compressed_size, 8_200);
    }

    #[test]
    fn test_lossy_reaches_target() {
        let original = vec![0u8; 10_000];
        let outcome = compose(3_000, CompressionMode::Aggressive, missed(attempt("strong", 8_200)), &original, || {
            Ok(AttemptResult::new(vec![b'r'; 2_800]))
        });

        assert!(outcome.target_achieved);
        assert!(outcome.lossy_attempted);
        assert!(outcome.used_lossy_compression);
        assert!(!outcome.lossy_attempt_failed);
        assert_eq!(outcome.compressed_size, 2_800);
        assert_eq!(outcome.source, OutputSource::Lossy);
    }

    #[test]
    fn test_lossy_smaller_but_above_target() {
        let original = vec![0u8; 10_000];
        let outcome = compose(3_000, CompressionMode::Aggressive, missed(attempt("strong", 8_200)), &original, || {
            Ok(AttemptResult::new(vec![b'r'; 5_000]))
        });

        assert!(!outcome.target_achieved);
        assert!(outcome.used_lossy_compression);
        assert_eq!(outcome.compressed_size, 5_000);
    }

    #[test]
    fn test_lossless_kept_when_lossy_not_smaller() {
        let original = vec![0u8; 10_000];
        let outcome = compose(3_000, CompressionMode::Aggressive, missed(attempt("strong", 8_200)), &original, || {
            Ok(AttemptResult::new(vec![b'r'; 8_200]))
        });

        assert!(outcome.lossy_attempted);
        assert!(!outcome.used_lossy_compression);
        assert!(!outcome.lossy_attempt_failed);
        assert_eq!(outcome.source, OutputSource::Lossless { profile: "strong" });
    }

    #[test]
    fn test_lossy_failure_falls_back() {
        let original = vec![0u8; 10_000];
        let outcome = compose(3_000, CompressionMode::Aggressive, missed(attempt("strong", 8_200)), &original, || {
            Err(RasterError::NoProfileSucceeded)
        });

        assert!(outcome.lossy_attempted);
        assert!(outcome.lossy_attempt_failed);
        assert!(!outcome.used_lossy_compression);
        assert!(!outcome.target_achieved);
        assert_eq!(outcome.compressed_size, 8_200);
    }

    #[test]
    fn test_lossy_runs_once() {
        let original = vec![0u8; 10_000];
        let calls = Cell::new(0);
        compose(3_000, CompressionMode::Aggressive, missed(attempt("strong", 8_200)), &original, || {
            calls.set(calls.get() + 1);
            Err(RasterError::NoProfileSucceeded)
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_untouched_input_is_reported_as_original() {
        let original = vec![b'p'; 1_000];
        let outcome = compose(0, CompressionMode::Standard, missed(attempt("none", 1_000)), &original, no_lossy);
        assert_eq!(outcome.source, OutputSource::Original);
        assert_eq!(outcome.savings_ratio(), 0.0);
    }

    #[test]
    fn test_savings_ratio() {
        let original = vec![0u8; 1_000];
        let outcome = compose(0, CompressionMode::Standard, missed(attempt("light", 250)), &original, no_lossy);
        assert!((outcome.savings_ratio() - 0.75).abs() < 1e-9);
    }

    fn compressor(sizes: &[usize], renderer: Option<Box<dyn PageRenderer>>, bytes_per_quality: f32) -> Compressor {
        Compressor::new(
            Settings::default(),
            Box::new(SizedRecompressor::new(sizes)),
            renderer,
            Box::new(SizedEncoder::new(bytes_per_quality)),
        )
    }

    #[test]
    fn test_compress_clamps_tiny_target() {
        let compressor = compressor(&[900, 800, 700, 600], None, 1.0);
        let request = CompressionRequest {
            input_bytes: vec![0u8; 1_000],
            requested_target_bytes: 1,
            mode: CompressionMode::Standard,
        };

        let outcome = compressor.compress(&request).unwrap();

        assert_eq!(outcome.requested_target_bytes, 200);
        assert!(!outcome.target_achieved);
        assert_eq!(outcome.compressed_size, 600);
    }

    #[test]
    fn test_compress_without_renderer_marks_lossy_failed() {
        let compressor = compressor(&[900, 800, 700, 600], None, 1.0);
        let request = CompressionRequest {
            input_bytes: vec![0u8; 1_000],
            requested_target_bytes: 300,
            mode: CompressionMode::Aggressive,
        };

        let outcome = compressor.compress(&request).unwrap();

        assert!(outcome.lossy_attempted);
        assert!(outcome.lossy_attempt_failed);
        assert_eq!(outcome.compressed_size, 600);
    }

    #[test]
    fn test_compress_uses_rasterized_output() {
        let renderer = StubRenderer::letter_pages(1);
        let compressor = compressor(&[90_000, 85_000, 82_000, 84_000], Some(Box::new(renderer)), 50_000.0);
        let request = CompressionRequest {
            input_bytes: vec![0u8; 100_000],
            requested_target_bytes: 30_000,
            mode: CompressionMode::Aggressive,
        };

        let outcome = compressor.compress(&request).unwrap();

        assert!(outcome.target_achieved);
        assert!(outcome.used_lossy_compression);
        assert_eq!(outcome.source, OutputSource::Lossy);
        assert!(outcome.compressed_size <= 30_000);
    }

    #[test]
    fn test_recompression_failure_is_fatal() {
        // Sizes for only one profile: the second lookup fails
        let compressor = compressor(&[900], None, 1.0);
        let request = CompressionRequest {
            input_bytes: vec![0u8; 1_000],
            requested_target_bytes: 0,
            mode: CompressionMode::Standard,
        };

        let result = compressor.compress(&request);
        assert!(matches!(result, Err(CompressError::RecompressionFailed(_))));
    }
}
