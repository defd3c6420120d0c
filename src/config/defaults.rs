/// Smallest accepted target, as a percent of the original size
pub const DEFAULT_MIN_TARGET_PERCENT: u32 = 20;

/// Largest accepted target, as a percent of the original size
pub const DEFAULT_MAX_TARGET_PERCENT: u32 = 90;

/// Bytes per kilobyte for target size units
pub const BYTES_PER_KILOBYTE: u64 = 1024;

/// Bytes per megabyte for target size units
pub const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// Inputs at or above this size only run the lightest profiles when a target is set
pub const LARGE_INPUT_THRESHOLD_BYTES: usize = 20 * 1024 * 1024;

/// Number of lossless profiles tried for large inputs
pub const LARGE_INPUT_PROFILE_LIMIT: usize = 2;

/// Deflate level used when no profile sets one
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// JPEG quality (1-100) for images re-encoded by the lossless optimize-images directive
pub const OPTIMIZED_IMAGE_QUALITY: u8 = 75;

/// Render scale floor, keeps oversized pages rendering at all
pub const MIN_RENDER_SCALE: f32 = 0.1;

/// Largest rendered bitmap width in pixels
pub const MAX_CANVAS_WIDTH: f32 = 4096.0;

/// Largest rendered bitmap height in pixels
pub const MAX_CANVAS_HEIGHT: f32 = 4096.0;

/// Largest rendered bitmap area in pixels
pub const MAX_CANVAS_AREA: f32 = 16_000_000.0;

/// File name suggested for compressed downloads
pub const OUTPUT_FALLBACK_NAME: &str = "compressed.pdf";
