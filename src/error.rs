use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetSizeError {
    #[error("Invalid target size: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum RecompressError {
    #[error("Failed to load PDF for recompression: {0}")]
    Load(String),

    #[error("Failed to rewrite PDF streams: {0}")]
    Rewrite(String),

    #[error("Failed to save recompressed PDF: {0}")]
    Save(String),
}

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Rasterization unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to open PDF for rendering: {0}")]
    Open(String),

    #[error("Failed to render page {page}: {message}")]
    PageRender { page: usize, message: String },

    #[error("Failed to encode page image: {0}")]
    Encode(String),

    #[error("Failed to assemble rasterized PDF: {0}")]
    Assemble(String),

    #[error("No raster profile produced a document")]
    NoProfileSucceeded,
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("{0}")]
    InvalidTargetSize(#[from] TargetSizeError),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("PDF recompression failed: {0}")]
    RecompressionFailed(#[from] RecompressError),

    #[error("Processing limit reached: {0}")]
    ResourceLimitExceeded(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid target percent bounds: min {min}%, max {max}% (need 0 < min <= max <= 100)")]
    InvalidPercentBounds { min: u32, max: u32 },
}
