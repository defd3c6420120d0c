//! Upload request boundary
//!
//! Validates an uploaded file and its form fields, runs the compressor and
//! maps the outcome onto response metadata or a single-message error.

use thiserror::Error;

use crate::cli::CompressionMode;
use crate::config::defaults::OUTPUT_FALLBACK_NAME;
use crate::engine::{CompressionOutcome, CompressionRequest, Compressor};
use crate::error::CompressError;
use crate::target::{parse_target_size, SizeUnit};

pub const PDF_EXTENSION: &str = ".pdf";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

const DEFAULT_TARGET_VALUE: &str = "0";
const DEFAULT_TARGET_UNIT: &str = "mb";

/// Failure message keywords that indicate an exhausted processing budget
const RESOURCE_LIMIT_KEYWORDS: &[&str] = &["memory", "allocation", "cpu", "time limit", "timeout", "timed out"];

/// Check an uploaded file's name and MIME type.
///
/// The name must end with `.pdf` (any case). An empty MIME type is accepted
/// since some clients omit it.
pub fn validate_pdf_candidate(name: &str, mime: &str) -> Result<(), CompressError> {
    if !name.to_lowercase().ends_with(PDF_EXTENSION) {
        return Err(CompressError::UnsupportedFileType(
            "file extension must be .pdf".to_string(),
        ));
    }

    let mime = mime.trim().to_lowercase();
    if mime.is_empty() || mime == MIME_PDF || mime == MIME_OCTET_STREAM {
        Ok(())
    } else {
        Err(CompressError::UnsupportedFileType(format!(
            "'{}' is not a PDF content type",
            mime
        )))
    }
}

/// Fields of one compression upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressForm {
    pub file_name: String,
    pub content_type: String,
    pub file_bytes: Vec<u8>,
    /// Decimal text; missing means "0"
    pub target_size_value: Option<String>,
    /// "kb" or "mb"; missing means "mb"
    pub target_size_unit: Option<String>,
    /// "standard" or "aggressive"; missing or unknown means the compressor's default
    pub compression_mode: Option<String>,
}

impl CompressForm {
    /// Requested mode, or `fallback` when missing or unknown
    pub fn mode(&self, fallback: CompressionMode) -> CompressionMode {
        CompressionMode::from_token(self.compression_mode.as_deref(), fallback)
    }

    pub fn unit(&self) -> SizeUnit {
        SizeUnit::normalize(self.target_size_unit.as_deref().unwrap_or(DEFAULT_TARGET_UNIT))
    }

    /// Requested target in bytes, before clamping
    pub fn target_bytes(&self) -> Result<u64, CompressError> {
        let value = self.target_size_value.as_deref().unwrap_or(DEFAULT_TARGET_VALUE);
        Ok(parse_target_size(value, self.unit())?)
    }
}

/// Coarse HTTP-style status of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn code(&self) -> u16 {
        match self {
            StatusClass::ClientError => 400,
            StatusClass::ServerError => 500,
        }
    }
}

/// A failed request: one user-facing message and a status class
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ErrorResponse {
    pub message: String,
    pub status: StatusClass,
}

impl ErrorResponse {
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusClass::ClientError,
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusClass::ServerError,
        }
    }
}

impl From<CompressError> for ErrorResponse {
    fn from(err: CompressError) -> Self {
        match err {
            CompressError::InvalidTargetSize(_) | CompressError::UnsupportedFileType(_) => {
                ErrorResponse::client(err.to_string())
            }
            CompressError::ResourceLimitExceeded(_) => ErrorResponse::server(
                "Processing limit reached. Try a larger target size or a smaller PDF.",
            ),
            CompressError::RecompressionFailed(_) => ErrorResponse::server("Failed to compress the PDF."),
        }
    }
}

/// Reclassify an engine failure whose message points at an exhausted budget
pub fn classify_failure(err: CompressError) -> CompressError {
    match err {
        CompressError::RecompressionFailed(inner) => {
            let message = inner.to_string();
            if mentions_resource_limit(&message) {
                CompressError::ResourceLimitExceeded(message)
            } else {
                CompressError::RecompressionFailed(inner)
            }
        }
        other => other,
    }
}

fn mentions_resource_limit(message: &str) -> bool {
    let message = message.to_lowercase();
    RESOURCE_LIMIT_KEYWORDS
        .iter()
        .any(|keyword| message.contains(keyword))
}

/// A successful compression ready to be returned to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressResponse {
    pub outcome: CompressionOutcome,
}

impl CompressResponse {
    pub fn body(&self) -> &[u8] {
        &self.outcome.output_bytes
    }

    pub fn into_body(self) -> Vec<u8> {
        self.outcome.output_bytes
    }

    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let outcome = &self.outcome;
        vec![
            ("Content-Type", MIME_PDF.to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", OUTPUT_FALLBACK_NAME),
            ),
            ("Cache-Control", "no-store".to_string()),
            ("X-Original-Size", outcome.original_size.to_string()),
            ("X-Compressed-Size", outcome.compressed_size.to_string()),
            (
                "X-Requested-Target-Size-Bytes",
                outcome.requested_target_bytes.to_string(),
            ),
            ("X-Target-Achieved", outcome.target_achieved.to_string()),
        ]
    }
}

/// Handle one upload: target first, then file type, then compression
pub fn handle(form: CompressForm, compressor: &Compressor) -> Result<CompressResponse, ErrorResponse> {
    let requested_target_bytes = form.target_bytes()?;
    validate_pdf_candidate(&form.file_name, &form.content_type)?;

    let request = CompressionRequest {
        mode: form.mode(compressor.settings().default_mode),
        requested_target_bytes,
        input_bytes: form.file_bytes,
    };

    log::info!(
        "Compressing '{}' ({} bytes, mode {}, target {} bytes)",
        form.file_name,
        request.input_bytes.len(),
        request.mode.as_str(),
        requested_target_bytes
    );

    let outcome = compressor.compress(&request).map_err(|err| {
        let err = classify_failure(err);
        log::error!("Compression of '{}' failed: {}", form.file_name, err);
        ErrorResponse::from(err)
    })?;

    Ok(CompressResponse { outcome })
}
