use std::fmt;

/// One structural recompression directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Deflate streams that carry no filter yet
    CompressStreams,
    /// Inflate and re-deflate existing Flate streams
    RecompressFlate,
    /// Deflate level, 0-9
    CompressionLevel(u8),
    /// Pack non-stream objects into object streams with an xref stream
    GenerateObjectStreams,
    /// Rewrite page content streams in canonical form
    NormalizeContent,
    /// Re-encode eligible raw images as JPEG when smaller
    OptimizeImages,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::CompressStreams => write!(f, "compress-streams"),
            Directive::RecompressFlate => write!(f, "recompress-flate"),
            Directive::CompressionLevel(level) => write!(f, "compression-level={}", level),
            Directive::GenerateObjectStreams => write!(f, "object-streams=generate"),
            Directive::NormalizeContent => write!(f, "normalize-content"),
            Directive::OptimizeImages => write!(f, "optimize-images"),
        }
    }
}

/// Directives applied ahead of every profile
pub const BASE_DIRECTIVES: &[Directive] = &[Directive::CompressStreams, Directive::RecompressFlate];

/// A named, immutable set of directives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionProfile {
    pub name: &'static str,
    pub directives: &'static [Directive],
}

impl CompressionProfile {
    /// Base directives followed by the profile's own
    pub fn full_directives(&self) -> Vec<Directive> {
        BASE_DIRECTIVES
            .iter()
            .chain(self.directives)
            .copied()
            .collect()
    }
}

/// Lossless ladder, lightest to strongest. The order is load-bearing: the
/// search accepts the first profile that fits the target.
pub const PROFILES: &[CompressionProfile] = &[
    CompressionProfile {
        name: "light",
        directives: &[Directive::CompressionLevel(3)],
    },
    CompressionProfile {
        name: "balanced",
        directives: &[Directive::CompressionLevel(6), Directive::GenerateObjectStreams],
    },
    CompressionProfile {
        name: "strong",
        directives: &[
            Directive::CompressionLevel(9),
            Directive::GenerateObjectStreams,
            Directive::NormalizeContent,
        ],
    },
    CompressionProfile {
        name: "maximum",
        directives: &[
            Directive::CompressionLevel(9),
            Directive::GenerateObjectStreams,
            Directive::NormalizeContent,
            Directive::OptimizeImages,
        ],
    },
];
